use rand::Rng;

use crate::detector::Event;
use crate::event_log::EventLog;
use crate::settings::Controls;

pub const NO_EVENTS_MESSAGE: &str = "No events detected yet.";

// Bounding box for the map marker (Kerala)
const MAP_LAT_BASE: f64 = 8.5;
const MAP_LON_BASE: f64 = 76.9;
const MAP_JITTER_DEG: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// One status line of the alert area.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub level: BannerLevel,
    pub text: String,
}

impl Banner {
    fn new(level: BannerLevel, text: impl Into<String>) -> Self {
        Self { level, text: text.into() }
    }
}

/// Simulated alerts for one refresh. Nothing is actually sent anywhere.
pub fn alert_banners(event: Option<&Event>, controls: &Controls) -> Vec<Banner> {
    let event = match event {
        Some(event) => event,
        None => {
            return vec![Banner::new(
                BannerLevel::Success,
                "System Stable - No Unauthorized Fence Detected",
            )]
        }
    };

    let mut banners = vec![Banner::new(
        BannerLevel::Error,
        format!(
            "Unauthorized Fence Detected at {} - {} | {}",
            event.substation,
            event.feeder,
            event.location_label()
        ),
    )];
    if controls.send_sms {
        banners.push(Banner::new(BannerLevel::Info, "SMS Alert Sent to Utility Crew"));
    }
    if controls.sound_siren {
        banners.push(Banner::new(BannerLevel::Warning, "Siren Alarm Activated at Substation"));
    }
    banners
}

/// Map marker position. Jittered at random, unrelated to the reported distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
}

impl MapPoint {
    pub fn jittered<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            lat: MAP_LAT_BASE + rng.gen::<f64>() * MAP_JITTER_DEG,
            lon: MAP_LON_BASE + rng.gen::<f64>() * MAP_JITTER_DEG,
        }
    }

    pub fn bounds() -> ([f64; 2], [f64; 2]) {
        (
            [MAP_LON_BASE, MAP_LAT_BASE],
            [MAP_LON_BASE + MAP_JITTER_DEG, MAP_LAT_BASE + MAP_JITTER_DEG],
        )
    }
}

/// Plain-text rendering of a refresh, used by the headless loop.
pub fn format_refresh(refresh_no: u64, banners: &[Banner], log: &EventLog) -> String {
    let mut lines = vec![format!("--- refresh #{} ---", refresh_no)];
    for banner in banners {
        let tag = match banner.level {
            BannerLevel::Success => "OK",
            BannerLevel::Info => "INFO",
            BannerLevel::Warning => "WARN",
            BannerLevel::Error => "ALERT",
        };
        lines.push(format!("[{}] {}", tag, banner.text));
    }

    if log.is_empty() {
        lines.push(NO_EVENTS_MESSAGE.to_string());
    } else {
        let counts = log
            .feeder_counts()
            .iter()
            .map(|(feeder, count)| format!("{}={}", feeder, count))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Event history: {} events ({})", log.len(), counts));
    }
    lines.join("\n")
}
