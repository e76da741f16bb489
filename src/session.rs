use anyhow::Result;
use chrono::{Local, NaiveTime};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detector::{detect_event, Event};
use crate::display::{alert_banners, Banner, MapPoint};
use crate::event_log::EventLog;
use crate::fft_analysis::{band_limited, rolling_rms, spectrum_magnitude, welch_psd, AnalysisConfig};
use crate::make_waves::{simulate_signal, time_axis, SignalConfig};
use crate::settings::{Controls, Settings};
use crate::utils::power_to_db;

/// Everything one refresh produces for the presentation layer.
///
/// Derived views are `None` when their panel is switched off.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub refresh_no: u64,
    pub time_ms: Vec<f64>,
    pub signal: Vec<f64>,
    pub event: Option<Event>,
    pub spectrum: Option<Vec<(f64, f64)>>,
    pub psd_db: Option<Vec<(f64, f64)>>,
    pub rms: Option<Vec<f64>>,
    pub map_point: MapPoint,
    pub banners: Vec<Banner>,
}

/// Per-session state: the random source and the event log.
pub struct Session<R: Rng = StdRng> {
    rng: R,
    log: EventLog,
    signal_config: SignalConfig,
    analysis_config: AnalysisConfig,
    refresh_count: u64,
}

impl Session<StdRng> {
    /// Seeded sessions replay the same captures and detections.
    pub fn new(settings: &Settings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(settings, rng)
    }
}

impl<R: Rng> Session<R> {
    pub fn with_rng(settings: &Settings, rng: R) -> Self {
        Self {
            rng,
            log: EventLog::new(),
            signal_config: settings.signal.clone(),
            analysis_config: settings.analysis.clone(),
            refresh_count: 0,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Runs one pass stamped with the local wall clock.
    pub fn refresh(&mut self, controls: &Controls) -> Result<Refresh> {
        self.refresh_at(controls, Local::now().time())
    }

    /// Generate, detect, derive, log. `now` stamps any detection.
    pub fn refresh_at(&mut self, controls: &Controls, now: NaiveTime) -> Result<Refresh> {
        self.refresh_count += 1;
        let signal_config = &self.signal_config;
        let analysis = &self.analysis_config;

        let signal = simulate_signal(signal_config, controls.inject_pulse, &mut self.rng)?;
        let event = detect_event(&signal, analysis.detection_threshold, &mut self.rng, now);

        let spectrum = if controls.show_fft {
            let full = spectrum_magnitude(&signal, signal_config.sample_rate)?;
            Some(band_limited(&full, analysis.display_max_freq))
        } else {
            None
        };

        let psd_db = if controls.show_psd {
            let psd = welch_psd(&signal, signal_config.sample_rate, analysis.welch_segment_len)?;
            let db: Vec<(f64, f64)> = psd.into_iter().map(|(f, p)| (f, power_to_db(p))).collect();
            Some(band_limited(&db, analysis.display_max_freq))
        } else {
            None
        };

        let rms = if controls.show_rms {
            Some(rolling_rms(&signal, analysis.rms_window))
        } else {
            None
        };

        let banners = alert_banners(event.as_ref(), controls);
        if let Some(event) = &event {
            self.log.record(event.clone());
        }

        let map_point = MapPoint::jittered(&mut self.rng);
        let time_ms = time_axis(signal_config).into_iter().map(|t| t * 1000.0).collect();

        debug!(
            "Refresh #{}: pulse={}, event={}, log size={}",
            self.refresh_count,
            controls.inject_pulse,
            event.is_some(),
            self.log.len()
        );

        Ok(Refresh {
            refresh_no: self.refresh_count,
            time_ms,
            signal,
            event,
            spectrum,
            psd_db,
            rms,
            map_point,
            banners,
        })
    }
}
