use std::fmt;
use std::str::FromStr;
use anyhow::{anyhow, Error, Result};
use chrono::{NaiveTime, Timelike};
use log::info;
use rand::Rng;

use crate::utils::round_to_hundredths;

pub const LOCATION_MIN_KM: f64 = 0.5;
pub const LOCATION_MAX_KM: f64 = 2.5;
pub const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feeder {
    Feeder1,
    Feeder2,
    Feeder3,
}

impl Feeder {
    pub const ALL: [Feeder; 3] = [Feeder::Feeder1, Feeder::Feeder2, Feeder::Feeder3];

    pub fn label(&self) -> &'static str {
        match self {
            Feeder::Feeder1 => "Feeder-1",
            Feeder::Feeder2 => "Feeder-2",
            Feeder::Feeder3 => "Feeder-3",
        }
    }
}

impl fmt::Display for Feeder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Feeder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Feeder::ALL
            .iter()
            .copied()
            .find(|feeder| feeder.label() == s)
            .ok_or_else(|| anyhow!("Unknown feeder '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Substation {
    A,
    B,
}

impl Substation {
    pub const ALL: [Substation; 2] = [Substation::A, Substation::B];

    pub fn label(&self) -> &'static str {
        match self {
            Substation::A => "Substation-A",
            Substation::B => "Substation-B",
        }
    }
}

impl fmt::Display for Substation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Substation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Substation::ALL
            .iter()
            .copied()
            .find(|substation| substation.label() == s)
            .ok_or_else(|| anyhow!("Unknown substation '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    UnauthorizedFence,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::UnauthorizedFence => f.write_str("Unauthorized Fence"),
        }
    }
}

impl FromStr for EventStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Unauthorized Fence" => Ok(EventStatus::UnauthorizedFence),
            other => Err(anyhow!("Unknown event status '{}'", other)),
        }
    }
}

/// A simulated detection. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: NaiveTime,
    pub substation: Substation,
    pub feeder: Feeder,
    pub location_km: f64,
    pub status: EventStatus,
}

impl Event {
    pub fn time_label(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// Distance as shown to operators, e.g. `1.25 km`.
    pub fn location_label(&self) -> String {
        format!("{:.2} km", self.location_km)
    }
}

/// Parses a `<number> km` distance label.
pub fn parse_location(label: &str) -> Result<f64> {
    let value = label
        .strip_suffix(" km")
        .ok_or_else(|| anyhow!("Location '{}' is missing the km unit", label))?;
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| anyhow!("Invalid location '{}': {}", label, e))
}

/// Trips when any sample exceeds `threshold`.
///
/// The feeder, substation and distance are drawn at random; they are not derived
/// from the signal. `now` is truncated to whole seconds.
pub fn detect_event<R: Rng + ?Sized>(
    signal: &[f64],
    threshold: f64,
    rng: &mut R,
    now: NaiveTime,
) -> Option<Event> {
    let peak = signal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if peak <= threshold {
        return None;
    }

    let feeder = Feeder::ALL[rng.gen_range(0..Feeder::ALL.len())];
    let substation = Substation::ALL[rng.gen_range(0..Substation::ALL.len())];
    let location_km = round_to_hundredths(rng.gen_range(LOCATION_MIN_KM..=LOCATION_MAX_KM));
    let time = NaiveTime::from_hms_opt(now.hour(), now.minute(), now.second()).unwrap_or(now);

    info!(
        "Detection: peak {:.3} > {:.1} at {} - {} | {:.2} km",
        peak, threshold, substation, feeder, location_km
    );

    Some(Event {
        time,
        substation,
        feeder,
        location_km,
        status: EventStatus::UnauthorizedFence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_waves::{simulate_signal, SignalConfig};
    use crate::utils::DETECTION_THRESHOLD;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_milli_opt(12, 34, 56, 789).unwrap()
    }

    #[test]
    fn test_no_detection_without_pulse() {
        let config = SignalConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let false_positives = (0..200)
            .filter(|_| {
                let signal = simulate_signal(&config, false, &mut rng).unwrap();
                detect_event(&signal, DETECTION_THRESHOLD, &mut rng, noon()).is_some()
            })
            .count();
        assert_eq!(false_positives, 0);
    }

    #[test]
    fn test_pulse_always_detected() {
        let config = SignalConfig::default();
        let mut rng = StdRng::seed_from_u64(43);
        for _ in 0..200 {
            let signal = simulate_signal(&config, true, &mut rng).unwrap();
            assert!(detect_event(&signal, DETECTION_THRESHOLD, &mut rng, noon()).is_some());
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(detect_event(&[1.0, 3.0, 2.0], 3.0, &mut rng, noon()).is_none());
        assert!(detect_event(&[1.0, 3.0001], 3.0, &mut rng, noon()).is_some());
        assert!(detect_event(&[], 3.0, &mut rng, noon()).is_none());
    }

    #[test]
    fn test_event_metadata_ranges() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let event = detect_event(&[9.0], 3.0, &mut rng, noon()).unwrap();
            assert!(event.location_km >= LOCATION_MIN_KM && event.location_km <= LOCATION_MAX_KM);
            assert_eq!(event.status, EventStatus::UnauthorizedFence);
            assert_eq!(event.time_label(), "12:34:56");
            assert_eq!(event.time.nanosecond(), 0);

            let label = event.location_label();
            let (number, unit) = label.split_once(' ').unwrap();
            assert_eq!(unit, "km");
            assert_eq!(number.split('.').nth(1).map(str::len), Some(2));
        }
    }

    #[test]
    fn test_random_choice_covers_all_sets() {
        let mut rng = StdRng::seed_from_u64(9);
        let events: Vec<Event> = (0..300)
            .filter_map(|_| detect_event(&[9.0], 3.0, &mut rng, noon()))
            .collect();
        for feeder in Feeder::ALL {
            assert!(events.iter().any(|e| e.feeder == feeder));
        }
        for substation in Substation::ALL {
            assert!(events.iter().any(|e| e.substation == substation));
        }
    }

    #[test]
    fn test_labels_parse_back() {
        for feeder in Feeder::ALL {
            assert_eq!(feeder.to_string().parse::<Feeder>().unwrap(), feeder);
        }
        for substation in Substation::ALL {
            assert_eq!(substation.to_string().parse::<Substation>().unwrap(), substation);
        }
        assert_eq!("Feeder-2".parse::<Feeder>().unwrap(), Feeder::Feeder2);
        assert!("Feeder-4".parse::<Feeder>().is_err());
        assert_eq!(parse_location("1.50 km").unwrap(), 1.5);
        assert!(parse_location("1.50").is_err());
    }
}
