use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use log::info;

use crate::detector::{parse_location, Event, EventStatus, Feeder, Substation, TIME_FORMAT};

pub const CSV_HEADER: &str = "time,substation,feeder,location,status";
const CSV_COLUMNS: usize = 5;

/// Detections recorded during this session, newest first.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: VecDeque<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: Event) {
        self.events.push_front(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events per feeder, most frequent first; ties keep feeder order.
    pub fn feeder_counts(&self) -> Vec<(Feeder, usize)> {
        let mut counts: BTreeMap<Feeder, usize> = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.feeder).or_insert(0) += 1;
        }
        let mut counts: Vec<(Feeder, usize)> = counts.into_iter().collect();
        // Stable sort, so the BTreeMap order survives for equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from(CSV_HEADER);
        csv.push('\n');
        for event in &self.events {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                event.time_label(),
                event.substation,
                event.feeder,
                event.location_label(),
                event.status
            ));
        }
        csv
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_csv())
            .with_context(|| format!("Failed to write event log to {}", path.display()))?;
        info!("Exported {} events to {}", self.len(), path.display());
        Ok(())
    }
}

/// Parses an exported event log back into records, preserving row order.
#[allow(dead_code)]
pub fn parse_csv(text: &str) -> Result<Vec<Event>> {
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim_end() == CSV_HEADER => {}
        Some((_, header)) => return Err(anyhow!("Unexpected CSV header '{}'", header)),
        None => return Err(anyhow!("Empty event log")),
    }

    let mut events = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != CSV_COLUMNS {
            return Err(anyhow!(
                "Line {}: expected {} fields, found {}",
                line_no, CSV_COLUMNS, fields.len()
            ));
        }
        let event = Event {
            time: NaiveTime::parse_from_str(fields[0], TIME_FORMAT)
                .with_context(|| format!("Line {}: invalid time '{}'", line_no, fields[0]))?,
            substation: fields[1].parse::<Substation>().with_context(|| format!("Line {}", line_no))?,
            feeder: fields[2].parse::<Feeder>().with_context(|| format!("Line {}", line_no))?,
            location_km: parse_location(fields[3]).with_context(|| format!("Line {}", line_no))?,
            status: fields[4].parse::<EventStatus>().with_context(|| format!("Line {}", line_no))?,
        };
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::detect_event;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn event_at(secs: u32, feeder: Feeder) -> Event {
        Event {
            time: NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap(),
            substation: Substation::B,
            feeder,
            location_km: 1.25,
            status: EventStatus::UnauthorizedFence,
        }
    }

    #[test]
    fn test_record_prepends() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut log = EventLog::new();
        assert!(log.is_empty());
        for secs in 0..5 {
            let now = NaiveTime::from_num_seconds_from_midnight_opt(3600 + secs, 0).unwrap();
            let event = detect_event(&[10.0], 3.0, &mut rng, now).unwrap();
            log.record(event.clone());
            assert_eq!(log.latest(), Some(&event));
        }
        assert_eq!(log.len(), 5);
        let times: Vec<String> = log.iter().map(Event::time_label).collect();
        assert_eq!(times, vec!["01:00:04", "01:00:03", "01:00:02", "01:00:01", "01:00:00"]);
    }

    #[test]
    fn test_feeder_counts() {
        let mut log = EventLog::new();
        log.record(event_at(1, Feeder::Feeder3));
        log.record(event_at(2, Feeder::Feeder1));
        log.record(event_at(3, Feeder::Feeder3));
        log.record(event_at(4, Feeder::Feeder2));
        assert_eq!(
            log.feeder_counts(),
            vec![(Feeder::Feeder3, 2), (Feeder::Feeder1, 1), (Feeder::Feeder2, 1)]
        );
        assert!(EventLog::new().feeder_counts().is_empty());
    }

    #[test]
    fn test_csv_layout() {
        let mut log = EventLog::new();
        log.record(event_at(45296, Feeder::Feeder2));
        assert_eq!(
            log.to_csv(),
            "time,substation,feeder,location,status\n\
             12:34:56,Substation-B,Feeder-2,1.25 km,Unauthorized Fence\n"
        );
        assert_eq!(EventLog::new().to_csv(), "time,substation,feeder,location,status\n");
    }

    #[test]
    fn test_csv_round_trip() {
        let mut rng = StdRng::seed_from_u64(77);
        let mut log = EventLog::new();
        for secs in 0..25 {
            let now = NaiveTime::from_num_seconds_from_midnight_opt(40000 + secs * 7, 0).unwrap();
            log.record(detect_event(&[10.0], 3.0, &mut rng, now).unwrap());
        }

        let csv = log.to_csv();
        assert_eq!(csv.lines().next(), Some(CSV_HEADER));
        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.len(), log.len());
        let original: Vec<Event> = log.iter().cloned().collect();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_write_csv_to_file() {
        let mut log = EventLog::new();
        log.record(event_at(10, Feeder::Feeder1));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event_log.csv");
        log.write_csv(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(parse_csv(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(parse_csv("").is_err());
        assert!(parse_csv("a,b,c\n").is_err());
        assert!(parse_csv("time,substation,feeder,location,status\n00:00:01,Substation-A\n").is_err());
        assert!(parse_csv(
            "time,substation,feeder,location,status\n00:00:01,Substation-C,Feeder-1,1.00 km,Unauthorized Fence\n"
        )
        .is_err());
        assert!(parse_csv(
            "time,substation,feeder,location,status\n25:00:01,Substation-A,Feeder-1,1.00 km,Unauthorized Fence\n"
        )
        .is_err());
    }
}
