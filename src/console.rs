use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use anyhow::Result;
use log::info;
use rand::Rng;

use crate::display::format_refresh;
use crate::session::Session;
use crate::settings::Controls;

/// Headless polling loop: one refresh per interval until `refreshes` is reached or
/// `shutdown_flag` is raised.
pub fn run_headless<R: Rng, W: Write>(
    session: &mut Session<R>,
    controls: &Controls,
    refreshes: usize,
    interval: Duration,
    shutdown_flag: Arc<AtomicBool>,
    out: &mut W,
) -> Result<()> {
    info!("Headless run: {} refreshes every {:?}", refreshes, interval);

    for i in 0..refreshes {
        if shutdown_flag.load(Ordering::SeqCst) {
            info!("Shutdown requested after {} refreshes", i);
            break;
        }

        let refresh = session.refresh(controls)?;
        writeln!(out, "{}", format_refresh(refresh.refresh_no, &refresh.banners, session.log()))?;
        out.flush()?;

        if i + 1 < refreshes && !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    Ok(())
}

/// Writes the session log when an export path was given.
pub fn export_if_requested<R: Rng>(session: &Session<R>, export: Option<&Path>) -> Result<()> {
    if let Some(path) = export {
        session.log().write_csv(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::parse_csv;
    use crate::settings::Settings;

    #[test]
    fn test_headless_run_prints_each_refresh() {
        let mut session = Session::new(&Settings::default(), Some(8));
        let controls = Controls { inject_pulse: true, ..Controls::default() };
        let mut out = Vec::new();
        run_headless(
            &mut session,
            &controls,
            3,
            Duration::ZERO,
            Arc::new(AtomicBool::new(false)),
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("--- refresh #").count(), 3);
        assert_eq!(text.matches("[ALERT]").count(), 3);
        assert!(text.contains("Event history: 3 events"));
        assert_eq!(session.log().len(), 3);
    }

    #[test]
    fn test_shutdown_flag_stops_loop() {
        let mut session = Session::new(&Settings::default(), Some(8));
        let mut out = Vec::new();
        run_headless(
            &mut session,
            &Controls::default(),
            5,
            Duration::ZERO,
            Arc::new(AtomicBool::new(true)),
            &mut out,
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(session.refresh_count(), 0);
    }

    #[test]
    fn test_export_after_run() {
        let mut session = Session::new(&Settings::default(), Some(4));
        let controls = Controls { inject_pulse: true, ..Controls::default() };
        let mut out = Vec::new();
        run_headless(&mut session, &controls, 2, Duration::ZERO, Arc::new(AtomicBool::new(false)), &mut out)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event_log.csv");
        export_if_requested(&session, Some(&path)).unwrap();
        let parsed = parse_csv(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);

        export_if_requested(&session, None).unwrap();
    }
}
