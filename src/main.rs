mod console;
mod detector;
mod display;
mod event_log;
mod fft_analysis;
mod make_waves;
mod plot;
mod session;
mod settings;
mod utils;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use anyhow::{anyhow, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};

use crate::plot::GuardianApp;
use crate::session::Session;
use crate::settings::Settings;
use crate::utils::DEFAULT_SETTINGS_FILE;

#[derive(Parser, Debug)]
#[command(name = "fence_guardian", about = "Simulated unauthorized electric fence detection dashboard")]
struct Cli {
    /// YAML file with default controls and signal constants
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    /// Log to stderr, honouring RUST_LOG
    #[arg(long)]
    enable_logs: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Run the refresh loop in the terminal instead of opening a window
    #[arg(long)]
    headless: bool,

    #[arg(long, default_value_t = 10)]
    refreshes: usize,

    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Force pulse injection regardless of the saved controls
    #[arg(long)]
    unauth: bool,

    /// CSV path for the event log after a headless run
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let logging = cli.enable_logs || cli.log_file.is_some();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        if logging {
            error!("Application encountered an error: {:?}", e);
        } else {
            eprintln!("Error: {:?}", e);
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.log_file {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}] {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(LevelFilter::Warn)
            .level_for("fence_guardian", LevelFilter::Info)
            .chain(fern::log_file(path)?)
            .apply()
            .map_err(|e| anyhow!("Failed to install file logger: {}", e))?;
    } else if cli.enable_logs {
        // Don't override RUST_LOG if it's already set
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("fence_guardian=info"),
        )
        .init();
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli.settings)?;
    let mut controls = settings.controls;
    if cli.unauth {
        controls.inject_pulse = true;
    }

    let mut session = Session::new(&settings, cli.seed);
    match cli.seed {
        Some(seed) => info!("Session seeded with {}", seed),
        None => info!("Session seeded from entropy"),
    }

    if cli.headless {
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&shutdown_flag);
        ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
        })?;

        console::run_headless(
            &mut session,
            &controls,
            cli.refreshes,
            Duration::from_millis(cli.interval_ms),
            shutdown_flag,
            &mut io::stdout().lock(),
        )?;
        console::export_if_requested(&session, cli.export.as_deref())?;
        info!(
            "Headless run finished after {} refreshes with {} events",
            session.refresh_count(),
            session.log().len()
        );
        if let Some(last) = session.log().latest() {
            info!("Most recent event at {} on {}", last.time_label(), last.feeder);
        }
        return Ok(());
    }

    if cli.export.is_some() {
        warn!("--export only applies to headless runs; use the download button in the window");
    }

    let settings = Settings { controls, ..settings };
    plot::run_dashboard(GuardianApp::new(session, settings, cli.settings))
}
