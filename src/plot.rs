use std::path::PathBuf;
use anyhow::{anyhow, Result};
use eframe::NativeOptions;
use egui::Color32;
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};
use log::{error, info};

use crate::display::{BannerLevel, MapPoint, NO_EVENTS_MESSAGE};
use crate::event_log::EventLog;
use crate::session::{Refresh, Session};
use crate::settings::{Controls, Settings};
use crate::utils::{DEFAULT_EXPORT_FILE, DISPLAY_MAX_FREQ};

pub const APP_TITLE: &str = "Smart Fence Guardian 2.0";
const PLOT_HEIGHT: f32 = 260.0;

const WAVE_COLOR: Color32 = Color32::from_rgb(100, 150, 255);
const FFT_COLOR: Color32 = Color32::from_rgb(255, 165, 0);
const PSD_COLOR: Color32 = Color32::from_rgb(0, 200, 0);
const RMS_COLOR: Color32 = Color32::from_rgb(160, 32, 240);
const ALERT_COLOR: Color32 = Color32::from_rgb(255, 60, 60);

fn banner_color(level: BannerLevel) -> Color32 {
    match level {
        BannerLevel::Success => Color32::from_rgb(80, 200, 120),
        BannerLevel::Info => Color32::from_rgb(100, 170, 255),
        BannerLevel::Warning => Color32::from_rgb(255, 200, 0),
        BannerLevel::Error => ALERT_COLOR,
    }
}

pub struct GuardianApp {
    session: Session,
    controls: Controls,
    settings: Settings,
    settings_path: PathBuf,
    latest: Option<Refresh>,
    status: Option<String>,
}

impl GuardianApp {
    /// Builds the dashboard and runs the first refresh so the window never opens empty.
    pub fn new(session: Session, settings: Settings, settings_path: PathBuf) -> Self {
        let mut app = Self {
            session,
            controls: settings.controls,
            settings,
            settings_path,
            latest: None,
            status: None,
        };
        app.run_refresh();
        app
    }

    fn run_refresh(&mut self) {
        match self.session.refresh(&self.controls) {
            Ok(refresh) => self.latest = Some(refresh),
            Err(e) => {
                error!("Refresh failed: {:?}", e);
                self.status = Some(format!("Refresh failed: {}", e));
            }
        }
    }

    /// Sidebar. Returns true when a pass should run.
    fn controls_panel(&mut self, ui: &mut egui::Ui) -> bool {
        ui.heading("Simulation Controls");
        ui.separator();

        let c = &mut self.controls;
        let mut changed = false;
        changed |= ui.checkbox(&mut c.inject_pulse, "Inject Unauthorized Fence Pulse").changed();
        changed |= ui.checkbox(&mut c.show_fft, "Show FFT Spectrum").changed();
        changed |= ui.checkbox(&mut c.show_psd, "Show Power Spectral Density").changed();
        changed |= ui.checkbox(&mut c.show_rms, "Show RMS Trend").changed();
        changed |= ui.checkbox(&mut c.show_feeder_counts, "Show Feeder Event Count").changed();
        changed |= ui.checkbox(&mut c.send_sms, "Simulate SMS Alerts").changed();
        changed |= ui.checkbox(&mut c.sound_siren, "Activate Siren Alarm").changed();

        ui.separator();
        if ui.button("Refresh").clicked() {
            changed = true;
        }
        if ui.button("Save controls as defaults").clicked() {
            self.save_defaults();
        }

        if let Some(status) = &self.status {
            ui.separator();
            ui.label(status.as_str());
        }
        changed
    }

    fn save_defaults(&mut self) {
        self.settings.controls = self.controls;
        self.status = Some(match self.settings.save(&self.settings_path) {
            Ok(()) => format!("Saved defaults to {}", self.settings_path.display()),
            Err(e) => {
                error!("Failed to save settings: {:?}", e);
                format!("Could not save settings: {}", e)
            }
        });
    }

    fn export_log(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(DEFAULT_EXPORT_FILE)
            .save_file()
        else {
            info!("Export cancelled");
            return;
        };

        self.status = Some(match self.session.log().write_csv(&path) {
            Ok(()) => format!("Event log written to {}", path.display()),
            Err(e) => {
                error!("Export failed: {:?}", e);
                format!("Export failed: {}", e)
            }
        });
    }

    fn dashboard(&mut self, ui: &mut egui::Ui) {
        ui.heading(APP_TITLE);
        ui.label("Unauthorized Electric Fence Detection, Localization & Alerts");
        ui.separator();

        let mut export_requested = false;
        if let Some(refresh) = &self.latest {
            signal_panels(ui, refresh);
            ui.separator();

            for banner in &refresh.banners {
                ui.colored_label(banner_color(banner.level), banner.text.as_str());
            }
            ui.separator();

            ui.strong("Map View (Kerala)");
            map_panel(ui, refresh.map_point, refresh.event.is_some());
            ui.separator();
        }

        ui.strong("Event History");
        let log = self.session.log();
        if log.is_empty() {
            ui.label(NO_EVENTS_MESSAGE);
        } else {
            event_table(ui, log);
            if self.controls.show_feeder_counts {
                ui.add_space(8.0);
                ui.strong("Feeder Event Count");
                feeder_count_chart(ui, log);
            }
            if ui.button("Download Event Log (CSV)").clicked() {
                export_requested = true;
            }
        }

        if export_requested {
            self.export_log();
        }
    }
}

impl eframe::App for GuardianApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        let mut needs_refresh = false;
        egui::SidePanel::left("controls").show(ctx, |ui| {
            needs_refresh = self.controls_panel(ui);
        });
        // A pass runs per interaction, not per frame
        if needs_refresh {
            self.run_refresh();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.dashboard(ui);
            });
        });
    }
}

fn line_plot(
    ui: &mut egui::Ui,
    id: &str,
    points: Vec<[f64; 2]>,
    color: Color32,
    axis_labels: (&str, &str),
    max_x: Option<f64>,
) {
    let mut plot = Plot::new(id)
        .height(PLOT_HEIGHT)
        .allow_scroll(false)
        .x_axis_label(axis_labels.0)
        .y_axis_label(axis_labels.1);
    if let Some(max_x) = max_x {
        plot = plot.include_x(0.0).include_x(max_x);
    }
    plot.show(ui, |plot_ui| {
        plot_ui.line(Line::new(PlotPoints::from(points)).color(color).width(1.0));
    });
}

fn signal_panels(ui: &mut egui::Ui, refresh: &Refresh) {
    ui.columns(2, |cols| {
        cols[0].strong("Line Voltage Signal (40 ms window)");
        let wave: Vec<[f64; 2]> = refresh
            .time_ms
            .iter()
            .zip(&refresh.signal)
            .map(|(&t, &v)| [t, v])
            .collect();
        line_plot(&mut cols[0], "waveform", wave, WAVE_COLOR, ("Time (ms)", "Amplitude"), None);

        if let Some(spectrum) = &refresh.spectrum {
            cols[1].strong("Frequency Spectrum (FFT)");
            let points = spectrum.iter().map(|&(f, m)| [f, m]).collect();
            line_plot(
                &mut cols[1],
                "fft",
                points,
                FFT_COLOR,
                ("Frequency (Hz)", "Magnitude"),
                Some(DISPLAY_MAX_FREQ),
            );
        }
    });

    if let Some(psd) = &refresh.psd_db {
        ui.strong("Power Spectral Density (Welch Method)");
        let points = psd.iter().map(|&(f, db)| [f, db]).collect();
        line_plot(
            ui,
            "psd",
            points,
            PSD_COLOR,
            ("Frequency (Hz)", "Power/Frequency (dB/Hz)"),
            Some(DISPLAY_MAX_FREQ),
        );
    }

    if let Some(rms) = &refresh.rms {
        ui.strong("Rolling RMS Trend");
        let points = rms.iter().enumerate().map(|(i, &v)| [i as f64, v]).collect();
        line_plot(ui, "rms", points, RMS_COLOR, ("Sample Index", "RMS Amplitude"), None);
    }
}

fn map_panel(ui: &mut egui::Ui, point: MapPoint, alarmed: bool) {
    let (min, max) = MapPoint::bounds();
    let color = if alarmed { ALERT_COLOR } else { banner_color(BannerLevel::Success) };
    Plot::new("map")
        .height(PLOT_HEIGHT)
        .data_aspect(1.0)
        .include_x(min[0])
        .include_x(max[0])
        .include_y(min[1])
        .include_y(max[1])
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .show(ui, |plot_ui| {
            plot_ui.points(
                Points::new(vec![[point.lon, point.lat]])
                    .radius(6.0)
                    .color(color)
                    .name("Last reading"),
            );
        });
}

fn event_table(ui: &mut egui::Ui, log: &EventLog) {
    egui::Grid::new("event_history")
        .striped(true)
        .num_columns(5)
        .show(ui, |ui| {
            for header in ["time", "substation", "feeder", "location", "status"] {
                ui.strong(header);
            }
            ui.end_row();

            for event in log.iter() {
                ui.label(event.time_label());
                ui.label(event.substation.label());
                ui.label(event.feeder.label());
                ui.label(event.location_label());
                ui.label(event.status.to_string());
                ui.end_row();
            }
        });
}

fn feeder_count_chart(ui: &mut egui::Ui, log: &EventLog) {
    let bars: Vec<Bar> = log
        .feeder_counts()
        .iter()
        .enumerate()
        .map(|(i, (feeder, count))| Bar::new(i as f64, *count as f64).name(feeder.label()).width(0.6))
        .collect();

    Plot::new("feeder_counts")
        .height(PLOT_HEIGHT * 0.75)
        .legend(Legend::default())
        .include_y(0.0)
        .y_axis_label("Count")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name("Events per feeder").color(ALERT_COLOR));
        });

    let summary = log
        .feeder_counts()
        .iter()
        .map(|(feeder, count)| format!("{}: {}", feeder, count))
        .collect::<Vec<_>>()
        .join("   ");
    ui.label(summary);
}

pub fn run_dashboard(app: GuardianApp) -> Result<()> {
    let native_options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_title(APP_TITLE),
        vsync: true,
        ..Default::default()
    };

    info!("Starting GUI...");
    eframe::run_native(APP_TITLE, native_options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow!("GUI error: {}", e))
}
