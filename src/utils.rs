use log::debug;

pub const SAMPLE_RATE: f64 = 20000.0;  // Nominal sampling frequency used for the spectral axes
pub const NUM_SAMPLES: usize = 20000;  // One sample per nominal Hz, spread over the window
pub const WINDOW_SECS: f64 = 0.04;  // 40 ms capture window
pub const MAINS_FREQ: f64 = 50.0;
pub const NOISE_STD: f64 = 0.02;

// Injected pulse, indices are half-open [start, end)
pub const PULSE_START: usize = 500;
pub const PULSE_END: usize = 800;
pub const PULSE_BASE: f64 = 8.0;
pub const PULSE_SPREAD: f64 = 2.0;

pub const DETECTION_THRESHOLD: f64 = 3.0;
pub const RMS_WINDOW: usize = 500;
pub const WELCH_SEGMENT_LEN: usize = 1024;
pub const DISPLAY_MAX_FREQ: f64 = 1000.0;  // Upper bound of the FFT/PSD plots

pub const DEFAULT_SETTINGS_FILE: &str = "fence_guardian.yaml";
pub const DEFAULT_EXPORT_FILE: &str = "event_log.csv";

/// Rounds to two decimals, the precision used for reported distances.
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Converts a power density to dB, clamping silence so the log plot stays finite.
pub fn power_to_db(power: f64) -> f64 {
    if power > 1e-30 {
        10.0 * power.log10()
    } else {
        debug!("Clamping power {:e} to -300 dB", power);
        -300.0
    }
}
