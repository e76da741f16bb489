use std::f64::consts::PI;
use anyhow::{anyhow, Result};
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::utils::{
    MAINS_FREQ, NOISE_STD, NUM_SAMPLES, PULSE_BASE, PULSE_END, PULSE_SPREAD, PULSE_START,
    SAMPLE_RATE, WINDOW_SECS,
};

/// Parameters of the synthetic line-voltage capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub sample_rate: f64,  // Nominal rate, only used for the spectral axes
    pub num_samples: usize,
    pub window_secs: f64,
    pub mains_freq: f64,
    pub noise_std: f64,
    pub pulse_start: usize,
    pub pulse_end: usize,
    pub pulse_base: f64,
    pub pulse_spread: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            num_samples: NUM_SAMPLES,
            window_secs: WINDOW_SECS,
            mains_freq: MAINS_FREQ,
            noise_std: NOISE_STD,
            pulse_start: PULSE_START,
            pulse_end: PULSE_END,
            pulse_base: PULSE_BASE,
            pulse_spread: PULSE_SPREAD,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_samples < 2 {
            return Err(anyhow!("num_samples must be at least 2, got {}", self.num_samples));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(anyhow!("sample_rate must be positive, got {}", self.sample_rate));
        }
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(anyhow!("window_secs must be positive, got {}", self.window_secs));
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(anyhow!("noise_std must be a non-negative number, got {}", self.noise_std));
        }
        if self.pulse_start > self.pulse_end {
            return Err(anyhow!(
                "pulse range is reversed: {}..{}",
                self.pulse_start, self.pulse_end
            ));
        }
        if !(self.pulse_base.is_finite() && self.pulse_spread.is_finite() && self.pulse_spread >= 0.0) {
            return Err(anyhow!(
                "pulse level must be finite with a non-negative spread (base={}, spread={})",
                self.pulse_base, self.pulse_spread
            ));
        }
        Ok(())
    }
}

/// Sample instants in seconds, evenly spread over the closed window `[0, window_secs]`.
pub fn time_axis(config: &SignalConfig) -> Vec<f64> {
    let n = config.num_samples;
    if n < 2 {
        return vec![0.0; n];
    }
    let step = config.window_secs / (n - 1) as f64;
    (0..n).map(|i| i as f64 * step).collect()
}

/// Builds one capture: mains sine plus Gaussian noise, with an optional injected pulse.
///
/// The pulse level is drawn once per capture as `pulse_base + U(0, pulse_spread)` and
/// added over `[pulse_start, pulse_end)`. A range running past the buffer is truncated.
pub fn simulate_signal<R: Rng + ?Sized>(
    config: &SignalConfig,
    unauth: bool,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let noise = Normal::new(0.0, config.noise_std)
        .map_err(|e| anyhow!("Invalid noise scale {}: {}", config.noise_std, e))?;

    let omega = 2.0 * PI * config.mains_freq;
    let mut signal: Vec<f64> = time_axis(config)
        .into_iter()
        .map(|t| (omega * t).sin() + noise.sample(rng))
        .collect();

    if unauth {
        let level = config.pulse_base + rng.gen::<f64>() * config.pulse_spread;
        let end = config.pulse_end.min(signal.len());
        let start = config.pulse_start.min(end);
        for sample in &mut signal[start..end] {
            *sample += level;
        }
        debug!("Injected pulse of {:.3} over samples {}..{}", level, start, end);
    }

    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_time_axis_spans_window() {
        let config = SignalConfig::default();
        let t = time_axis(&config);
        assert_eq!(t.len(), NUM_SAMPLES);
        assert_eq!(t[0], 0.0);
        assert!((t[t.len() - 1] - WINDOW_SECS).abs() < 1e-12);
        assert!(t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_clean_signal_stays_near_mains() {
        let config = SignalConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let signal = simulate_signal(&config, false, &mut rng).unwrap();
        assert_eq!(signal.len(), config.num_samples);
        let peak = signal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(peak > 0.9 && peak < 1.2, "peak was {}", peak);
    }

    #[test]
    fn test_pulse_only_touches_its_range() {
        let config = SignalConfig { noise_std: 0.0, ..SignalConfig::default() };
        let mut rng = StdRng::seed_from_u64(11);
        let clean = simulate_signal(&config, false, &mut rng).unwrap();
        let pulsed = simulate_signal(&config, true, &mut rng).unwrap();

        let level = pulsed[PULSE_START] - clean[PULSE_START];
        assert!(level >= PULSE_BASE && level <= PULSE_BASE + PULSE_SPREAD);
        for i in 0..config.num_samples {
            let diff = pulsed[i] - clean[i];
            if (PULSE_START..PULSE_END).contains(&i) {
                assert!((diff - level).abs() < 1e-9, "sample {} diff {}", i, diff);
            } else {
                assert!(diff.abs() < 1e-12, "sample {} diff {}", i, diff);
            }
        }
    }

    #[test]
    fn test_pulse_range_truncated_to_buffer() {
        let config = SignalConfig { num_samples: 600, ..SignalConfig::default() };
        let mut rng = StdRng::seed_from_u64(3);
        let signal = simulate_signal(&config, true, &mut rng).unwrap();
        assert_eq!(signal.len(), 600);
        assert!(signal[599] > 5.0);
    }

    #[test]
    fn test_validate_rejects_bad_constants() {
        assert!(SignalConfig::default().validate().is_ok());
        assert!(SignalConfig { num_samples: 1, ..SignalConfig::default() }.validate().is_err());
        assert!(SignalConfig { noise_std: -0.1, ..SignalConfig::default() }.validate().is_err());
        assert!(SignalConfig { noise_std: f64::NAN, ..SignalConfig::default() }.validate().is_err());
        assert!(SignalConfig { pulse_start: 900, ..SignalConfig::default() }.validate().is_err());
    }
}
