use std::f64::consts::PI;
use anyhow::{anyhow, Result};
use log::debug;
use rayon::prelude::*;
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::utils::{DETECTION_THRESHOLD, DISPLAY_MAX_FREQ, RMS_WINDOW, WELCH_SEGMENT_LEN};

/// Configuration for detection and the derived views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub detection_threshold: f64,
    pub rms_window: usize,
    pub welch_segment_len: usize,
    pub display_max_freq: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            detection_threshold: DETECTION_THRESHOLD,
            rms_window: RMS_WINDOW,
            welch_segment_len: WELCH_SEGMENT_LEN,
            display_max_freq: DISPLAY_MAX_FREQ,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.detection_threshold.is_finite() {
            return Err(anyhow!("detection_threshold must be finite"));
        }
        if self.rms_window == 0 {
            return Err(anyhow!("rms_window must be at least 1"));
        }
        if self.welch_segment_len < 2 {
            return Err(anyhow!(
                "welch_segment_len must be at least 2, got {}",
                self.welch_segment_len
            ));
        }
        if !(self.display_max_freq.is_finite() && self.display_max_freq > 0.0) {
            return Err(anyhow!("display_max_freq must be positive"));
        }
        Ok(())
    }
}

fn magnitude(c: &Complex<f64>) -> f64 {
    (c.re * c.re + c.im * c.im).sqrt()
}

/// Magnitude of the DFT over the whole capture, non-negative half only.
///
/// Returns `(frequency, magnitude)` pairs for bins `0..N/2`, with bin `k` at `k * fs / N`.
pub fn spectrum_magnitude(signal: &[f64], sample_rate: f64) -> Result<Vec<(f64, f64)>> {
    let n = signal.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut indata = signal.to_vec();
    let mut spectrum = fft.make_output_vec();
    fft.process(&mut indata, &mut spectrum)
        .map_err(|e| anyhow!("FFT computation error: {:?}", e))?;

    let freq_step = sample_rate / n as f64;
    let half = n / 2;
    let magnitudes: Vec<(f64, f64)> = spectrum[..half]
        .par_iter()
        .enumerate()
        .map(|(i, c)| (i as f64 * freq_step, magnitude(c)))
        .collect();

    debug!("Computed spectrum: {} bins at {:.3} Hz spacing", magnitudes.len(), freq_step);
    Ok(magnitudes)
}

/// Periodic Hann window, as used for spectral estimation (not the symmetric filter-design form).
pub fn hann_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / len as f64;
            0.5 * (1.0 - x.cos())
        })
        .collect()
}

/// Power spectral density by Welch's method.
///
/// Segments of `segment_len` samples (shortened to the signal length if needed) overlap
/// by half a segment. Each segment is mean-removed and Hann-windowed. The periodograms
/// are density-scaled, folded to one side and averaged.
pub fn welch_psd(signal: &[f64], sample_rate: f64, segment_len: usize) -> Result<Vec<(f64, f64)>> {
    let nperseg = segment_len.min(signal.len());
    if nperseg == 0 {
        return Ok(Vec::new());
    }
    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let num_segments = (signal.len() - noverlap) / step;

    let window = hann_window(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sample_rate * window_power);

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let num_bins = nperseg / 2 + 1;

    let periodograms: Vec<Vec<f64>> = (0..num_segments)
        .into_par_iter()
        .map(|seg| -> Result<Vec<f64>> {
            let chunk = &signal[seg * step..seg * step + nperseg];
            let mean = chunk.iter().sum::<f64>() / nperseg as f64;
            let mut indata: Vec<f64> = chunk
                .iter()
                .zip(window.iter())
                .map(|(&s, &w)| (s - mean) * w)
                .collect();
            let mut spectrum = fft.make_output_vec();
            fft.process(&mut indata, &mut spectrum)
                .map_err(|e| anyhow!("FFT computation error in segment {}: {:?}", seg, e))?;
            Ok(spectrum.iter().map(|c| (c.re * c.re + c.im * c.im) * scale).collect())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut psd = vec![0.0; num_bins];
    for periodogram in &periodograms {
        for (acc, p) in psd.iter_mut().zip(periodogram) {
            *acc += p;
        }
    }

    // One-sided: fold negative frequencies onto positive, DC and Nyquist appear once
    let last_doubled = if nperseg % 2 == 0 { num_bins - 1 } else { num_bins };
    for bin in psd.iter_mut().take(last_doubled).skip(1) {
        *bin *= 2.0;
    }

    let count = periodograms.len().max(1) as f64;
    let freq_step = sample_rate / nperseg as f64;
    debug!(
        "Welch PSD: {} segments of {} samples, {} bins",
        periodograms.len(), nperseg, num_bins
    );

    Ok(psd
        .into_iter()
        .enumerate()
        .map(|(i, p)| (i as f64 * freq_step, p / count))
        .collect())
}

/// Sliding-window RMS with valid-mode semantics: output length is `len - window + 1`.
///
/// A zero window or a window longer than the signal yields no output.
pub fn rolling_rms(signal: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > signal.len() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(signal.len() - window + 1);
    let mut sum: f64 = signal[..window].iter().map(|s| s * s).sum();
    out.push((sum / window as f64).max(0.0).sqrt());

    for i in window..signal.len() {
        sum += signal[i] * signal[i] - signal[i - window] * signal[i - window];
        // Running sum can drift a hair below zero on long flat stretches
        out.push((sum / window as f64).max(0.0).sqrt());
    }

    out
}

/// Keeps only the points at or below `max_freq`.
pub fn band_limited(points: &[(f64, f64)], max_freq: f64) -> Vec<(f64, f64)> {
    points
        .iter()
        .copied()
        .take_while(|&(freq, _)| freq <= max_freq)
        .collect()
}
