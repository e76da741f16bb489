use std::fs;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::fft_analysis::AnalysisConfig;
use crate::make_waves::SignalConfig;

// Sidebar toggles. Each one only decides which branches of a refresh run or render.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Controls {
    pub inject_pulse: bool,
    pub show_fft: bool,
    pub show_psd: bool,
    pub show_rms: bool,
    pub show_feeder_counts: bool,
    pub send_sms: bool,
    pub sound_siren: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            inject_pulse: false,
            show_fft: true,
            show_psd: true,
            show_rms: true,
            show_feeder_counts: true,
            send_sms: true,
            sound_siren: true,
        }
    }
}

/// Everything the dashboard reads from its YAML settings file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub controls: Controls,
    pub signal: SignalConfig,
    pub analysis: AnalysisConfig,
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings file at {}. Using defaults.", path.display());
            return Ok(Self::default());
        }

        info!("Loading settings from {}", path.display());
        let yaml_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&yaml_str)
            .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml_str = serde_yaml::to_string(self)?;
        fs::write(path, yaml_str)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.signal.validate().context("Invalid signal settings")?;
        self.analysis.validate().context("Invalid analysis settings")?;
        Ok(())
    }
}
