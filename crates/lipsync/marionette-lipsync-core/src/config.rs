//! Analyser and mouth-mapping settings.

use serde::{Deserialize, Serialize};

use crate::LipSyncError;

/// Configuration handed to [`crate::AudioDevice::create_analyser`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Window size; also the length of the sample buffer
    pub fft_size: usize,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Time smoothing constant in [0, 1]
    pub smoothing: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            min_decibels: -90.0,
            max_decibels: -10.0,
            smoothing: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    pub analyser: AnalyserConfig,
    /// Multiplier applied to the mean square before the root
    pub gain: f32,
    pub bias_power: f32,
    pub bias_weight: f32,
    /// Output clamp; the mouth never fully closes while a voice is audible
    pub min_value: f32,
    pub max_value: f32,
    /// Cross-origin mode applied to every source unless a play overrides it
    pub cross_origin: Option<String>,
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            analyser: AnalyserConfig::default(),
            gain: 20.0,
            bias_power: 0.7,
            bias_weight: 1.2,
            min_value: 0.4,
            max_value: 1.0,
            cross_origin: None,
        }
    }
}

impl LipSyncConfig {
    pub fn validate(&self) -> Result<(), LipSyncError> {
        let a = &self.analyser;
        if !a.fft_size.is_power_of_two() || !(32..=32768).contains(&a.fft_size) {
            return Err(LipSyncError::invalid_config(format!(
                "fft_size must be a power of two in 32..=32768, got {}",
                a.fft_size
            )));
        }
        if a.min_decibels >= a.max_decibels {
            return Err(LipSyncError::invalid_config(
                "min_decibels must be below max_decibels",
            ));
        }
        if !(0.0..=1.0).contains(&a.smoothing) {
            return Err(LipSyncError::invalid_config("smoothing must be within [0, 1]"));
        }
        if self.gain <= 0.0 || self.bias_power <= 0.0 || self.bias_weight <= 0.0 {
            return Err(LipSyncError::invalid_config(
                "gain and bias factors must be positive",
            ));
        }
        if self.min_value > self.max_value {
            return Err(LipSyncError::invalid_config("min_value exceeds max_value"));
        }
        Ok(())
    }
}

/// Per-play overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayOptions {
    pub volume: Option<f32>,
    pub cross_origin: Option<String>,
}

impl PlayOptions {
    pub fn volume(volume: f32) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = LipSyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analyser.fft_size, 256);
        assert_eq!(config.analyser.smoothing, 0.85);
    }

    #[test]
    fn rejects_bad_window_and_ranges() {
        let mut config = LipSyncConfig::default();
        config.analyser.fft_size = 300;
        assert!(config.validate().is_err());

        let mut config = LipSyncConfig::default();
        config.analyser.min_decibels = 0.0;
        assert!(config.validate().is_err());

        let config = LipSyncConfig {
            min_value: 2.0,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().category(), "config");
    }
}
