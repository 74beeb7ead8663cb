//! Engine tuning knobs.

use core::time::Duration;
use serde::Deserialize;
use std::str::FromStr;
use vs_core::EngineError;
use vs_core::EngineResult;

/// Timings, presets, and input bounds used by every controller of one engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Auto-hide delay while the pointer lingers over a video.
    pub hide_delay_ms: u64,
    /// Period of the per-video rate re-assertion check.
    pub enforce_interval_ms: u64,
    /// How long a freshly attached panel stays visible.
    pub flash_duration_ms: u64,
    /// Panel offset from the video's top-left corner.
    pub panel_offset_px: f64,
    /// Ascending preset speeds offered by the dropdown.
    pub presets: Vec<f64>,
    pub default_preset: f64,
    pub input_min: f64,
    pub input_max: f64,
    pub input_step: f64,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hide_delay_ms: 2000,
            enforce_interval_ms: 1000,
            flash_duration_ms: 1000,
            panel_offset_px: 10.0,
            presets: vec![0.1, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0],
            default_preset: 1.0,
            input_min: 0.1,
            input_max: 16.0,
            input_step: 0.1,
            log_level: "warn".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON object; missing fields keep their defaults.
    pub fn from_json(input: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(input).map_err(|error| {
            EngineError::new(
                "engine.config.invalid",
                format!("failed to parse engine config: {error}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.presets.is_empty() {
            return Err(EngineError::new(
                "engine.config.presets_empty",
                "at least one preset speed is required",
            ));
        }

        if let Some(bad) = self
            .presets
            .iter()
            .chain([&self.default_preset, &self.input_min, &self.input_max])
            .find(|rate| !rate.is_finite() || **rate <= 0.0)
        {
            return Err(EngineError::new(
                "engine.config.rate_invalid",
                format!("speed {bad} must be a positive finite number"),
            ));
        }

        if self.input_min > self.input_max {
            return Err(EngineError::new(
                "engine.config.input_range",
                format!(
                    "input minimum {} exceeds maximum {}",
                    self.input_min, self.input_max
                ),
            ));
        }

        if self.hide_delay_ms == 0 || self.enforce_interval_ms == 0 || self.flash_duration_ms == 0
        {
            return Err(EngineError::new(
                "engine.config.duration_zero",
                "hide delay, enforcement interval and flash duration must be non-zero",
            ));
        }

        Ok(())
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    pub fn enforce_interval(&self) -> Duration {
        Duration::from_millis(self.enforce_interval_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    /// Unknown level names fall back to `warn`.
    pub fn log_level_filter(&self) -> log::LevelFilter {
        log::LevelFilter::from_str(self.log_level.trim()).unwrap_or(log::LevelFilter::Warn)
    }
}
