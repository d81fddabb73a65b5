//! Viewer configuration.
//!
//! Settings can be built programmatically, read from `SECURE_VIEWER_*`
//! environment variables, or loaded from a JSON file. Missing JSON keys fall
//! back to the defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Responsive default zoom, chosen from the viewport width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBreakpoints {
    /// Widths below this are "narrow" (phones).
    pub narrow_below_px: f32,
    /// Widths below this are "small".
    pub small_below_px: f32,
    /// Widths below this are "medium"; anything wider is "wide".
    pub medium_below_px: f32,
    pub narrow_scale: f32,
    pub small_scale: f32,
    pub medium_scale: f32,
    pub wide_scale: f32,
}

impl Default for ScaleBreakpoints {
    fn default() -> Self {
        Self {
            narrow_below_px: 640.0,
            small_below_px: 768.0,
            medium_below_px: 1024.0,
            narrow_scale: 0.8,
            small_scale: 1.0,
            medium_scale: 1.2,
            wide_scale: 1.5,
        }
    }
}

impl ScaleBreakpoints {
    pub fn scale_for_width(&self, viewport_width: f32) -> f32 {
        if viewport_width < self.narrow_below_px {
            self.narrow_scale
        } else if viewport_width < self.small_below_px {
            self.small_scale
        } else if viewport_width < self.medium_below_px {
            self.medium_scale
        } else {
            self.wide_scale
        }
    }

    /// Thresholds must ascend and every tier needs a positive scale.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.narrow_below_px >= 0.0) {
            return Err(ConfigError::InvalidValue("breakpoints.narrow_below_px".to_string()));
        }
        if !(self.small_below_px >= self.narrow_below_px) {
            return Err(ConfigError::InvalidValue("breakpoints.small_below_px".to_string()));
        }
        if !(self.medium_below_px >= self.small_below_px) {
            return Err(ConfigError::InvalidValue("breakpoints.medium_below_px".to_string()));
        }

        let scales = [
            ("breakpoints.narrow_scale", self.narrow_scale),
            ("breakpoints.small_scale", self.small_scale),
            ("breakpoints.medium_scale", self.medium_scale),
            ("breakpoints.wide_scale", self.wide_scale),
        ];
        for (key, scale) in scales {
            if !(scale > 0.0 && scale.is_finite()) {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Scale change per zoom-in / zoom-out step.
    pub zoom_step: f32,
    /// Pages this far outside the visible area count as visible.
    pub lookahead_px: f32,
    /// Quiet period after the last scale change before pages are redrawn.
    pub settle_delay_ms: u64,
    /// Vertical gap between page slots.
    pub page_gap_px: f32,
    pub device_pixel_ratio: f32,
    pub breakpoints: ScaleBreakpoints,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 3.0,
            zoom_step: 0.25,
            lookahead_px: 200.0,
            settle_delay_ms: 150,
            page_gap_px: 16.0,
            device_pixel_ratio: 1.0,
            breakpoints: ScaleBreakpoints::default(),
        }
    }
}

impl ViewerConfig {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    pub fn with_lookahead(mut self, pixels: f32) -> Self {
        self.lookahead_px = pixels;
        self
    }

    pub fn with_page_gap(mut self, pixels: f32) -> Self {
        self.page_gap_px = pixels;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Clamp a requested scale into `[min_scale, max_scale]`.
    ///
    /// Never panics: inverted bounds are swapped and NaN bounds are ignored.
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        let (low, high) = if self.min_scale <= self.max_scale {
            (self.min_scale, self.max_scale)
        } else {
            (self.max_scale, self.min_scale)
        };
        if scale.is_nan() {
            return low;
        }
        scale.max(low).min(high)
    }

    /// Loads overrides from environment variables.
    ///
    /// Environment variables:
    /// - `SECURE_VIEWER_MIN_SCALE`, `SECURE_VIEWER_MAX_SCALE`
    /// - `SECURE_VIEWER_ZOOM_STEP`
    /// - `SECURE_VIEWER_LOOKAHEAD_PX`
    /// - `SECURE_VIEWER_SETTLE_MS`
    /// - `SECURE_VIEWER_DPR`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_value("SECURE_VIEWER_MIN_SCALE")? {
            config.min_scale = value;
        }
        if let Some(value) = env_value("SECURE_VIEWER_MAX_SCALE")? {
            config.max_scale = value;
        }
        if let Some(value) = env_value("SECURE_VIEWER_ZOOM_STEP")? {
            config.zoom_step = value;
        }
        if let Some(value) = env_value("SECURE_VIEWER_LOOKAHEAD_PX")? {
            config.lookahead_px = value;
        }
        if let Some(value) = env_value("SECURE_VIEWER_SETTLE_MS")? {
            config.settle_delay_ms = value;
        }
        if let Some(value) = env_value("SECURE_VIEWER_DPR")? {
            config.device_pixel_ratio = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_scale > 0.0) {
            return Err(ConfigError::InvalidValue("min_scale".to_string()));
        }
        if !(self.max_scale >= self.min_scale) {
            return Err(ConfigError::InvalidValue("max_scale".to_string()));
        }
        if !(self.zoom_step > 0.0) {
            return Err(ConfigError::InvalidValue("zoom_step".to_string()));
        }
        if !(self.lookahead_px >= 0.0) {
            return Err(ConfigError::InvalidValue("lookahead_px".to_string()));
        }
        if !(self.page_gap_px >= 0.0) {
            return Err(ConfigError::InvalidValue("page_gap_px".to_string()));
        }
        if !(self.device_pixel_ratio > 0.0) {
            return Err(ConfigError::InvalidValue("device_pixel_ratio".to_string()));
        }
        self.breakpoints.validate()
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
