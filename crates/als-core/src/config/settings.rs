use crate::region::{Anchor, DisplayDimensions};
use crate::{Error, Result};
use als_types::ResponseLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Daemon configuration.
///
/// Everything except `grabrect` has a default that matches the reference
/// panel the sample region formulas were written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Sensor anchor as "left top" in rotation-0 pixel coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grabrect: Option<String>,

    #[serde(default = "default_radius")]
    pub radius: i32,

    #[serde(default = "default_display_width")]
    pub display_width: i32,

    #[serde(default = "default_display_height")]
    pub display_height: i32,

    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    #[serde(default)]
    pub response_layout: ResponseLayout,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

pub const DEFAULT_RADIUS: i32 = 40;
pub const DEFAULT_DISPLAY_WIDTH: i32 = 1080;
pub const DEFAULT_DISPLAY_HEIGHT: i32 = 2400;
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 2000;

fn default_radius() -> i32 {
    DEFAULT_RADIUS
}

fn default_display_width() -> i32 {
    DEFAULT_DISPLAY_WIDTH
}

fn default_display_height() -> i32 {
    DEFAULT_DISPLAY_HEIGHT
}

fn default_capture_timeout_ms() -> u64 {
    DEFAULT_CAPTURE_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grabrect: None,
            radius: DEFAULT_RADIUS,
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            response_layout: ResponseLayout::default(),
            socket_path: None,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, &path.display().to_string());
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parse the configured anchor.
    ///
    /// Returns `Ok(None)` when no anchor is configured: the setting is
    /// missing, blank, or its left coordinate is 0 or not an integer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a non-zero left coordinate is not followed
    /// by an integer top coordinate.
    pub fn anchor(&self) -> Result<Option<Anchor>> {
        let Some(raw) = self.grabrect.as_deref() else {
            return Ok(None);
        };

        let mut fields = raw.split_whitespace();
        let Some(left) = fields.next() else {
            return Ok(None);
        };

        let Ok(left) = left.parse::<i32>() else {
            warn!("grabrect left '{}' is not an integer, treating as unset", left);
            return Ok(None);
        };
        if left == 0 {
            return Ok(None);
        }

        let top = fields
            .next()
            .ok_or_else(|| Error::Config(format!("grabrect '{raw}' is missing the top value")))?;
        let top: i32 = top
            .parse()
            .map_err(|e| Error::Config(format!("grabrect top '{top}' is not an integer: {e}")))?;

        Ok(Some(Anchor { x: left, y: top }))
    }

    #[must_use]
    pub fn display(&self) -> DisplayDimensions {
        DisplayDimensions {
            width: self.display_width,
            height: self.display_height,
        }
    }

    #[must_use]
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Check the numeric settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first out-of-range setting.
    pub fn validate(&self) -> Result<()> {
        if self.radius <= 0 {
            return Err(Error::Config(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if self.display_width <= 0 || self.display_height <= 0 {
            return Err(Error::Config(format!(
                "display dimensions must be positive, got {}x{}",
                self.display_width, self.display_height
            )));
        }
        if self.capture_timeout_ms == 0 {
            return Err(Error::Config(
                "captureTimeoutMs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
