//! Frame driver configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a [`FrameConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config is not valid JSON for a [`FrameConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The frame rate must be finite and positive, and its frame duration
    /// must fit in a [`Duration`].
    #[error("invalid frame rate: {0} (must be finite, > 0 and not vanishingly small)")]
    InvalidFrameRate(f64),
}

/// Configuration for the [`FrameDriver`](crate::FrameDriver) loop.
///
/// Missing JSON fields fall back to [`FrameConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target frames per second.
    pub frame_rate: f64,
    /// Maximum number of frames to run (0 = unlimited).
    pub max_frames: u64,
    /// Stop once nothing is live or waiting to go live.
    pub stop_when_empty: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            max_frames: 0,
            stop_when_empty: false,
        }
    }
}

impl FrameConfig {
    /// Override the target frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Limit the number of frames [`run`](crate::FrameDriver::run) executes.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Stop the loop once the registry has nothing left to simulate.
    #[must_use]
    pub fn stopping_when_empty(mut self) -> Self {
        self.stop_when_empty = true;
        self
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidFrameRate`] for a bad rate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check that the frame rate is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFrameRate`] if the rate is not finite
    /// and positive, or so small that one frame outlasts [`Duration::MAX`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let usable = self.frame_rate.is_finite()
            && self.frame_rate > 0.0
            && Duration::try_from_secs_f64(1.0 / self.frame_rate).is_ok();
        if !usable {
            return Err(ConfigError::InvalidFrameRate(self.frame_rate));
        }
        Ok(())
    }

    /// Wall-clock budget of one frame. Only meaningful for a validated config;
    /// rates [`validate`](Self::validate) rejects saturate to [`Duration::MAX`].
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frame_rate).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FrameConfig::default();
        assert!((config.frame_rate - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.max_frames, 0);
        assert!(!config.stop_when_empty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = FrameConfig::default()
            .with_frame_rate(30.0)
            .with_max_frames(10)
            .stopping_when_empty();
        assert_eq!(config.max_frames, 10);
        assert!(config.stop_when_empty);
        assert_eq!(config.frame_duration(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FrameConfig::from_json_str(r#"{ "max_frames": 120 }"#).unwrap();
        assert_eq!(config.max_frames, 120);
        assert!((config.frame_rate - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_rate() {
        assert!(matches!(
            FrameConfig::from_json_str(r#"{ "frame_rate": 0 }"#),
            Err(ConfigError::InvalidFrameRate(_))
        ));
        assert!(matches!(
            FrameConfig::default().with_frame_rate(f64::NAN).validate(),
            Err(ConfigError::InvalidFrameRate(_))
        ));
    }

    #[test]
    fn test_rejects_rate_too_small_for_a_frame_duration() {
        let tiny = FrameConfig::default().with_frame_rate(1e-20);
        assert!(matches!(tiny.validate(), Err(ConfigError::InvalidFrameRate(_))));
        assert_eq!(tiny.frame_duration(), Duration::MAX);
        assert!(matches!(
            FrameConfig::from_json_str(r#"{ "frame_rate": 1e-300 }"#),
            Err(ConfigError::InvalidFrameRate(_))
        ));

        let slow = FrameConfig::default().with_frame_rate(0.5);
        assert!(slow.validate().is_ok());
        assert_eq!(slow.frame_duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            FrameConfig::from_json_str("{ frame_rate: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = FrameConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("not/here.json"));
    }
}
