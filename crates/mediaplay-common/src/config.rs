//! Playback defaults loaded from JSON.
//!
//! Every field has a default, so a partial document (or `{}`) is valid.

use crate::{PlaybackError, Result, DEFAULT_TICK_PERIOD_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Defaults applied to newly created animation sequencers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Time each frame stays on screen (milliseconds)
    pub tick_period_ms: u64,
    /// Whether sequencers loop instead of stopping at the last frame
    pub repeating: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            repeating: false,
        }
    }
}

/// Defaults applied to newly registered sound players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Whether players restart from the beginning when the stream ends
    pub looping: bool,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Animation defaults
    pub animation: AnimationConfig,
    /// Sound defaults
    pub sound: SoundConfig,
}

impl PlaybackConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PlaybackError::ConfigError(e.to_string()))
    }

    /// Read and parse a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize back to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlaybackError::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PlaybackConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PlaybackConfig::default());
        assert_eq!(config.animation.tick_period_ms, DEFAULT_TICK_PERIOD_MS);
        assert!(!config.sound.looping);
    }

    #[test]
    fn test_partial_document() {
        let config =
            PlaybackConfig::from_json_str(r#"{ "sound": { "looping": true } }"#).unwrap();
        assert!(config.sound.looping);
        assert!(!config.animation.repeating);
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let err = PlaybackConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, PlaybackError::ConfigError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PlaybackConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PlaybackError::Io(_)));
    }

    #[test]
    fn test_json_roundtrip_preserves_values() {
        let config = PlaybackConfig {
            animation: AnimationConfig {
                tick_period_ms: 40,
                repeating: true,
            },
            sound: SoundConfig { looping: true },
        };
        let text = config.to_json_string().unwrap();
        assert_eq!(PlaybackConfig::from_json_str(&text).unwrap(), config);
    }
}
