//! Common types shared by the mediaplay animation and sound crates.
//!
//! # Contents
//!
//! - [`PlaybackState`] - the four-state sound lifecycle
//! - [`PlayerId`] - process-unique identity for sound players
//! - [`WatcherSet`] - non-owning observer registry
//! - [`PlaybackError`] / [`Result`] - error taxonomy
//! - [`PlaybackConfig`] - serde-backed defaults
//!
//! # Example
//!
//! ```
//! use mediaplay_common::{PlaybackConfig, PlaybackState};
//!
//! let json = r#"{ "animation": { "tick_period_ms": 80 } }"#;
//! let config = PlaybackConfig::from_json_str(json).unwrap();
//! assert_eq!(config.animation.tick_period_ms, 80);
//! assert_eq!(PlaybackState::default(), PlaybackState::Finished);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod player;
mod watcher;

pub use config::{AnimationConfig, PlaybackConfig, SoundConfig};
pub use error::{PlaybackError, Result};
pub use player::{PlaybackState, PlayerId};
pub use watcher::WatcherSet;

// ============================================================================
// Common Constants
// ============================================================================

/// Default time between animation frames (milliseconds).
pub const DEFAULT_TICK_PERIOD_MS: u64 = 100;

/// Microseconds per millisecond.
pub const MICROS_PER_MILLI: u64 = 1_000;
