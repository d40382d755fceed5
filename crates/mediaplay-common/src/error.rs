//! Error types for playback operations

/// Error type for animation and sound playback operations
///
/// Contention on the shared sequencer is not an error: a denied acquire is
/// reported as a value by the arbiter. Stale device callbacks never surface
/// here either; they are absorbed where they arrive.
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    /// Malformed call: out-of-range restart/seek target, bad argument
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Named entry does not exist
    #[error("No entry named '{name}' in {scope}")]
    NotFound {
        /// Name that was looked up
        name: String,
        /// Where the lookup happened (group, library, ...)
        scope: String,
    },

    /// The output device cannot render the media
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No device could be obtained, or the device has been closed
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Runtime failure reported by a device
    #[error("Device error: {0}")]
    Device(String),

    /// The device rejected the loaded media data
    #[error("Invalid media data: {0}")]
    InvalidData(String),

    /// `play()` was called before any media was loaded
    #[error("No media loaded")]
    NotLoaded,

    /// A registry already holds an entry under this name
    #[error("Name '{0}' already exists")]
    DuplicateName(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_scope() {
        let err = PlaybackError::NotFound {
            name: "walk9".into(),
            scope: "group [idle, walk1]".into(),
        };
        assert_eq!(
            err.to_string(),
            "No entry named 'walk9' in group [idle, walk1]"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PlaybackError = io.into();
        assert!(matches!(err, PlaybackError::Io(_)));
    }
}
