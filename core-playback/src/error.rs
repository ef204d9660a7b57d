//! # Playback Error Types
//!
//! Error types for the playback controller and the preload cache.
//!
//! Hardware failures are not errors of the command surface: they become
//! session state (`Errored`, `last_error`) and a bus event. What remains here
//! is what a caller can act on.

use bridge_traits::MediaError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the playback command surface.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The engine task has shut down; the controller is inert.
    #[error("Playback engine is not running")]
    EngineStopped,

    /// A [`PlaybackConfig`](crate::PlaybackConfig) value is out of range.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Preloading a locator failed.
    #[error(transparent)]
    Preload(#[from] PreloadError),
}

/// Why a preload readiness future rejected.
///
/// Cloneable: the same outcome is delivered to every waiter of a shared
/// readiness future.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreloadError {
    /// The entry was released, evicted or cleared before becoming ready.
    #[error("Preload entry was released before it became ready")]
    Released,

    /// No readiness signal and not enough data buffered when the timeout hit.
    #[error("Preload timed out after {0:?} without enough buffered data")]
    TimedOut(Duration),

    /// The preloading handle reported a media failure.
    #[error("Preload failed: {0}")]
    Media(MediaError),

    /// The handle stopped reporting events.
    #[error("Preload handle closed its event stream")]
    EventStreamClosed,
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_error_converts() {
        let err: PlaybackError = PreloadError::TimedOut(Duration::from_secs(5)).into();
        assert!(matches!(err, PlaybackError::Preload(PreloadError::TimedOut(_))));
        assert_eq!(
            err.to_string(),
            "Preload timed out after 5s without enough buffered data"
        );
    }

    #[test]
    fn test_media_preload_error_display() {
        let err = PreloadError::Media(MediaError::network("403 from CDN"));
        assert_eq!(
            err.to_string(),
            "Preload failed: Media error (network): 403 from CDN"
        );
    }
}
