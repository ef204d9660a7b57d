//! Output-handle bridge and supporting media types.
//!
//! An [`AudioOutput`] is the platform's audio-playback primitive (an HTML
//! audio element on the web, a native player object elsewhere). It is bound to
//! at most one [`StreamLocator`] at a time, reports asynchronous
//! [`OutputEvent`]s, and exposes a single awaited operation: `play`, whose
//! acknowledgement may arrive long after the request or be rejected.
//!
//! The playback core owns exactly one live handle. Additional handles created
//! through an [`AudioOutputFactory`] are used for look-ahead preloading and
//! only become live once adopted by the engine.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque URI identifying a playable audio resource.
///
/// The core never resolves or fetches locators itself; they are handed to the
/// platform media primitive as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamLocator(String);

impl StreamLocator {
    /// Wrap a raw URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Borrow the raw URI.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The locator without its query string or fragment.
    ///
    /// Stream URIs frequently carry signed tokens in the query; log this form.
    pub fn redacted(&self) -> &str {
        let end = self.0.find(['?', '#']).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for StreamLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StreamLocator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How much media data a handle has available, mirroring the HTML media
/// `readyState` ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Classification of media failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaErrorKind {
    /// The operation was interrupted by a newer one (load, pause, unload).
    Aborted,
    /// The platform refused to start playback (autoplay policy).
    NotAllowed,
    /// Fetching the stream failed.
    Network,
    /// The stream could not be decoded.
    Decode,
    /// The locator points at something the platform cannot play.
    SourceNotSupported,
    Unknown,
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaErrorKind::Aborted => "aborted",
            MediaErrorKind::NotAllowed => "not allowed",
            MediaErrorKind::Network => "network",
            MediaErrorKind::Decode => "decode",
            MediaErrorKind::SourceNotSupported => "source not supported",
            MediaErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Failure reported by an [`AudioOutput`], either as a rejected `play`
/// request or as an [`OutputEvent::Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Media error ({kind}): {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Aborted, message)
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::NotAllowed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Decode, message)
    }

    /// `true` when the failure only means the request was superseded.
    pub fn is_cancellation(&self) -> bool {
        self.kind == MediaErrorKind::Aborted
    }

    /// `true` when the platform denied playback without a user gesture.
    pub fn is_permission_denied(&self) -> bool {
        self.kind == MediaErrorKind::NotAllowed
    }
}

/// Asynchronous feedback from an output handle.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Playback stalled waiting for data.
    Waiting,
    /// More of the stream has been buffered.
    Progress {
        buffered_seconds: f64,
        duration_seconds: f64,
    },
    /// Stream duration is known.
    LoadedMetadata { duration_seconds: f64 },
    /// Enough data to start playing.
    CanPlay,
    /// Enough data to play to the end without stalling (readiness signal).
    CanPlayThrough,
    /// Audio is actually being rendered.
    Playing,
    TimeUpdate { position_seconds: f64 },
    Ended,
    Error(MediaError),
}

impl OutputEvent {
    /// Buffered share of the stream as a whole percentage in `0..=100`, for
    /// [`OutputEvent::Progress`] events with a known duration.
    pub fn buffered_percent(&self) -> Option<f64> {
        match *self {
            OutputEvent::Progress {
                buffered_seconds,
                duration_seconds,
            } if duration_seconds.is_finite() && duration_seconds > 0.0 => {
                let ratio = (buffered_seconds.max(0.0) / duration_seconds) * 100.0;
                Some(ratio.round().min(100.0))
            }
            _ => None,
        }
    }
}

/// Stream of events emitted by one handle. Each call to
/// [`AudioOutput::events`] yields an independent subscription that only sees
/// events emitted after it was created.
pub type OutputEventStream = BoxStream<'static, OutputEvent>;

/// Platform audio-playback primitive.
///
/// Every method except [`play`](AudioOutput::play) is a synchronous request;
/// its outcome is observed through [`events`](AudioOutput::events).
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Bind the handle to `locator` and start buffering.
    fn load(&self, locator: &StreamLocator);

    /// Stop playback and drop the resource binding, halting any download.
    fn unload(&self);

    /// Locator the handle is currently bound to.
    fn locator(&self) -> Option<StreamLocator>;

    /// Request playback. Resolves once audio starts, or rejects.
    async fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    /// Move the playhead, in seconds.
    fn set_position(&self, seconds: f64);

    fn position(&self) -> f64;

    /// Stream duration in seconds, once metadata is available.
    fn duration(&self) -> Option<f64>;

    fn ready_state(&self) -> ReadyState;

    /// Subscribe to hardware feedback.
    fn events(&self) -> OutputEventStream;
}

/// Allocates fresh output handles.
pub trait AudioOutputFactory: Send + Sync {
    fn create_output(&self) -> Arc<dyn AudioOutput>;
}
