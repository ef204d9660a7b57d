//! Observable playback state.
//!
//! [`PlaybackSession`] is the single snapshot UI consumers read. The engine
//! owns the only mutable copy; everyone else gets clones through the
//! [`StatePublisher`](crate::StatePublisher).

use bridge_traits::MediaError;
use core_catalog::Track;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the load or switch the engine is currently serving.
///
/// Incremented whenever the current track changes. Hardware feedback and
/// timers are tagged with the token they were started under and dropped
/// when it no longer matches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OperationToken(u64);

impl OperationToken {
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback status as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Nothing loaded yet.
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Errored,
}

impl PlaybackStatus {
    /// Statuses that only a new load or an explicit play leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackStatus::Ended | PlaybackStatus::Errored)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Last media failure surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub kind: String,
    pub message: String,
}

impl From<&MediaError> for SessionError {
    fn from(err: &MediaError) -> Self {
        Self {
            kind: err.kind.to_string(),
            message: err.message.clone(),
        }
    }
}

/// Snapshot of everything the UI renders about playback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub current_track: Option<Track>,
    pub status: PlaybackStatus,
    /// Playhead, in seconds.
    pub position_seconds: f64,
    /// Stream length in seconds; 0 until metadata arrives.
    pub duration_seconds: f64,
    /// Buffering progress, 0..=100. Only moves down on a new load or an error.
    pub buffer_progress_percent: f64,
    /// Set when the user paused; blocks auto-resume.
    pub is_user_initiated_pause: bool,
    pub navigation_in_flight: bool,
    pub up_next: Option<Track>,
    pub last_error: Option<SessionError>,
    pub active_operation_token: OperationToken,
}

impl PlaybackSession {
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.status == PlaybackStatus::Loading
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track.as_ref().map(|track| track.id.as_str())
    }

    /// Playhead as a fraction of the duration, 0 when the duration is unknown.
    pub fn position_fraction(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            (self.position_seconds / self.duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Fold a reported buffering percentage into the current progress.
///
/// Progress never moves backwards, and anything at or above
/// `completion_threshold` is shown as complete.
pub(crate) fn advance_progress(current: f64, reported: f64, completion_threshold: f64) -> f64 {
    let next = current.max(reported.clamp(0.0, 100.0));
    if next >= completion_threshold {
        100.0
    } else {
        next
    }
}
