//! # Event Bus System
//!
//! Provides an event-driven side channel for the player core using
//! `tokio::sync::broadcast`. The state publisher is the authoritative way to
//! observe playback state; the bus carries discrete, one-shot occurrences
//! (a resource error for a toast, an auto-advance, a preload failure) that
//! hosts may want to log or surface.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   emit    ┌───────────┐
//! │ Playback Engine ├──────────>│           │
//! └─────────────────┘           │           │   subscribe   ┌────────────┐
//! ┌─────────────────┐   emit    │ EventBus  ├──────────────>│ Subscriber │
//! │  Preload Cache  ├──────────>│ (broadcast│               └────────────┘
//! └─────────────────┘           │  channel) │
//! ┌─────────────────┐   emit    │           │   subscribe   ┌────────────┐
//! │  Catalog client ├──────────>│           ├──────────────>│ Subscriber │
//! └─────────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Ended {
//!         track_id: "t-1".to_string(),
//!     }))
//!     .ok();
//!
//! let received = stream.recv().await.unwrap();
//! assert_eq!(received.description(), "Track ended");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error; producers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Preload(PreloadEvent),
    Navigation(NavigationEvent),
    Catalog(CatalogEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Preload(e) => e.description(),
            CoreEvent::Navigation(e) => e.description(),
            CoreEvent::Catalog(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Catalog(CatalogEvent::RequestFailed { .. }) => EventSeverity::Error,
            CoreEvent::Preload(PreloadEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackLoaded { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::AutoAdvanced { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new track was bound to the output.
    TrackLoaded {
        track_id: String,
        title: String,
        /// Whether a preloaded handle was adopted.
        preloaded: bool,
    },
    /// The output reported audio is being rendered.
    Started { track_id: String },
    /// Playback paused.
    Paused {
        track_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
        user_initiated: bool,
    },
    /// Track finished playing naturally.
    Ended { track_id: String },
    /// The engine switched to the up-next track after an end.
    AutoAdvanced { from_track_id: String, to_track_id: String },
    /// Playback error surfaced to the user.
    Error {
        track_id: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Whether retrying the same track can succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackLoaded { .. } => "Track loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Ended { .. } => "Track ended",
            PlaybackEvent::AutoAdvanced { .. } => "Advanced to next track",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Preload Events
// ============================================================================

/// Events emitted by the preload cache. Locators are redacted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PreloadEvent {
    Started { locator: String },
    Ready { locator: String },
    Failed { locator: String, message: String },
    /// Dropped to make room for a newer entry.
    Evicted { locator: String },
}

impl PreloadEvent {
    fn description(&self) -> &str {
        match self {
            PreloadEvent::Started { .. } => "Preload started",
            PreloadEvent::Ready { .. } => "Preload ready",
            PreloadEvent::Failed { .. } => "Preload failed",
            PreloadEvent::Evicted { .. } => "Preload evicted",
        }
    }
}

// ============================================================================
// Navigation Events
// ============================================================================

/// Route transitions observed by the navigation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NavigationEvent {
    TransitionStarted { path: String, epoch: u64 },
    TransitionSettled { epoch: u64 },
}

impl NavigationEvent {
    fn description(&self) -> &str {
        match self {
            NavigationEvent::TransitionStarted { .. } => "Navigation started",
            NavigationEvent::TransitionSettled { .. } => "Navigation settled",
        }
    }
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Catalog data-layer outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// A catalog request failed after retries.
    RequestFailed { operation: String, message: String },
    /// Related tracks were resolved for up-next.
    UpNextResolved {
        track_id: String,
        up_next_id: Option<String>,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::RequestFailed { .. } => "Catalog request failed",
            CatalogEvent::UpNextResolved { .. } => "Up next resolved",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let errors_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= core_runtime::events::EventSeverity::Error);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
