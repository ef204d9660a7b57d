//! # Playback State Controller
//!
//! Drives a single platform audio output for a streaming music client and
//! publishes one coherent [`PlaybackSession`] for the UI.
//!
//! ## Overview
//!
//! - [`PlaybackController`] - command surface (load, play/pause, seek,
//!   switch, up next) backed by one engine task
//! - [`PreloadCache`] - bounded pool of handles buffering upcoming streams
//! - [`NavigationTracker`] - suppresses side effects while the host is
//!   changing routes
//! - [`StatePublisher`] - fans session snapshots out to subscribers
//!
//! The platform media primitive is injected through
//! [`bridge_traits::AudioOutput`]; this crate never talks to a media element
//! directly.
//!
//! ## Debugging
//!
//! Debug builds, and release builds with the `diagnostics` feature, expose
//! [`PlaybackController::diagnostics`] with the engine's internal flags.

pub mod config;
pub mod controller;
mod engine;
pub mod error;
pub mod navigation;
pub mod preload;
pub mod publisher;
pub mod session;

pub use config::PlaybackConfig;
pub use controller::{PlaybackController, PlaybackControllerBuilder};
#[cfg(any(debug_assertions, feature = "diagnostics"))]
pub use engine::EngineDiagnostics;
pub use engine::PlayIntent;
pub use error::{PlaybackError, PreloadError, Result};
pub use navigation::{NavigationState, NavigationTracker};
pub use preload::{PreloadCache, Readiness};
pub use publisher::{StatePublisher, SubscriptionId};
pub use session::{OperationToken, PlaybackSession, PlaybackStatus, SessionError};
