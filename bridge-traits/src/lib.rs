//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the player
//! core.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform it runs on. The core never touches a media element, a network
//! stack or a logging backend directly; it talks to these traits instead, and
//! the host injects concrete adapters at startup.
//!
//! ## Traits
//!
//! ### Media
//! - [`AudioOutput`](output::AudioOutput) - One platform audio-playback primitive bound to one stream at a time
//! - [`AudioOutputFactory`](output::AudioOutputFactory) - Allocates additional handles for look-ahead preloading
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry support
//!
//! ### Utilities
//! - [`LoggerSink`](log_sink::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Bridge operations report [`BridgeError`](error::BridgeError). Media
//! failures use the richer [`MediaError`](output::MediaError), whose
//! [`MediaErrorKind`](output::MediaErrorKind) lets the engine separate
//! superseded operations and autoplay denials from genuine resource failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared across
//! the engine task and the helper tasks it spawns.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::output::{AudioOutput, MediaError, OutputEventStream, ReadyState, StreamLocator};
//! use async_trait::async_trait;
//!
//! struct HtmlAudio { /* web_sys::HtmlAudioElement */ }
//!
//! #[async_trait]
//! impl AudioOutput for HtmlAudio {
//!     fn load(&self, locator: &StreamLocator) { /* set src, call load() */ }
//!     async fn play(&self) -> Result<(), MediaError> { /* await element.play() */ }
//!     // ...
//! }
//! ```

pub mod error;
pub mod http;
pub mod log_sink;
pub mod output;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log_sink::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use output::{
    AudioOutput, AudioOutputFactory, MediaError, MediaErrorKind, OutputEvent, OutputEventStream,
    ReadyState, StreamLocator,
};
