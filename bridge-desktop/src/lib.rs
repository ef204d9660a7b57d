//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for native hosts (macOS, Windows,
//! Linux) and for running the core in integration tests.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with retry and exponential backoff
//!
//! Audio output is always supplied by the host; there is no desktop default.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = Arc::new(ReqwestHttpClient::new());
//!     // Hand to CoreConfig::builder().http_client(http_client)
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
