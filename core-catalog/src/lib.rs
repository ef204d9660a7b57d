//! # Catalog Data Layer
//!
//! Track metadata and stream locators from the music API.
//!
//! ## Overview
//!
//! - [`CatalogSource`] - the async, fallible read interface the rest of the
//!   core consumes
//! - [`HttpCatalogClient`] - its implementation over the `HttpClient` bridge
//! - [`models`] - validated values ([`Track`], [`TrackPage`], [`SearchResult`])
//! - [`wire`] - serde shapes of the REST responses and the schema checks
//!
//! Responses are validated before they leave this crate. A malformed payload
//! is a [`CatalogError::Schema`] and is surfaced to the caller; nothing in the
//! playback core retries it.

pub mod client;
pub mod error;
pub mod models;
pub mod wire;

pub use client::{CatalogSource, HttpCatalogClient};
pub use error::{CatalogError, Result};
pub use models::{Pagination, RelatedTracksQuery, SearchResult, Track, TrackPage};
