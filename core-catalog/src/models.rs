//! Validated catalog models.
//!
//! Values here have passed schema validation (see [`crate::wire`]); URLs are
//! known to be absolute.

use bridge_traits::StreamLocator;
use serde::{Deserialize, Serialize};

/// A playable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub stream_uri: StreamLocator,
    /// Locator worth preloading once this track is playing.
    pub next_stream_uri: Option<StreamLocator>,
}

impl Track {
    /// Build a track with no next-track hint.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        channel_title: impl Into<String>,
        thumbnail_url: impl Into<String>,
        stream_uri: impl Into<StreamLocator>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            channel_title: channel_title.into(),
            thumbnail_url: thumbnail_url.into(),
            stream_uri: stream_uri.into(),
            next_stream_uri: None,
        }
    }

    pub fn with_next_stream_uri(mut self, locator: impl Into<StreamLocator>) -> Self {
        self.next_stream_uri = Some(locator.into());
        self
    }
}

/// Paging metadata returned with track lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_items: u64,
    pub current_page: u32,
    pub next_page: Option<u32>,
    pub page_size: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.next_page.is_some()
    }
}

/// One page of tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPage {
    pub tracks: Vec<Track>,
    pub pagination: Pagination,
}

/// Parameters for the related-tracks ("up next") listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedTracksQuery {
    pub current_track_id: String,
    pub channel_title: String,
    pub page: u32,
}

impl RelatedTracksQuery {
    /// First page of tracks related to `track`.
    pub fn for_track(track: &Track) -> Self {
        Self {
            current_track_id: track.id.clone(),
            channel_title: track.channel_title.clone(),
            page: 1,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

/// A search hit. Not directly playable: resolve it through
/// [`CatalogSource::fetch_track_by_external_ref`](crate::CatalogSource::fetch_track_by_external_ref).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Upstream video reference.
    pub external_ref: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub published_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_related_query_from_track() {
        let track = Track::new("t-1", "Song", "Channel", "https://img/1.jpg", "https://cdn/1.mp3");
        let query = RelatedTracksQuery::for_track(&track).page(3);

        assert_eq!(query.current_track_id, "t-1");
        assert_eq!(query.channel_title, "Channel");
        assert_eq!(query.page, 3);
    }

    #[test]
    fn test_track_hint_builder() {
        let track = Track::new("t-1", "Song", "Channel", "https://img/1.jpg", "https://cdn/1.mp3")
            .with_next_stream_uri("https://cdn/2.mp3");
        assert_eq!(
            track.next_stream_uri.as_ref().map(|l| l.as_str()),
            Some("https://cdn/2.mp3")
        );
    }
}
