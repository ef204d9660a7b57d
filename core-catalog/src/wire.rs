//! Catalog API response types
//!
//! Data structures for deserializing the catalog REST API, plus the schema
//! checks that turn them into [`crate::models`] values. Anything the API
//! returns that does not fit is reported as [`CatalogError::Schema`].

use serde::Deserialize;
use url::Url;

use crate::error::{CatalogError, Result};
use crate::models::{Pagination, SearchResult, Track, TrackPage};

/// Fields requested for track resources.
pub const MUSIC_FIELDS: &str =
    "id, snippet.title, snippet.thumbnails.standard, snippet.channelTitle, streamUri, nextTrackUri, contentDetails";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireThumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WireMusicThumbnails {
    pub standard: WireThumbnail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMusicSnippet {
    pub title: String,
    pub thumbnails: WireMusicThumbnails,
    pub channel_title: String,
}

/// Track resource
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMusic {
    pub id: String,
    pub snippet: WireMusicSnippet,
    pub stream_uri: String,
    #[serde(default)]
    pub next_track_uri: Option<String>,
}

/// `GET /musics/tracks/{id}` and `GET /musics/videos/{ref}` body
#[derive(Debug, Deserialize)]
pub struct WireMusicEnvelope {
    pub data: WireMusic,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePagination {
    pub total_items: u64,
    pub current_page: u32,
    pub next_page: Option<u32>,
    pub page_size: u32,
    pub total_pages: u32,
}

/// `GET /musics` and `GET /musics/next` body
#[derive(Debug, Deserialize)]
pub struct WireMusicsPage {
    pub data: Vec<WireMusic>,
    pub pagination: WirePagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVideoId {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WireVideoThumbnails {
    pub high: WireThumbnail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVideoSnippet {
    pub published_at: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: WireVideoThumbnails,
    pub channel_title: String,
}

#[derive(Debug, Deserialize)]
pub struct WireVideoItem {
    pub id: WireVideoId,
    pub snippet: WireVideoSnippet,
}

#[derive(Debug, Deserialize)]
pub struct WireSearchResponse {
    pub items: Vec<WireVideoItem>,
}

/// `GET /musics/search` body
#[derive(Debug, Deserialize)]
pub struct WireSearchEnvelope {
    pub data: WireSearchResponse,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Default, Deserialize)]
pub struct WireErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

fn absolute_url(field: &str, value: &str) -> Result<String> {
    Url::parse(value)
        .map(|_| value.to_string())
        .map_err(|e| CatalogError::Schema(format!("{} is not a valid URL ({}): {}", field, e, value)))
}

impl TryFrom<WireMusic> for Track {
    type Error = CatalogError;

    fn try_from(wire: WireMusic) -> Result<Self> {
        if wire.id.trim().is_empty() {
            return Err(CatalogError::Schema("track id is empty".to_string()));
        }

        let thumbnail_url = absolute_url("snippet.thumbnails.standard.url", &wire.snippet.thumbnails.standard.url)?;
        let stream_uri = absolute_url("streamUri", &wire.stream_uri)?;
        let next_stream_uri = wire
            .next_track_uri
            .as_deref()
            .map(|uri| absolute_url("nextTrackUri", uri))
            .transpose()?;

        Ok(Track {
            id: wire.id,
            title: wire.snippet.title,
            channel_title: wire.snippet.channel_title,
            thumbnail_url,
            stream_uri: stream_uri.into(),
            next_stream_uri: next_stream_uri.map(Into::into),
        })
    }
}

impl From<WirePagination> for Pagination {
    fn from(wire: WirePagination) -> Self {
        Pagination {
            total_items: wire.total_items,
            current_page: wire.current_page,
            next_page: wire.next_page,
            page_size: wire.page_size,
            total_pages: wire.total_pages,
        }
    }
}

impl TryFrom<WireMusicsPage> for TrackPage {
    type Error = CatalogError;

    fn try_from(wire: WireMusicsPage) -> Result<Self> {
        let tracks = wire
            .data
            .into_iter()
            .map(Track::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(TrackPage {
            tracks,
            pagination: wire.pagination.into(),
        })
    }
}

impl TryFrom<WireVideoItem> for SearchResult {
    type Error = CatalogError;

    fn try_from(wire: WireVideoItem) -> Result<Self> {
        let thumbnail_url = absolute_url("snippet.thumbnails.high.url", &wire.snippet.thumbnails.high.url)?;

        Ok(SearchResult {
            external_ref: wire.id.video_id,
            title: wire.snippet.title,
            description: wire.snippet.description,
            channel_id: wire.snippet.channel_id,
            channel_title: wire.snippet.channel_title,
            thumbnail_url,
            published_at: wire.snippet.published_at,
        })
    }
}

/// Decode a JSON body into `T`, reporting failures as schema errors.
pub fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| CatalogError::Schema(e.to_string()))
}
