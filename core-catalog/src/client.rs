//! Catalog REST client
//!
//! Implements [`CatalogSource`] against the music API:
//!
//! | Operation | Endpoint |
//! |---|---|
//! | `fetch_track_by_id` | `GET /musics/tracks/{id}` |
//! | `fetch_track_by_external_ref` | `GET /musics/videos/{ref}` |
//! | `fetch_track_page` | `GET /musics?page=&limit=` |
//! | `fetch_related_tracks` | `GET /musics/next?currentId=&channelTitle=&page=&limit=` |
//! | `search_tracks` | `GET /musics/search?q=` |

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::config::{CoreConfig, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT};
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{CatalogError, Result};
use crate::models::{RelatedTracksQuery, SearchResult, Track, TrackPage};
use crate::wire::{
    decode, WireErrorBody, WireMusicEnvelope, WireMusicsPage, WireSearchEnvelope, MUSIC_FIELDS,
};

/// Read access to the track catalog.
///
/// Every call is asynchronous and fallible. Returned values have passed
/// schema validation; a response that does not fit is
/// [`CatalogError::Schema`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_track_by_id(&self, id: &str) -> Result<Track>;

    /// Resolve a search hit's upstream reference to a playable track.
    async fn fetch_track_by_external_ref(&self, external_ref: &str) -> Result<Track>;

    /// 1-based page of the catalog.
    async fn fetch_track_page(&self, page: u32) -> Result<TrackPage>;

    async fn fetch_related_tracks(&self, query: &RelatedTracksQuery) -> Result<TrackPage>;

    async fn search_tracks(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// HTTP implementation of [`CatalogSource`].
///
/// # Example
///
/// ```ignore
/// use core_catalog::{CatalogSource, HttpCatalogClient};
///
/// let client = HttpCatalogClient::from_config(&config);
/// let page = client.fetch_track_page(1).await?;
/// ```
pub struct HttpCatalogClient {
    http_client: Arc<dyn HttpClient>,
    base_url: Url,
    page_size: u32,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
    event_bus: Option<EventBus>,
}

impl HttpCatalogClient {
    /// Create a client for the API rooted at `base_url`.
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: Url) -> Self {
        Self {
            http_client,
            base_url,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            event_bus: None,
        }
    }

    /// Create a client from validated core configuration.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.http_client.clone(), config.catalog_base_url.clone())
            .with_page_size(config.page_size)
            .with_request_timeout(config.request_timeout)
            .with_retry_policy(config.retry_policy.clone())
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Report failed requests on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CatalogError::InvalidRequest(format!(
                    "catalog base URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, url.as_str())
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
    }

    /// Execute `request` and return the body of a 2xx response.
    async fn send(&self, operation: &str, request: HttpRequest) -> Result<HttpResponse> {
        let result = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await
            .map_err(CatalogError::from)
            .and_then(|response| {
                if response.is_success() {
                    return Ok(response);
                }

                let message = decode::<WireErrorBody>(&response.body)
                    .ok()
                    .and_then(|body| body.error)
                    .unwrap_or_else(|| format!("HTTP {}", response.status));

                if response.status == 404 {
                    Err(CatalogError::NotFound(message))
                } else {
                    Err(CatalogError::ApiError {
                        status_code: response.status,
                        message,
                    })
                }
            });

        if let Err(err) = &result {
            warn!(operation, error = %err, "Catalog request failed");
            if let Some(bus) = &self.event_bus {
                let _ = bus.emit(CoreEvent::Catalog(CatalogEvent::RequestFailed {
                    operation: operation.to_string(),
                    message: err.to_string(),
                }));
            }
        }

        result
    }

    async fn fetch_single(&self, operation: &str, url: Url) -> Result<Track> {
        let request = self.get(url).query("fields", MUSIC_FIELDS);
        let response = self.send(operation, request).await?;
        let envelope: WireMusicEnvelope = decode(&response.body)?;
        Track::try_from(envelope.data)
    }

    async fn fetch_page(&self, operation: &str, request: HttpRequest) -> Result<TrackPage> {
        let response = self.send(operation, request).await?;
        let wire: WireMusicsPage = decode(&response.body)?;
        let page = TrackPage::try_from(wire)?;
        debug!(
            operation,
            count = page.tracks.len(),
            current_page = page.pagination.current_page,
            "Fetched track page"
        );
        Ok(page)
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::InvalidRequest(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn require_page(page: u32) -> Result<()> {
    if page == 0 {
        return Err(CatalogError::InvalidRequest(
            "pages are numbered from 1".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    #[instrument(skip(self))]
    async fn fetch_track_by_id(&self, id: &str) -> Result<Track> {
        require_non_empty("track id", id)?;
        let url = self.endpoint(&["musics", "tracks", id])?;
        self.fetch_single("fetch_track_by_id", url).await
    }

    #[instrument(skip(self))]
    async fn fetch_track_by_external_ref(&self, external_ref: &str) -> Result<Track> {
        require_non_empty("external reference", external_ref)?;
        let url = self.endpoint(&["musics", "videos", external_ref])?;
        self.fetch_single("fetch_track_by_external_ref", url).await
    }

    #[instrument(skip(self))]
    async fn fetch_track_page(&self, page: u32) -> Result<TrackPage> {
        require_page(page)?;
        let request = self
            .get(self.endpoint(&["musics"])?)
            .query("page", page)
            .query("limit", self.page_size)
            .query("fields", MUSIC_FIELDS);
        self.fetch_page("fetch_track_page", request).await
    }

    #[instrument(skip(self), fields(current_track_id = %query.current_track_id))]
    async fn fetch_related_tracks(&self, query: &RelatedTracksQuery) -> Result<TrackPage> {
        require_non_empty("current track id", &query.current_track_id)?;
        require_page(query.page)?;
        let request = self
            .get(self.endpoint(&["musics", "next"])?)
            .query("page", query.page)
            .query("limit", self.page_size)
            .query("fields", MUSIC_FIELDS)
            .query("currentId", &query.current_track_id)
            .query("channelTitle", &query.channel_title);
        self.fetch_page("fetch_related_tracks", request).await
    }

    #[instrument(skip(self))]
    async fn search_tracks(&self, query: &str) -> Result<Vec<SearchResult>> {
        require_non_empty("search query", query)?;
        let request = self
            .get(self.endpoint(&["musics", "search"])?)
            .query("q", query);
        let response = self.send("search_tracks", request).await?;
        let envelope: WireSearchEnvelope = decode(&response.body)?;

        envelope
            .data
            .items
            .into_iter()
            .map(SearchResult::try_from)
            .collect()
    }
}
