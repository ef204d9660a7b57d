//! Test doubles for the service façade.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::{
    AudioOutput, AudioOutputFactory, MediaError, OutputEvent, OutputEventStream, ReadyState,
    StreamLocator,
};
use core_catalog::{
    CatalogSource, Pagination, RelatedTracksQuery, SearchResult, Track, TrackPage,
};
use core_runtime::CoreConfig;
use futures::channel::mpsc;
use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Output that becomes ready as soon as it is loaded and always plays.
#[derive(Default)]
pub struct ReadyOutput {
    locator: Mutex<Option<StreamLocator>>,
    plays: Mutex<usize>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OutputEvent>>>,
}

impl ReadyOutput {
    fn emit(&self, event: OutputEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }

    pub fn play_count(&self) -> usize {
        *self.plays.lock()
    }
}

#[async_trait]
impl AudioOutput for ReadyOutput {
    fn load(&self, locator: &StreamLocator) {
        *self.locator.lock() = Some(locator.clone());
        self.emit(OutputEvent::LoadedMetadata {
            duration_seconds: 240.0,
        });
        self.emit(OutputEvent::CanPlayThrough);
    }

    fn unload(&self) {
        *self.locator.lock() = None;
    }

    fn locator(&self) -> Option<StreamLocator> {
        self.locator.lock().clone()
    }

    async fn play(&self) -> Result<(), MediaError> {
        *self.plays.lock() += 1;
        Ok(())
    }

    fn pause(&self) {}

    fn set_position(&self, _seconds: f64) {}

    fn position(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> Option<f64> {
        self.locator.lock().as_ref().map(|_| 240.0)
    }

    fn ready_state(&self) -> ReadyState {
        if self.locator.lock().is_some() {
            ReadyState::HaveEnoughData
        } else {
            ReadyState::HaveNothing
        }
    }

    fn events(&self) -> OutputEventStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().push(tx);
        Box::pin(rx)
    }
}

/// Hands out [`ReadyOutput`]s and remembers them. The first one is the
/// initial live handle; a switch may adopt a later one.
#[derive(Default)]
pub struct ReadyFactory {
    created: Mutex<Vec<Arc<ReadyOutput>>>,
}

impl ReadyFactory {
    /// `play()` calls across every handle.
    pub fn total_plays(&self) -> usize {
        self.created.lock().iter().map(|output| output.play_count()).sum()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl AudioOutputFactory for ReadyFactory {
    fn create_output(&self) -> Arc<dyn AudioOutput> {
        let output = Arc::new(ReadyOutput::default());
        self.created.lock().push(output.clone());
        output
    }
}

/// The catalog under test is always a mock; no request may reach HTTP.
pub struct UnreachableHttp;

#[async_trait]
impl HttpClient for UnreachableHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable(format!(
            "unexpected request to {}",
            request.url
        )))
    }
}

mock! {
    pub Catalog {}

    #[async_trait]
    impl CatalogSource for Catalog {
        async fn fetch_track_by_id(&self, id: &str) -> core_catalog::Result<Track>;
        async fn fetch_track_by_external_ref(&self, external_ref: &str) -> core_catalog::Result<Track>;
        async fn fetch_track_page(&self, page: u32) -> core_catalog::Result<TrackPage>;
        async fn fetch_related_tracks(&self, query: &RelatedTracksQuery) -> core_catalog::Result<TrackPage>;
        async fn search_tracks(&self, query: &str) -> core_catalog::Result<Vec<SearchResult>>;
    }
}

pub fn track(id: &str) -> Track {
    Track::new(
        id,
        format!("Title {}", id),
        "Channel",
        format!("https://img.example.com/{}.jpg", id),
        format!("https://cdn.example.com/{}.webm", id),
    )
}

pub fn page(tracks: Vec<Track>) -> TrackPage {
    let total = tracks.len() as u64;
    TrackPage {
        tracks,
        pagination: Pagination {
            total_items: total,
            current_page: 1,
            next_page: None,
            page_size: 20,
            total_pages: 1,
        },
    }
}

pub fn config(factory: Arc<ReadyFactory>) -> CoreConfig {
    CoreConfig::builder()
        .catalog_base_url("https://api.example.com")
        .http_client(Arc::new(UnreachableHttp))
        .output_factory(factory)
        .build()
        .expect("valid config")
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}
