//! Core service façade.
//!
//! [`CoreService`] is the one object a host creates at startup. It takes the
//! validated [`CoreConfig`] (bridges and catalog settings) plus the
//! [`PlaybackConfig`], constructs the shared live output once, and wires the
//! catalog client and the playback engine to a common [`EventBus`].
//!
//! Logging is left to the host: call
//! [`core_runtime::logging::init_logging`] before `init` to get the core's
//! spans and events.
//!
//! ```ignore
//! use core_service::{CoreService, PlaybackConfig};
//! use core_runtime::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .catalog_base_url("https://api.example.com")
//!     .output_factory(factory)
//!     .build()?;
//! let core = CoreService::init(config, PlaybackConfig::default())?;
//!
//! core.play_track_by_id("t-42").await?;
//! core.refresh_up_next().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use bridge_traits::{AudioOutput, AudioOutputFactory, HttpClient};
pub use core_catalog::{CatalogSource, SearchResult, Track, TrackPage};
pub use core_playback::{PlaybackConfig, PlaybackController, PlaybackSession, PlaybackStatus};
pub use core_runtime::CoreConfig;

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::ReqwestHttpClient;

use core_catalog::{HttpCatalogClient, RelatedTracksQuery};
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus, EventStream};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    controller: PlaybackController,
    catalog: Arc<dyn CatalogSource>,
    events: EventBus,
}

impl CoreService {
    /// Validate `config`, create the live output and start the engine.
    ///
    /// Must be called within a tokio runtime.
    pub fn init(config: CoreConfig, playback_config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer_size);
        let catalog = HttpCatalogClient::from_config(&config).with_event_bus(events.clone());
        Self::assemble(config, playback_config, Arc::new(catalog), events)
    }

    /// Like [`init`](Self::init), with a caller-supplied catalog.
    pub fn with_catalog(
        config: CoreConfig,
        playback_config: PlaybackConfig,
        catalog: Arc<dyn CatalogSource>,
    ) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer_size);
        Self::assemble(config, playback_config, catalog, events)
    }

    fn assemble(
        config: CoreConfig,
        playback_config: PlaybackConfig,
        catalog: Arc<dyn CatalogSource>,
        events: EventBus,
    ) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CoreError::InitializationFailed(
                "CoreService must be initialized inside a tokio runtime".to_string(),
            ));
        }

        let output = config.output_factory.create_output();
        let controller = PlaybackController::builder(output, config.output_factory.clone())
            .config(playback_config)
            .event_bus(events.clone())
            .spawn()?;

        info!(catalog = %config.catalog_base_url, "Core service initialized");
        Ok(Self {
            controller,
            catalog,
            events,
        })
    }

    // ========================================================================
    // Playback flows
    // ========================================================================

    /// Fetch `id` from the catalog and switch to it.
    ///
    /// Resolves once the switch has settled. Catalog failures leave playback
    /// untouched.
    #[instrument(skip(self))]
    pub async fn play_track_by_id(&self, id: &str) -> Result<Track> {
        let track = self.catalog.fetch_track_by_id(id).await?;
        self.controller.switch_track(track.clone()).await?;
        Ok(track)
    }

    /// Resolve a search hit and start it.
    ///
    /// Opening a search result navigates to the track's page, so the engine
    /// is told a route change is underway before the load.
    #[instrument(skip(self, result), fields(external_ref = %result.external_ref))]
    pub async fn play_search_result(&self, result: &SearchResult) -> Result<Track> {
        let track = self
            .catalog
            .fetch_track_by_external_ref(&result.external_ref)
            .await?;

        self.controller
            .route_change_started(format!("/musics/{}", track.id))?;
        self.controller.load_and_play(track.clone())?;
        Ok(track)
    }

    /// Look up tracks related to the current one and queue the first that
    /// is not the current track.
    ///
    /// Returns the queued track; `None` clears up-next.
    #[instrument(skip(self))]
    pub async fn refresh_up_next(&self) -> Result<Option<Track>> {
        let current = self
            .controller
            .snapshot()
            .await?
            .current_track
            .ok_or(CoreError::NoCurrentTrack)?;

        let page = self
            .catalog
            .fetch_related_tracks(&RelatedTracksQuery::for_track(&current))
            .await?;
        let up_next = page
            .tracks
            .into_iter()
            .find(|candidate| candidate.id != current.id);

        match &up_next {
            Some(track) => debug!(track_id = %track.id, "Queued up next"),
            None => debug!(track_id = %current.id, "No related track to queue"),
        }

        self.controller.set_up_next(up_next.clone())?;
        if let Err(err) = self.events.emit(CoreEvent::Catalog(CatalogEvent::UpNextResolved {
            track_id: current.id,
            up_next_id: up_next.as_ref().map(|track| track.id.clone()),
        })) {
            debug!("No event subscribers: {}", err);
        }
        Ok(up_next)
    }

    // ========================================================================
    // Catalog passthrough
    // ========================================================================

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        Ok(self.catalog.search_tracks(query).await?)
    }

    /// 1-based page of the catalog.
    pub async fn track_page(&self, page: u32) -> Result<TrackPage> {
        Ok(self.catalog.fetch_track_page(page).await?)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn catalog(&self) -> Arc<dyn CatalogSource> {
        Arc::clone(&self.catalog)
    }

    /// Stream of everything the core reports: playback, preload, navigation
    /// and catalog events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Stop the engine and release every output handle.
    pub async fn shutdown(&self) -> Result<()> {
        if let Err(err) = self.controller.shutdown().await {
            warn!("Playback engine already stopped: {}", err);
        }
        info!("Core service shut down");
        Ok(())
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("controller", &self.controller)
            .field("event_subscribers", &self.events.subscriber_count())
            .finish()
    }
}
