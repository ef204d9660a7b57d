//! Command surface of the playback engine.

use bridge_traits::{AudioOutput, AudioOutputFactory, StreamLocator};
use core_catalog::Track;
use core_runtime::events::EventBus;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::config::PlaybackConfig;
#[cfg(any(debug_assertions, feature = "diagnostics"))]
use crate::engine::EngineDiagnostics;
use crate::engine::{run_switch, Engine, EngineMsg};
use crate::error::{PlaybackError, Result};
use crate::preload::PreloadCache;
use crate::publisher::{StatePublisher, SubscriptionId};
use crate::session::PlaybackSession;

/// Handle to a running playback engine.
///
/// Cheap to clone. Commands are queued and applied in the order they were
/// issued; the sync methods return as soon as the command is queued. Once the
/// engine has shut down every command fails with
/// [`PlaybackError::EngineStopped`].
///
/// # Example
///
/// ```ignore
/// let controller = PlaybackController::builder(output, factory)
///     .config(PlaybackConfig::default())
///     .event_bus(bus)
///     .spawn()?;
///
/// controller.load_and_play(track)?;
/// controller.subscribe(|session| render(session));
/// ```
#[derive(Clone)]
pub struct PlaybackController {
    mailbox: mpsc::UnboundedSender<EngineMsg>,
    cache: PreloadCache,
    publisher: StatePublisher,
}

impl PlaybackController {
    pub fn builder(
        output: Arc<dyn AudioOutput>,
        factory: Arc<dyn AudioOutputFactory>,
    ) -> PlaybackControllerBuilder {
        PlaybackControllerBuilder {
            output,
            factory,
            config: PlaybackConfig::default(),
            event_bus: None,
        }
    }

    /// Spawn an engine with default settings and no event bus.
    pub fn spawn(
        output: Arc<dyn AudioOutput>,
        factory: Arc<dyn AudioOutputFactory>,
    ) -> Result<Self> {
        Self::builder(output, factory).spawn()
    }

    fn send(&self, msg: EngineMsg) -> Result<()> {
        self.mailbox
            .send(msg)
            .map_err(|_| PlaybackError::EngineStopped)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Bind `track` to the live output without starting it. Reloading the
    /// track that is already bound only refreshes its metadata.
    pub fn load_track(&self, track: Track) -> Result<()> {
        self.send(EngineMsg::LoadTrack {
            track,
            autoplay: false,
        })
    }

    /// Like [`load_track`](Self::load_track), then request playback.
    pub fn load_and_play(&self, track: Track) -> Result<()> {
        self.send(EngineMsg::LoadTrack {
            track,
            autoplay: true,
        })
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(EngineMsg::TogglePlayPause)
    }

    /// Move the playhead to `seconds`, clamped to the stream.
    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(EngineMsg::Seek(seconds))
    }

    /// Move the playhead to `percent` (0..=100) of the duration. No-op while
    /// the duration is unknown.
    pub fn seek_by_percentage(&self, percent: f64) -> Result<()> {
        self.send(EngineMsg::SeekPercent(percent))
    }

    /// Switch to `track` through the preload cache and start playing it.
    ///
    /// Resolves once playback of `track` has started or failed. If a newer
    /// load supersedes the switch it resolves early, still with `Ok`.
    pub async fn switch_track(&self, track: Track) -> Result<()> {
        run_switch(&self.mailbox, &self.cache, track).await
    }

    /// Track to advance to when the current one ends. Starts preloading it.
    pub fn set_up_next(&self, track: Option<Track>) -> Result<()> {
        self.send(EngineMsg::SetUpNext(track))
    }

    /// Warm `locator` in the preload cache and wait until it can play.
    pub async fn preload(&self, locator: &StreamLocator) -> Result<()> {
        self.cache.preload(locator).await?;
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// The host started routing to `path`.
    pub fn route_change_started(&self, path: impl Into<String>) -> Result<()> {
        self.send(EngineMsg::RouteChangeStarted(path.into()))
    }

    /// The host finished routing.
    pub fn route_change_settled(&self) -> Result<()> {
        self.send(EngineMsg::RouteChangeSettled)
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Latest published session. May lag commands that are still queued.
    pub fn session(&self) -> PlaybackSession {
        self.publisher.current()
    }

    /// Session after every command queued before this call was applied.
    pub async fn snapshot(&self) -> Result<PlaybackSession> {
        let (reply, session) = oneshot::channel();
        self.send(EngineMsg::Snapshot(reply))?;
        session.await.map_err(|_| PlaybackError::EngineStopped)
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PlaybackSession) + Send + Sync + 'static,
    {
        self.publisher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    pub fn watch(&self) -> watch::Receiver<PlaybackSession> {
        self.publisher.watch()
    }

    pub fn preload_cache(&self) -> &PreloadCache {
        &self.cache
    }

    #[cfg(any(debug_assertions, feature = "diagnostics"))]
    pub async fn diagnostics(&self) -> Result<EngineDiagnostics> {
        let (reply, diagnostics) = oneshot::channel();
        self.send(EngineMsg::Diagnostics(reply))?;
        diagnostics.await.map_err(|_| PlaybackError::EngineStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed()
    }

    /// Stop the engine, unload the live output and clear the preload cache.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, stopped) = oneshot::channel();
        self.send(EngineMsg::Shutdown(reply))?;
        stopped.await.map_err(|_| PlaybackError::EngineStopped)
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("running", &self.is_running())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Configures and spawns a [`PlaybackController`].
pub struct PlaybackControllerBuilder {
    output: Arc<dyn AudioOutput>,
    factory: Arc<dyn AudioOutputFactory>,
    config: PlaybackConfig,
    event_bus: Option<EventBus>,
}

impl PlaybackControllerBuilder {
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Report playback, preload and navigation events on `bus`.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Validate the configuration and start the engine task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(self) -> Result<PlaybackController> {
        self.config.validate()?;
        let capacity = NonZeroUsize::new(self.config.preload_capacity).ok_or_else(|| {
            PlaybackError::InvalidConfig("preload_capacity must be > 0".to_string())
        })?;

        let cache = match &self.event_bus {
            Some(bus) => PreloadCache::with_event_bus(
                self.factory,
                capacity,
                self.config.preload_timeout,
                bus.clone(),
            ),
            None => PreloadCache::new(self.factory, capacity, self.config.preload_timeout),
        };
        let publisher = StatePublisher::new(PlaybackSession::default());
        let (mailbox, inbox) = mpsc::unbounded_channel();

        let engine = Engine::new(
            self.config,
            self.output,
            cache.clone(),
            publisher.clone(),
            self.event_bus,
            mailbox.downgrade(),
        );
        tokio::spawn(engine.run(inbox));
        info!("Playback controller started");

        Ok(PlaybackController {
            mailbox,
            cache,
            publisher,
        })
    }
}
