//! # Preload Cache
//!
//! Bounded pool of output handles that start buffering a stream before it is
//! needed, so a track switch can adopt an already-warm handle.
//!
//! - At most `capacity` entries; adding one more evicts the oldest insertion.
//! - Concurrent preloads of the same locator share one readiness future.
//! - Evicted, released and cleared entries have their handle unloaded so the
//!   download stops.
//! - A taken entry leaves the cache with its handle still loaded.
//!
//! Readiness resolves on the handle's `CanPlayThrough`. If that signal does
//! not arrive within the configured timeout, the handle's ready state decides:
//! enough future data counts as ready, anything less is
//! [`PreloadError::TimedOut`].

use bridge_traits::{
    AudioOutput, AudioOutputFactory, OutputEvent, OutputEventStream, ReadyState, StreamLocator,
};
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PreloadError;

/// Readiness of one preloaded locator, shared by every waiter.
pub type Readiness = Shared<BoxFuture<'static, Result<(), PreloadError>>>;

struct PreloadEntry {
    id: u64,
    output: Arc<dyn AudioOutput>,
    readiness: Readiness,
    cancel: CancellationToken,
}

impl PreloadEntry {
    /// Stop watching readiness and halt the download.
    fn discard(self) {
        self.cancel.cancel();
        self.output.unload();
    }
}

struct CacheInner {
    factory: Arc<dyn AudioOutputFactory>,
    readiness_timeout: Duration,
    // Only `peek`/`push`/`pop` are used, so recency order is insertion order.
    entries: Mutex<LruCache<StreamLocator, PreloadEntry>>,
    next_entry_id: AtomicU64,
    event_bus: Option<EventBus>,
}

impl CacheInner {
    fn emit(&self, event: PreloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Preload(event));
        }
    }

    /// Drop the entry for `locator` if it is still entry `id`.
    fn discard_if_current(&self, locator: &StreamLocator, id: u64) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.peek(locator) {
                Some(entry) if entry.id == id => entries.pop(locator),
                _ => None,
            }
        };
        match removed {
            Some(entry) => {
                entry.discard();
                true
            }
            None => false,
        }
    }
}

/// Bounded FIFO cache of preloading output handles.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct PreloadCache {
    inner: Arc<CacheInner>,
}

impl PreloadCache {
    /// Create a cache that allocates handles from `factory`.
    pub fn new(
        factory: Arc<dyn AudioOutputFactory>,
        capacity: NonZeroUsize,
        readiness_timeout: Duration,
    ) -> Self {
        Self::build(factory, capacity, readiness_timeout, None)
    }

    /// Like [`new`](Self::new), reporting entry lifecycle on `event_bus`.
    pub fn with_event_bus(
        factory: Arc<dyn AudioOutputFactory>,
        capacity: NonZeroUsize,
        readiness_timeout: Duration,
        event_bus: EventBus,
    ) -> Self {
        Self::build(factory, capacity, readiness_timeout, Some(event_bus))
    }

    fn build(
        factory: Arc<dyn AudioOutputFactory>,
        capacity: NonZeroUsize,
        readiness_timeout: Duration,
        event_bus: Option<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                factory,
                readiness_timeout,
                entries: Mutex::new(LruCache::new(capacity)),
                next_entry_id: AtomicU64::new(1),
                event_bus,
            }),
        }
    }

    /// Start buffering `locator` on a fresh handle and return its readiness.
    ///
    /// If the locator is already cached, the existing readiness is returned
    /// and no new handle is created. Must be called within a tokio runtime.
    pub fn preload(&self, locator: &StreamLocator) -> Readiness {
        let (readiness, id, evicted) = {
            let mut entries = self.inner.entries.lock();
            if let Some(entry) = entries.peek(locator) {
                debug!(locator = %locator.redacted(), "Preload already in progress");
                return entry.readiness.clone();
            }

            let output = self.inner.factory.create_output();
            // Subscribe before loading so the readiness signal cannot be missed.
            let events = output.events();
            let cancel = CancellationToken::new();
            let readiness = await_readiness(
                output.clone(),
                events,
                cancel.clone(),
                self.inner.readiness_timeout,
            )
            .boxed()
            .shared();
            output.load(locator);

            let id = self.inner.next_entry_id.fetch_add(1, Ordering::Relaxed);
            let evicted = entries.push(
                locator.clone(),
                PreloadEntry {
                    id,
                    output,
                    readiness: readiness.clone(),
                    cancel,
                },
            );
            (readiness, id, evicted)
        };

        info!(locator = %locator.redacted(), "Preloading stream");
        self.inner.emit(PreloadEvent::Started {
            locator: locator.redacted().to_string(),
        });

        if let Some((evicted_locator, entry)) = evicted {
            debug!(locator = %evicted_locator.redacted(), "Evicting oldest preload");
            entry.discard();
            self.inner.emit(PreloadEvent::Evicted {
                locator: evicted_locator.redacted().to_string(),
            });
        }

        tokio::spawn(watch_readiness(
            Arc::downgrade(&self.inner),
            locator.clone(),
            id,
            readiness.clone(),
        ));

        readiness
    }

    /// Remove `locator` from the cache and hand over its handle, still
    /// loaded. `None` if it was never preloaded or has been evicted.
    pub fn take_preloaded(&self, locator: &StreamLocator) -> Option<Arc<dyn AudioOutput>> {
        let entry = self.inner.entries.lock().pop(locator)?;
        // Only the readiness watcher stops; the handle keeps its buffer.
        entry.cancel.cancel();
        debug!(locator = %locator.redacted(), "Adopting preloaded handle");
        Some(entry.output)
    }

    /// Drop `locator` from the cache and unload its handle.
    pub fn release(&self, locator: &StreamLocator) -> bool {
        let entry = self.inner.entries.lock().pop(locator);
        match entry {
            Some(entry) => {
                entry.discard();
                debug!(locator = %locator.redacted(), "Released preload");
                true
            }
            None => false,
        }
    }

    /// Unload every cached handle.
    pub fn clear(&self) {
        let drained: Vec<PreloadEntry> = {
            let mut entries = self.inner.entries.lock();
            let mut drained = Vec::with_capacity(entries.len());
            while let Some((_, entry)) = entries.pop_lru() {
                drained.push(entry);
            }
            drained
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "Clearing preload cache");
        }
        drained.into_iter().for_each(PreloadEntry::discard);
    }

    pub fn contains(&self, locator: &StreamLocator) -> bool {
        self.inner.entries.lock().contains(locator)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached locators, oldest first.
    pub fn preloaded_locators(&self) -> Vec<StreamLocator> {
        self.inner
            .entries
            .lock()
            .iter()
            .rev()
            .map(|(locator, _)| locator.clone())
            .collect()
    }
}

impl std::fmt::Debug for PreloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadCache")
            .field("len", &self.len())
            .field("readiness_timeout", &self.inner.readiness_timeout)
            .finish()
    }
}

async fn await_readiness(
    output: Arc<dyn AudioOutput>,
    mut events: OutputEventStream,
    cancel: CancellationToken,
    timeout: Duration,
) -> Result<(), PreloadError> {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(PreloadError::Released),
            _ = &mut deadline => {
                return if output.ready_state() >= ReadyState::HaveFutureData {
                    Ok(())
                } else {
                    Err(PreloadError::TimedOut(timeout))
                };
            }
            event = events.next() => match event {
                Some(OutputEvent::CanPlayThrough) => return Ok(()),
                Some(OutputEvent::Error(err)) => return Err(PreloadError::Media(err)),
                Some(_) => {}
                None => return Err(PreloadError::EventStreamClosed),
            },
        }
    }
}

/// Drive `readiness` to completion and drop the entry if it failed.
async fn watch_readiness(
    cache: Weak<CacheInner>,
    locator: StreamLocator,
    id: u64,
    readiness: Readiness,
) {
    let outcome = readiness.await;
    let Some(cache) = cache.upgrade() else {
        return;
    };

    match outcome {
        Ok(()) => {
            debug!(locator = %locator.redacted(), "Preload ready");
            cache.emit(PreloadEvent::Ready {
                locator: locator.redacted().to_string(),
            });
        }
        Err(PreloadError::Released) => {}
        Err(err) => {
            warn!(locator = %locator.redacted(), error = %err, "Preload failed");
            // A failed handle is never adopted; the next load starts fresh.
            cache.discard_if_current(&locator, id);
            cache.emit(PreloadEvent::Failed {
                locator: locator.redacted().to_string(),
                message: err.to_string(),
            });
        }
    }
}
