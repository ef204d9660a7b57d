//! Session fan-out.
//!
//! The engine publishes a new [`PlaybackSession`] whenever it changes.
//! Consumers either register a callback or hold a `watch` receiver.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::session::PlaybackSession;

/// Handle returned by [`StatePublisher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type SessionCallback = Arc<dyn Fn(&PlaybackSession) + Send + Sync>;

struct PublisherInner {
    subscribers: Mutex<Vec<(SubscriptionId, SessionCallback)>>,
    latest: watch::Sender<PlaybackSession>,
}

/// Distributes session snapshots to subscribers.
///
/// Callbacks run on the publishing task, in subscription order, after the
/// subscriber list lock is released. A callback may subscribe, unsubscribe
/// or issue player commands without deadlocking.
#[derive(Clone)]
pub struct StatePublisher {
    inner: Arc<PublisherInner>,
}

impl StatePublisher {
    pub fn new(initial: PlaybackSession) -> Self {
        let (latest, _) = watch::channel(initial);
        Self {
            inner: Arc::new(PublisherInner {
                subscribers: Mutex::new(Vec::new()),
                latest,
            }),
        }
    }

    /// Register `callback` for every future snapshot.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PlaybackSession) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<PlaybackSession> {
        self.inner.latest.subscribe()
    }

    /// Latest published snapshot.
    pub fn current(&self) -> PlaybackSession {
        self.inner.latest.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub(crate) fn publish(&self, session: &PlaybackSession) {
        self.inner.latest.send_replace(session.clone());

        let callbacks: Vec<SessionCallback> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(session);
        }
    }
}

impl fmt::Debug for StatePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePublisher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
