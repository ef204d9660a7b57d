//! Route-transition awareness.
//!
//! While the host is swapping pages, the UI may briefly unmount and remount
//! the player and re-issue commands it already issued. The engine consults a
//! [`NavigationTracker`] to tell those echoes from real requests:
//!
//! - seeks are dropped
//! - hardware errors and rejected plays do not surface
//! - reloading the current track is a no-op
//! - auto-resume waits until the transition settles
//!
//! A transition settles when the host says so or when the settle timer for
//! its epoch fires, whichever comes first. A newer transition bumps the epoch
//! so the older timer is ignored.

use serde::{Deserialize, Serialize};

/// Whether a route transition is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NavigationState {
    #[default]
    Stable,
    Transitioning { epoch: u64 },
}

/// Stable/transitioning state machine with epoch-tagged settling.
#[derive(Debug, Clone)]
pub struct NavigationTracker {
    state: NavigationState,
    epoch: u64,
    route_prefixes: Vec<String>,
}

impl NavigationTracker {
    /// Track transitions into routes starting with one of `route_prefixes`.
    /// An empty list matches every route.
    pub fn new(route_prefixes: Vec<String>) -> Self {
        Self {
            state: NavigationState::Stable,
            epoch: 0,
            route_prefixes,
        }
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    /// Epoch of the most recent transition.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, NavigationState::Transitioning { .. })
    }

    /// `true` if a transition to `path` should suppress side effects.
    pub fn applies_to(&self, path: &str) -> bool {
        self.route_prefixes.is_empty()
            || self
                .route_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Enter the transitioning state for `path`.
    ///
    /// Returns the new epoch, or `None` when the route is not tracked.
    pub fn begin(&mut self, path: &str) -> Option<u64> {
        if !self.applies_to(path) {
            return None;
        }
        self.epoch += 1;
        self.state = NavigationState::Transitioning { epoch: self.epoch };
        Some(self.epoch)
    }

    /// The host reported the transition finished. Returns `true` if this
    /// left the transitioning state.
    pub fn settle(&mut self) -> bool {
        let was_transitioning = self.is_transitioning();
        self.state = NavigationState::Stable;
        was_transitioning
    }

    /// The settle timer for `epoch` fired. Stale epochs are ignored.
    pub fn settle_epoch(&mut self, epoch: u64) -> bool {
        match self.state {
            NavigationState::Transitioning { epoch: current } if current == epoch => self.settle(),
            _ => false,
        }
    }
}

impl Default for NavigationTracker {
    fn default() -> Self {
        Self::new(vec!["/musics/".to_string()])
    }
}
