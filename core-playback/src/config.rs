//! # Playback Configuration
//!
//! Tunables for the engine, the preload cache and the navigation layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Playback controller configuration.
///
/// Every field has a serde default, so hosts can deserialize a partial
/// document and override only what they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Maximum number of preloaded handles kept at once. Oldest is evicted.
    ///
    /// Default: 3.
    #[serde(default = "default_preload_capacity")]
    pub preload_capacity: usize,

    /// How long a preload waits for the readiness signal before falling
    /// back to the handle's buffered state.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_preload_timeout")]
    pub preload_timeout: Duration,

    /// Lower bound (percent) of the stuck-progress window.
    ///
    /// Default: 95.
    #[serde(default = "default_stuck_progress_threshold")]
    pub stuck_progress_threshold: f64,

    /// How long progress may sit in the stuck window before it is forced
    /// to 100.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_stuck_progress_timeout")]
    pub stuck_progress_timeout: Duration,

    /// Reported buffering at or above this percentage is shown as complete.
    ///
    /// Default: 98.
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,

    /// Initial progress when a preloaded handle is adopted.
    ///
    /// Default: 50.
    #[serde(default = "default_preloaded_start_progress")]
    pub preloaded_start_progress: f64,

    /// Initial progress for a fresh load.
    ///
    /// Default: 5.
    #[serde(default = "default_fresh_start_progress")]
    pub fresh_start_progress: f64,

    /// Upper bound on how long a load may show as loading.
    ///
    /// Default: 8 seconds.
    #[serde(default = "default_load_ceiling")]
    pub load_ceiling: Duration,

    /// Delay after playback starts before progress is forced to 100.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_playback_grace")]
    pub playback_grace: Duration,

    /// How long a route transition lasts if nobody reports it settled.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_navigation_settle_delay")]
    pub navigation_settle_delay: Duration,

    /// Route prefixes whose transitions suppress playback side effects.
    /// Empty means every route.
    ///
    /// Default: `["/musics/"]`.
    #[serde(default = "default_navigation_route_prefixes")]
    pub navigation_route_prefixes: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            preload_capacity: default_preload_capacity(),
            preload_timeout: default_preload_timeout(),
            stuck_progress_threshold: default_stuck_progress_threshold(),
            stuck_progress_timeout: default_stuck_progress_timeout(),
            completion_threshold: default_completion_threshold(),
            preloaded_start_progress: default_preloaded_start_progress(),
            fresh_start_progress: default_fresh_start_progress(),
            load_ceiling: default_load_ceiling(),
            playback_grace: default_playback_grace(),
            navigation_settle_delay: default_navigation_settle_delay(),
            navigation_route_prefixes: default_navigation_route_prefixes(),
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PlaybackError::InvalidConfig(msg.to_string()));

        if self.preload_capacity == 0 {
            return invalid("preload_capacity must be > 0");
        }

        let percent = 0.0..=100.0;
        for (name, value) in [
            ("stuck_progress_threshold", self.stuck_progress_threshold),
            ("completion_threshold", self.completion_threshold),
            ("preloaded_start_progress", self.preloaded_start_progress),
            ("fresh_start_progress", self.fresh_start_progress),
        ] {
            if !percent.contains(&value) {
                return Err(PlaybackError::InvalidConfig(format!(
                    "{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }

        if self.stuck_progress_threshold >= 100.0 {
            return invalid("stuck_progress_threshold must be below 100");
        }

        for (name, value) in [
            ("preload_timeout", self.preload_timeout),
            ("stuck_progress_timeout", self.stuck_progress_timeout),
            ("load_ceiling", self.load_ceiling),
            ("playback_grace", self.playback_grace),
            ("navigation_settle_delay", self.navigation_settle_delay),
        ] {
            if value.is_zero() {
                return Err(PlaybackError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if self
            .navigation_route_prefixes
            .iter()
            .any(|prefix| !prefix.starts_with('/'))
        {
            return invalid("navigation_route_prefixes must start with '/'");
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_preload_capacity() -> usize {
    3
}

fn default_preload_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_stuck_progress_threshold() -> f64 {
    95.0
}

fn default_stuck_progress_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_completion_threshold() -> f64 {
    98.0
}

fn default_preloaded_start_progress() -> f64 {
    50.0
}

fn default_fresh_start_progress() -> f64 {
    5.0
}

fn default_load_ceiling() -> Duration {
    Duration::from_secs(8)
}

fn default_playback_grace() -> Duration {
    Duration::from_secs(2)
}

fn default_navigation_settle_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_navigation_route_prefixes() -> Vec<String> {
    vec!["/musics/".to_string()]
}
