//! Tracker configuration.

use serde::{Deserialize, Serialize};
use crate::estimator::HISTORICAL_HIGH_SAMPLES;

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Completed-step durations kept for the historical estimate, oldest
    /// dropped first (0 keeps all). Never fewer than the historical method
    /// needs for a `High` estimate.
    pub history_window: usize,
    /// Whether `reset()` notifies observers of the cleared state
    pub notify_on_reset: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_window: 20,
            notify_on_reset: true,
        }
    }
}

impl TrackerConfig {
    /// Number of step durations actually retained, `None` when unbounded.
    pub fn retained_durations(&self) -> Option<usize> {
        match self.history_window {
            0 => None,
            window => Some(window.max(HISTORICAL_HIGH_SAMPLES)),
        }
    }
}
