//! Step model - weighted stages of a processing pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::id::StepId;

/// Declared definition of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step identifier
    pub id: StepId,

    /// Human-readable name
    pub name: String,

    /// Fraction of the total work (weights of a pipeline sum to 1.0)
    pub weight: f64,

    /// Expected wall time of the step, written as `estimated_secs`
    #[serde(default, rename = "estimated_secs", with = "secs_f64")]
    pub estimated_duration: Duration,
}

impl StepDefinition {
    /// Create a new step definition.
    pub fn new(
        id: impl Into<StepId>,
        name: impl Into<String>,
        weight: f64,
        estimated_duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            weight,
            estimated_duration,
        }
    }
}

/// Durations as fractional seconds.
mod secs_f64 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Lifecycle of a step instance. Transitions only go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    InProgress,
    Completed,
}

/// One execution of a step within a session.
///
/// Times are offsets on the tracker's monotonic clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInstance {
    /// Step identifier
    pub id: StepId,

    /// Display name
    pub name: String,

    /// When the step started
    pub start_time: Duration,

    /// When the step was completed
    pub end_time: Option<Duration>,

    /// Time spent in the step, set on completion
    pub duration: Option<Duration>,

    /// Number of items the step is expected to process
    pub item_count: u64,

    /// Items processed so far (never above `item_count`)
    pub processed_items: u64,

    /// Label of the item most recently reported
    pub current_item: Option<String>,

    /// Latest status message
    pub message: Option<String>,

    /// Current status
    pub status: StepStatus,
}

impl StepInstance {
    /// Begin a new step at `start_time`.
    pub fn begin(id: StepId, name: String, item_count: u64, start_time: Duration) -> Self {
        Self {
            id,
            name,
            start_time,
            end_time: None,
            duration: None,
            item_count,
            processed_items: 0,
            current_item: None,
            message: None,
            status: StepStatus::InProgress,
        }
    }

    /// Fraction of items processed, 0.0-1.0 (0 when the step has no items).
    pub fn progress_fraction(&self) -> f64 {
        if self.item_count == 0 {
            return 0.0;
        }
        self.processed_items as f64 / self.item_count as f64
    }

    /// Step-local progress in percent.
    pub fn progress_percent(&self) -> f64 {
        self.progress_fraction() * 100.0
    }

    /// Whether the step has been sealed.
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    /// Items still to be processed.
    pub fn remaining_items(&self) -> u64 {
        self.item_count.saturating_sub(self.processed_items)
    }

    /// Time spent in the step as of `now`.
    pub fn elapsed(&self, now: Duration) -> Duration {
        match self.duration {
            Some(duration) => duration,
            None => now.saturating_sub(self.start_time),
        }
    }

    /// Seal the step at `now`. Has no effect on a completed step.
    pub fn complete(&mut self, now: Duration) -> Option<Duration> {
        if self.is_completed() {
            return None;
        }
        let now = now.max(self.start_time);
        let duration = now - self.start_time;
        self.end_time = Some(now);
        self.duration = Some(duration);
        self.status = StepStatus::Completed;
        Some(duration)
    }
}
