//! Tracking session - one run of a tracked pipeline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use crate::id::{SessionId, StepId};
use crate::step::{StepInstance, StepStatus};
use crate::Time;

/// Lifecycle of a tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    /// No session started (or reset)
    #[default]
    Uninitialized,
    /// Accepting step and item updates
    Tracking,
    /// Finalized successfully, read-only
    Completed,
    /// Finalized after a failure, read-only
    Failed,
}

impl TrackerState {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Uninitialized => "uninitialized",
            TrackerState::Tracking => "tracking",
            TrackerState::Completed => "completed",
            TrackerState::Failed => "failed",
        }
    }

    /// Whether the session has been finalized.
    pub fn is_finished(&self) -> bool {
        matches!(self, TrackerState::Completed | TrackerState::Failed)
    }
}

/// Severity of a recorded issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// An error or warning recorded during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity
    pub severity: Severity,

    /// Category (e.g. `Misuse`, `OperationFailure`)
    pub kind: String,

    /// Description
    pub message: String,

    /// Clock offset at which it was recorded
    pub at: Duration,

    /// Step active at the time, if any
    pub step: Option<StepId>,
}

/// State of one tracking session.
///
/// At most one entry of `step_history` is in progress; `current_step` indexes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingSession {
    /// Session identifier, assigned at start
    pub id: Option<SessionId>,

    /// Operation name
    pub operation_name: Option<String>,

    /// Wall-clock start
    pub started_at: Option<Time>,

    /// Monotonic start offset
    pub start_time: Option<Duration>,

    /// Monotonic end offset, set when finalized
    pub end_time: Option<Duration>,

    /// Number of steps expected
    pub total_steps: usize,

    /// Number of steps completed
    pub completed_steps: usize,

    /// Number of items expected
    pub total_items: u64,

    /// Number of items processed
    pub processed_items: u64,

    /// Every step started in this session, in start order
    pub step_history: Vec<StepInstance>,

    /// Index into `step_history` of the step in progress
    pub current_step: Option<usize>,

    /// Rolling window of completed-step durations
    pub step_durations: VecDeque<Duration>,

    /// Named performance metrics
    pub metrics: BTreeMap<String, serde_json::Value>,

    /// Recorded errors
    pub errors: Vec<Issue>,

    /// Recorded warnings
    pub warnings: Vec<Issue>,
}

impl TrackingSession {
    /// The step in progress.
    pub fn current(&self) -> Option<&StepInstance> {
        self.current_step.and_then(|index| self.step_history.get(index))
    }

    /// Mutable access to the step in progress.
    pub fn current_mut(&mut self) -> Option<&mut StepInstance> {
        self.current_step.and_then(|index| self.step_history.get_mut(index))
    }

    /// Whether any instance of `id` has been completed.
    pub fn is_step_completed(&self, id: &StepId) -> bool {
        self.step_history
            .iter()
            .any(|step| step.id == *id && step.status == StepStatus::Completed)
    }

    /// Time since the session started, as of `now`.
    pub fn elapsed(&self, now: Duration) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            (Some(start), None) => now.saturating_sub(start),
            _ => Duration::ZERO,
        }
    }

    /// Mean of the recorded step durations.
    pub fn average_step_duration(&self) -> Option<Duration> {
        if self.step_durations.is_empty() {
            return None;
        }
        let total: Duration = self.step_durations.iter().sum();
        Some(total / self.step_durations.len() as u32)
    }
}
