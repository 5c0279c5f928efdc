//! Throughput and completion statistics.

use serde::Serialize;
use std::time::Duration;
use vidseq_core::{
    CombinedEta, SessionId, StepId, StepInstance, TrackerState, TrackingSession,
};
use crate::estimator::credited_weight;
use crate::registry::StepRegistry;

/// Throughput of the active step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepThroughput {
    /// Items processed per second
    pub items_per_second: f64,

    /// Mean time per processed item
    pub average_item_time: Duration,

    /// Clock offset at which the step should finish at the current rate
    pub estimated_completion: Option<Duration>,
}

/// Full statistics of a session at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    /// Session identifier
    pub session_id: Option<SessionId>,

    /// Operation name
    pub operation_name: Option<String>,

    /// Tracker state
    pub state: TrackerState,

    /// Steps expected
    pub total_steps: usize,

    /// Steps completed
    pub completed_steps: usize,

    /// Items expected
    pub total_items: u64,

    /// Items processed
    pub processed_items: u64,

    /// Time since the session started
    pub elapsed: Duration,

    /// Weighted progress over the whole pipeline (0-100)
    pub overall_progress: f64,

    /// Progress of the active step (0-100)
    pub step_progress: f64,

    /// Active step
    pub current_step: Option<StepId>,

    /// Throughput of the active step
    pub step_throughput: Option<StepThroughput>,

    /// Items per second over the whole session
    pub session_throughput: Option<f64>,

    /// Mean duration of completed steps
    pub average_step_duration: Option<Duration>,

    /// Every step started so far
    pub step_history: Vec<StepInstance>,

    /// Combined remaining-time estimate
    pub eta: CombinedEta,

    /// Number of recorded warnings
    pub warning_count: usize,

    /// Number of recorded errors
    pub error_count: usize,
}

/// Computes throughput, progress and snapshots from a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// Create a new aggregator.
    pub fn new() -> Self {
        Self
    }

    /// Throughput of `step` as of `now`, once at least one item is done.
    pub fn step_throughput(&self, step: &StepInstance, now: Duration) -> Option<StepThroughput> {
        if step.processed_items == 0 {
            return None;
        }
        let elapsed = step.elapsed(now);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if elapsed_ms <= 0.0 {
            return None;
        }

        let items_per_second = step.processed_items as f64 / elapsed_ms * 1000.0;
        let average_item_time = elapsed / u32::try_from(step.processed_items).unwrap_or(u32::MAX);
        let estimated_completion = if items_per_second > 0.0 {
            Duration::try_from_secs_f64(step.remaining_items() as f64 / items_per_second)
                .ok()
                .map(|left| now.saturating_add(left))
        } else {
            None
        };

        Some(StepThroughput {
            items_per_second,
            average_item_time,
            estimated_completion,
        })
    }

    /// Items per second over the whole session.
    pub fn session_throughput(&self, session: &TrackingSession, now: Duration) -> Option<f64> {
        let elapsed_ms = session.elapsed(now).as_secs_f64() * 1000.0;
        if elapsed_ms <= 0.0 {
            return None;
        }
        Some(session.processed_items as f64 / elapsed_ms * 1000.0)
    }

    /// Weighted progress of the whole pipeline, 0-100.
    pub fn overall_progress(&self, session: &TrackingSession, registry: &StepRegistry) -> f64 {
        (credited_weight(session, registry) * 100.0).clamp(0.0, 100.0)
    }

    /// Assemble a full snapshot.
    pub fn snapshot(
        &self,
        session: &TrackingSession,
        registry: &StepRegistry,
        state: TrackerState,
        eta: CombinedEta,
        now: Duration,
    ) -> StatisticsSnapshot {
        let current = session.current();
        StatisticsSnapshot {
            session_id: session.id,
            operation_name: session.operation_name.clone(),
            state,
            total_steps: session.total_steps,
            completed_steps: session.completed_steps,
            total_items: session.total_items,
            processed_items: session.processed_items,
            elapsed: session.elapsed(now),
            overall_progress: self.overall_progress(session, registry),
            step_progress: current.map(StepInstance::progress_percent).unwrap_or(0.0),
            current_step: current.map(|step| step.id.clone()),
            step_throughput: current.and_then(|step| self.step_throughput(step, now)),
            session_throughput: self.session_throughput(session, now),
            average_step_duration: session.average_step_duration(),
            step_history: session.step_history.clone(),
            eta,
            warning_count: session.warnings.len(),
            error_count: session.errors.len(),
        }
    }
}
