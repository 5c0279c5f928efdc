//! Detailed operation reports.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use vidseq_core::{CombinedEta, Issue, SessionId, StepInstance, Time, TrackerState, TrackingSession};
use crate::statistics::StatisticsSnapshot;

/// Report of a tracked operation, suitable for archiving.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    /// Operation summary
    pub summary: ReportSummary,
    /// Timing information
    pub timing: ReportTiming,
    /// Recorded performance metrics
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Recorded errors and warnings
    pub issues: ReportIssues,
    /// Every step started
    pub steps: Vec<StepInstance>,
    /// Remaining-time estimate when the report was built
    pub eta: CombinedEta,
    /// When the report was built
    pub generated_at: Time,
}

/// Summary section of an [`OperationReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub id: Option<SessionId>,
    pub name: Option<String>,
    pub status: TrackerState,
    pub progress_percentage: f64,
    pub steps_completed: usize,
    pub total_steps: usize,
    pub items_processed: u64,
    pub total_items: u64,
}

/// Timing section of an [`OperationReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportTiming {
    pub started_at: Option<Time>,
    pub total_duration: Duration,
    pub average_step_duration: Option<Duration>,
    pub step_count: usize,
    pub items_per_second: Option<f64>,
}

/// Issue section of an [`OperationReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportIssues {
    pub error_count: usize,
    pub warning_count: usize,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl OperationReport {
    /// Build a report from a session and its latest statistics.
    pub fn build(session: &TrackingSession, statistics: StatisticsSnapshot, generated_at: Time) -> Self {
        let step_count = statistics
            .step_history
            .iter()
            .filter(|step| step.is_completed())
            .count();

        Self {
            summary: ReportSummary {
                id: statistics.session_id,
                name: statistics.operation_name,
                status: statistics.state,
                progress_percentage: statistics.overall_progress,
                steps_completed: statistics.completed_steps,
                total_steps: statistics.total_steps,
                items_processed: statistics.processed_items,
                total_items: statistics.total_items,
            },
            timing: ReportTiming {
                started_at: session.started_at,
                total_duration: statistics.elapsed,
                average_step_duration: statistics.average_step_duration,
                step_count,
                items_per_second: statistics.session_throughput,
            },
            metrics: session.metrics.clone(),
            issues: ReportIssues {
                error_count: session.errors.len(),
                warning_count: session.warnings.len(),
                errors: session.errors.clone(),
                warnings: session.warnings.clone(),
            },
            steps: statistics.step_history,
            eta: statistics.eta,
            generated_at,
        }
    }

    /// Render as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
