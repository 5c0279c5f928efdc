//! Progress Tracking
//!
//! Weighted multi-step progress, throughput statistics, and confidence-rated
//! remaining-time estimates for media processing pipelines.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod estimator;
pub mod registry;
pub mod report;
pub mod statistics;
pub mod tracker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::TrackerConfig;
pub use dispatcher::{CallbackDispatcher, ObserverId, ProgressObserver, ProgressUpdate, StepUpdate};
pub use estimator::{EtaEstimator, format_duration};
pub use registry::{StepRegistry, RegistryError, WEIGHT_TOLERANCE};
pub use report::{OperationReport, ReportSummary, ReportTiming, ReportIssues};
pub use statistics::{StatisticsAggregator, StatisticsSnapshot, StepThroughput};
pub use tracker::Tracker;
