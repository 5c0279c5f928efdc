//! vidseq core data models.
//!
//! This crate defines the data structures shared by the progress engine
//! and its hosts: step definitions and instances, tracking sessions, and
//! time estimates.

#![warn(missing_docs)]

// Core identities
mod id;

// Pipeline steps and sessions
mod step;
mod session;

// Estimates
mod eta;

// Re-exports
pub use id::*;

pub use step::{StepDefinition, StepInstance, StepStatus};
pub use session::{TrackingSession, TrackerState, Issue, Severity};
pub use eta::{EtaMethod, Confidence, EtaEstimate, CombinedEta};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
