//! ETA model - estimates of remaining time and their confidence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Estimation method that produced an [`EtaEstimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtaMethod {
    /// Completed steps over total steps
    Linear,
    /// Step weights credited by completion
    Weighted,
    /// Mean duration of completed steps
    Historical,
}

impl EtaMethod {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EtaMethod::Linear => "linear",
            EtaMethod::Weighted => "weighted",
            EtaMethod::Historical => "historical",
        }
    }
}

impl std::fmt::Display for EtaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative rating of how well-supported an estimate is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Weight of this tier when combining estimates.
    pub fn weight(&self) -> f64 {
        match self {
            Confidence::Low => 1.0,
            Confidence::Medium => 2.0,
            Confidence::High => 3.0,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single estimation method.
///
/// Missing data is `remaining: None` with [`Confidence::Low`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtaEstimate {
    /// Method used
    pub method: EtaMethod,

    /// Estimated remaining time
    pub remaining: Option<Duration>,

    /// Confidence tier
    pub confidence: Confidence,
}

impl EtaEstimate {
    /// An estimate carrying no data.
    pub fn unavailable(method: EtaMethod) -> Self {
        Self {
            method,
            remaining: None,
            confidence: Confidence::Low,
        }
    }

    /// Whether the method produced a value.
    pub fn is_available(&self) -> bool {
        self.remaining.is_some()
    }
}

/// Confidence-weighted combination of all available estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedEta {
    /// Combined remaining time
    pub remaining: Option<Duration>,

    /// Human-readable rendering of `remaining`
    pub formatted: String,

    /// Overall confidence
    pub confidence: Confidence,

    /// Methods that produced a value
    pub contributing_methods: Vec<EtaMethod>,
}

impl CombinedEta {
    /// Text shown while no method has enough data.
    pub const CALCULATING: &'static str = "Calculating...";

    /// The combination of zero estimates.
    pub fn calculating() -> Self {
        Self {
            remaining: None,
            formatted: Self::CALCULATING.to_string(),
            confidence: Confidence::Low,
            contributing_methods: Vec::new(),
        }
    }
}

impl Default for CombinedEta {
    fn default() -> Self {
        Self::calculating()
    }
}
