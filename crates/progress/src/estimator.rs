//! Remaining-time estimation.
//!
//! Three independent methods look at the same session:
//! - linear: completed steps over total steps
//! - weighted: step weights credited by completion
//! - historical: mean duration of completed steps
//!
//! [`EtaEstimator::combine`] merges the available ones, weighting each by
//! its confidence tier.

use std::time::Duration;
use vidseq_core::{CombinedEta, Confidence, EtaEstimate, EtaMethod, TrackingSession};
use crate::registry::StepRegistry;

/// Linear progress above which the linear method is `Medium`.
const LINEAR_MEDIUM_THRESHOLD: f64 = 0.2;

/// Weighted progress above which the weighted method is `High`.
const WEIGHTED_HIGH_THRESHOLD: f64 = 0.3;

/// Samples needed before the historical method reports anything.
const HISTORICAL_MIN_SAMPLES: usize = 2;

/// Samples needed for a `High` historical estimate.
pub(crate) const HISTORICAL_HIGH_SAMPLES: usize = 3;

/// Remaining-time estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtaEstimator;

impl EtaEstimator {
    /// Create a new estimator.
    pub fn new() -> Self {
        Self
    }

    /// Run all three methods and combine them.
    pub fn calculate(
        &self,
        session: &TrackingSession,
        registry: &StepRegistry,
        now: Duration,
    ) -> CombinedEta {
        self.combine(&self.estimates(session, registry, now))
    }

    /// Run all three methods.
    pub fn estimates(
        &self,
        session: &TrackingSession,
        registry: &StepRegistry,
        now: Duration,
    ) -> [EtaEstimate; 3] {
        [
            self.linear(session, now),
            self.weighted(session, registry, now),
            self.historical(session, registry, now),
        ]
    }

    /// Extrapolate from the fraction of steps completed.
    pub fn linear(&self, session: &TrackingSession, now: Duration) -> EtaEstimate {
        if session.total_steps == 0 || session.completed_steps == 0 {
            return EtaEstimate::unavailable(EtaMethod::Linear);
        }
        let fraction = session.completed_steps as f64 / session.total_steps as f64;
        let confidence = if fraction > LINEAR_MEDIUM_THRESHOLD {
            Confidence::Medium
        } else {
            Confidence::Low
        };
        EtaEstimate {
            method: EtaMethod::Linear,
            remaining: extrapolate(session.elapsed(now), fraction),
            confidence,
        }
    }

    /// Extrapolate from the weight of completed work.
    pub fn weighted(
        &self,
        session: &TrackingSession,
        registry: &StepRegistry,
        now: Duration,
    ) -> EtaEstimate {
        let total = registry.total_weight();
        let credited = credited_weight(session, registry);
        if total <= 0.0 || credited <= 0.0 {
            return EtaEstimate::unavailable(EtaMethod::Weighted);
        }
        let progress = credited / total;
        let confidence = if progress > WEIGHTED_HIGH_THRESHOLD {
            Confidence::High
        } else {
            Confidence::Medium
        };
        EtaEstimate {
            method: EtaMethod::Weighted,
            remaining: extrapolate(session.elapsed(now), progress),
            confidence,
        }
    }

    /// Project the mean completed-step duration over the remaining steps.
    pub fn historical(
        &self,
        session: &TrackingSession,
        registry: &StepRegistry,
        now: Duration,
    ) -> EtaEstimate {
        let samples = session.step_durations.len();
        let Some(average) = session.average_step_duration() else {
            return EtaEstimate::unavailable(EtaMethod::Historical);
        };
        if samples < HISTORICAL_MIN_SAMPLES {
            return EtaEstimate::unavailable(EtaMethod::Historical);
        }

        let remaining_steps = session.total_steps.saturating_sub(session.completed_steps);
        let mut remaining = average.saturating_mul(u32::try_from(remaining_steps).unwrap_or(u32::MAX));

        // The active step also owes whatever is left of its declared duration.
        if let Some(step) = session.current() {
            let declared = registry
                .get(&step.id)
                .map(|def| def.estimated_duration)
                .unwrap_or_default();
            remaining = remaining.saturating_add(declared.saturating_sub(step.elapsed(now)));
        }

        let confidence = if samples >= HISTORICAL_HIGH_SAMPLES {
            Confidence::High
        } else {
            Confidence::Medium
        };
        EtaEstimate {
            method: EtaMethod::Historical,
            remaining: Some(remaining),
            confidence,
        }
    }

    /// Confidence-weighted average of the available estimates.
    pub fn combine(&self, estimates: &[EtaEstimate]) -> CombinedEta {
        let available: Vec<(&EtaEstimate, Duration)> = estimates
            .iter()
            .filter_map(|e| e.remaining.map(|remaining| (e, remaining)))
            .collect();
        if available.is_empty() {
            return CombinedEta::calculating();
        }

        let (weighted_sum, weight_total) = available.iter().fold((0.0, 0.0), |(sum, total), (e, r)| {
            let w = e.confidence.weight();
            (sum + r.as_secs_f64() * w, total + w)
        });
        let remaining = Duration::try_from_secs_f64(weighted_sum / weight_total).ok();

        let high = available.iter().filter(|(e, _)| e.confidence == Confidence::High).count();
        let medium = available.iter().filter(|(e, _)| e.confidence == Confidence::Medium).count();
        let confidence = if high >= 2 {
            Confidence::High
        } else if high >= 1 || medium >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        CombinedEta {
            remaining,
            formatted: remaining
                .map(format_duration)
                .unwrap_or_else(|| CombinedEta::CALCULATING.to_string()),
            confidence,
            contributing_methods: available.iter().map(|(e, _)| e.method).collect(),
        }
    }
}

/// Weight credited to the session: full weight for completed steps, a
/// share of the weight for the active one.
pub(crate) fn credited_weight(session: &TrackingSession, registry: &StepRegistry) -> f64 {
    let active = session.current();
    registry
        .iter()
        .map(|def| {
            if session.is_step_completed(&def.id) {
                def.weight
            } else {
                match active {
                    Some(step) if step.id == def.id => def.weight * step.progress_fraction(),
                    _ => 0.0,
                }
            }
        })
        .sum()
}

fn extrapolate(elapsed: Duration, progress: f64) -> Option<Duration> {
    if progress <= 0.0 || !progress.is_finite() {
        return None;
    }
    let elapsed = elapsed.as_secs_f64();
    let total = elapsed / progress;
    Duration::try_from_secs_f64((total - elapsed).max(0.0)).ok()
}

/// Render a duration for display.
///
/// Under a minute: `45.0s`; under an hour: `2m 5s`; otherwise `1h 2m`.
pub fn format_duration(duration: Duration) -> String {
    let tenths = (duration.as_secs_f64() * 10.0).round();
    if tenths < 600.0 {
        return format!("{:.1}s", tenths / 10.0);
    }
    let whole = (tenths / 10.0) as u64;
    if whole < 3600 {
        format!("{}m {}s", whole / 60, whole % 60)
    } else {
        format!("{}h {}m", whole / 3600, (whole % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidseq_core::{StepDefinition, StepInstance};

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn completed(id: &str, start: u64, end: u64) -> StepInstance {
        let mut step = StepInstance::begin(id.into(), id.into(), 0, secs(start));
        step.complete(secs(end));
        step
    }

    fn session(total_steps: usize) -> TrackingSession {
        TrackingSession {
            start_time: Some(Duration::ZERO),
            total_steps,
            ..Default::default()
        }
    }

    fn assert_secs(actual: Option<Duration>, expected: f64) {
        let actual = actual.expect("estimate").as_secs_f64();
        assert!((actual - expected).abs() < 1e-6, "{actual} != {expected}");
    }

    fn estimate(method: EtaMethod, remaining: u64, confidence: Confidence) -> EtaEstimate {
        EtaEstimate {
            method,
            remaining: Some(secs(remaining)),
            confidence,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(secs(45)), "45.0s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(secs(125)), "2m 5s");
        assert_eq!(format_duration(secs(3725)), "1h 2m");
    }

    #[test]
    fn test_format_duration_rounds_before_picking_unit() {
        assert_eq!(format_duration(Duration::from_millis(59_940)), "59.9s");
        assert_eq!(format_duration(Duration::from_millis(59_960)), "1m 0s");
        assert_eq!(format_duration(Duration::from_millis(125_700)), "2m 5s");
    }

    #[test]
    fn test_linear_without_completed_steps() {
        let estimate = EtaEstimator::new().linear(&session(4), secs(10));
        assert!(estimate.remaining.is_none());
        assert_eq!(estimate.confidence, Confidence::Low);
    }

    #[test]
    fn test_linear_extrapolates() {
        let mut s = session(4);
        s.completed_steps = 1;
        let estimate = EtaEstimator::new().linear(&s, secs(10));
        assert_secs(estimate.remaining, 30.0);
        assert_eq!(estimate.confidence, Confidence::Medium);

        let mut s = session(10);
        s.completed_steps = 2;
        let estimate = EtaEstimator::new().linear(&s, secs(10));
        assert_secs(estimate.remaining, 40.0);
        assert_eq!(estimate.confidence, Confidence::Low);
    }

    #[test]
    fn test_weighted_credits_partial_active_step() {
        let registry = StepRegistry::default_pipeline();
        let mut s = session(5);
        s.step_history.push(completed("validation", 0, 5));
        s.step_history.push(completed("processing", 5, 10));
        let mut encoder = StepInstance::begin("encoder_init".into(), "init".into(), 4, secs(10));
        encoder.processed_items = 2;
        s.step_history.push(encoder);
        s.current_step = Some(2);

        // 0.10 + 0.15 + 0.20 * 0.5 = 0.35
        assert!((credited_weight(&s, &registry) - 0.35).abs() < 1e-9);
        let estimate = EtaEstimator::new().weighted(&s, &registry, secs(14));
        assert_eq!(estimate.confidence, Confidence::High);
        assert_secs(estimate.remaining, 26.0);
    }

    #[test]
    fn test_weighted_without_credit() {
        let registry = StepRegistry::default_pipeline();
        let estimate = EtaEstimator::new().weighted(&session(5), &registry, secs(3));
        assert!(!estimate.is_available());
    }

    #[test]
    fn test_historical_needs_two_samples() {
        let registry = StepRegistry::default_pipeline();
        let mut s = session(5);
        s.completed_steps = 1;
        s.step_durations.push_back(secs(4));
        assert!(!EtaEstimator::new().historical(&s, &registry, secs(4)).is_available());

        s.completed_steps = 2;
        s.step_durations.push_back(secs(6));
        let estimate = EtaEstimator::new().historical(&s, &registry, secs(10));
        assert_eq!(estimate.remaining, Some(secs(15)));
        assert_eq!(estimate.confidence, Confidence::Medium);
    }

    #[test]
    fn test_historical_adds_declared_remainder_of_active_step() {
        let registry = StepRegistry::new(vec![
            StepDefinition::new("a", "a", 0.25, secs(1)),
            StepDefinition::new("b", "b", 0.25, secs(1)),
            StepDefinition::new("c", "c", 0.25, secs(1)),
            StepDefinition::new("d", "d", 0.25, secs(10)),
        ])
        .unwrap();
        let mut s = session(4);
        s.completed_steps = 3;
        s.step_durations.extend([secs(2), secs(2), secs(2)]);
        s.step_history.push(StepInstance::begin("d".into(), "d".into(), 0, secs(6)));
        s.current_step = Some(0);

        let estimate = EtaEstimator::new().historical(&s, &registry, secs(9));
        // one remaining step at 2s plus 10s declared - 3s spent
        assert_eq!(estimate.remaining, Some(secs(9)));
        assert_eq!(estimate.confidence, Confidence::High);
    }

    #[test]
    fn test_combine_nothing_available() {
        let combined = EtaEstimator::new().combine(&[
            EtaEstimate::unavailable(EtaMethod::Linear),
            EtaEstimate::unavailable(EtaMethod::Weighted),
        ]);
        assert_eq!(combined, CombinedEta::calculating());
    }

    #[test]
    fn test_combine_weights_by_confidence() {
        let combined = EtaEstimator::new().combine(&[
            estimate(EtaMethod::Linear, 10, Confidence::Low),
            estimate(EtaMethod::Weighted, 40, Confidence::High),
            EtaEstimate::unavailable(EtaMethod::Historical),
        ]);
        // (10 * 1 + 40 * 3) / 4
        assert_eq!(combined.remaining, Some(Duration::from_millis(32_500)));
        assert_eq!(combined.formatted, "32.5s");
        assert_eq!(combined.confidence, Confidence::Medium);
        assert_eq!(combined.contributing_methods, vec![EtaMethod::Linear, EtaMethod::Weighted]);
    }

    #[test]
    fn test_combine_confidence_tiers() {
        let estimator = EtaEstimator::new();
        let two_high = estimator.combine(&[
            estimate(EtaMethod::Weighted, 10, Confidence::High),
            estimate(EtaMethod::Historical, 10, Confidence::High),
        ]);
        assert_eq!(two_high.confidence, Confidence::High);

        let two_medium = estimator.combine(&[
            estimate(EtaMethod::Linear, 10, Confidence::Medium),
            estimate(EtaMethod::Historical, 10, Confidence::Medium),
        ]);
        assert_eq!(two_medium.confidence, Confidence::Medium);

        let one_medium = estimator.combine(&[estimate(EtaMethod::Linear, 10, Confidence::Medium)]);
        assert_eq!(one_medium.confidence, Confidence::Low);
    }
}
