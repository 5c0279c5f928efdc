//! Observer registration and notification.
//!
//! Any number of observers can be registered. Each notification round
//! delivers, in order: progress, step, ETA, statistics. Every observer sees
//! one kind before any observer sees the next.

use serde::Serialize;
use vidseq_core::{CombinedEta, StepId, StepInstance};
use crate::statistics::StatisticsSnapshot;

/// Progress of the pipeline and of the active step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Weighted progress over the whole pipeline (0-100)
    pub overall_progress: f64,

    /// Progress of the active step (0-100)
    pub step_progress: f64,

    /// Latest status message
    pub message: Option<String>,

    /// Label of the item most recently processed
    pub current_item: Option<String>,
}

/// Position in the step sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepUpdate {
    /// Active step
    pub current_step: Option<StepId>,

    /// Display name of the active step
    pub step_name: Option<String>,

    /// Steps completed
    pub completed_steps: usize,

    /// Steps expected
    pub total_steps: usize,

    /// Every step started so far
    pub step_history: Vec<StepInstance>,
}

/// Receives tracker notifications. All methods default to no-ops.
pub trait ProgressObserver: Send {
    /// Called with overall and step progress.
    fn on_progress_update(&mut self, _update: &ProgressUpdate) {}

    /// Called with the step position.
    fn on_step_update(&mut self, _update: &StepUpdate) {}

    /// Called with the combined ETA.
    fn on_eta_update(&mut self, _eta: &CombinedEta) {}

    /// Called with the full statistics snapshot.
    fn on_statistics_update(&mut self, _snapshot: &StatisticsSnapshot) {}
}

/// Handle returned on registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct OnProgress<F>(F);

impl<F: FnMut(&ProgressUpdate) + Send> ProgressObserver for OnProgress<F> {
    fn on_progress_update(&mut self, update: &ProgressUpdate) {
        (self.0)(update)
    }
}

struct OnStep<F>(F);

impl<F: FnMut(&StepUpdate) + Send> ProgressObserver for OnStep<F> {
    fn on_step_update(&mut self, update: &StepUpdate) {
        (self.0)(update)
    }
}

struct OnEta<F>(F);

impl<F: FnMut(&CombinedEta) + Send> ProgressObserver for OnEta<F> {
    fn on_eta_update(&mut self, eta: &CombinedEta) {
        (self.0)(eta)
    }
}

struct OnStatistics<F>(F);

impl<F: FnMut(&StatisticsSnapshot) + Send> ProgressObserver for OnStatistics<F> {
    fn on_statistics_update(&mut self, snapshot: &StatisticsSnapshot) {
        (self.0)(snapshot)
    }
}

/// Ordered list of observers.
#[derive(Default)]
pub struct CallbackDispatcher {
    observers: Vec<(ObserverId, Box<dyn ProgressObserver>)>,
    next_id: u64,
}

impl CallbackDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for all four notification kinds.
    pub fn subscribe(&mut self, observer: impl ProgressObserver + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != id);
        self.observers.len() != before
    }

    /// Register a progress callback.
    pub fn on_progress_update(
        &mut self,
        f: impl FnMut(&ProgressUpdate) + Send + 'static,
    ) -> ObserverId {
        self.subscribe(OnProgress(f))
    }

    /// Register a step callback.
    pub fn on_step_update(&mut self, f: impl FnMut(&StepUpdate) + Send + 'static) -> ObserverId {
        self.subscribe(OnStep(f))
    }

    /// Register an ETA callback.
    pub fn on_eta_update(&mut self, f: impl FnMut(&CombinedEta) + Send + 'static) -> ObserverId {
        self.subscribe(OnEta(f))
    }

    /// Register a statistics callback.
    pub fn on_statistics_update(
        &mut self,
        f: impl FnMut(&StatisticsSnapshot) + Send + 'static,
    ) -> ObserverId {
        self.subscribe(OnStatistics(f))
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver one notification round.
    pub fn dispatch(
        &mut self,
        progress: &ProgressUpdate,
        step: &StepUpdate,
        eta: &CombinedEta,
        statistics: &StatisticsSnapshot,
    ) {
        for (_, observer) in &mut self.observers {
            observer.on_progress_update(progress);
        }
        for (_, observer) in &mut self.observers {
            observer.on_step_update(step);
        }
        for (_, observer) in &mut self.observers {
            observer.on_eta_update(eta);
        }
        for (_, observer) in &mut self.observers {
            observer.on_statistics_update(statistics);
        }
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("observers", &self.observers.len())
            .finish()
    }
}
