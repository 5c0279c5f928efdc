//! Progress tracking service.
//!
//! [`Tracker`] owns one [`TrackingSession`] and drives it through its
//! lifecycle:
//!
//! ```text
//! Uninitialized --start_tracking--> Tracking --complete_tracking--> Completed
//!                                       \------fail_tracking------> Failed
//! ```
//!
//! `reset()` returns to `Uninitialized` from any state. While tracking, at
//! most one step is in progress. Misuse never panics: the call is ignored,
//! logged, and recorded as a warning.

use std::time::Duration;
use tracing::{debug, info, trace, warn};
use vidseq_core::{
    CombinedEta, Issue, SessionId, Severity, StepId, StepInstance, TrackerState, TrackingSession,
};
use crate::clock::{Clock, MonotonicClock};
use crate::config::TrackerConfig;
use crate::dispatcher::{CallbackDispatcher, ObserverId, ProgressObserver, ProgressUpdate, StepUpdate};
use crate::estimator::EtaEstimator;
use crate::registry::StepRegistry;
use crate::report::OperationReport;
use crate::statistics::{StatisticsAggregator, StatisticsSnapshot, StepThroughput};

/// Progress tracker for a multi-step pipeline.
pub struct Tracker<C: Clock = MonotonicClock> {
    clock: C,
    config: TrackerConfig,
    state: TrackerState,
    session: TrackingSession,
    registry: StepRegistry,
    estimator: EtaEstimator,
    aggregator: StatisticsAggregator,
    dispatcher: CallbackDispatcher,
}

impl Tracker<MonotonicClock> {
    /// Create a tracker on the system monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for Tracker<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Tracker<C> {
    /// Create a tracker on the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            config: TrackerConfig::default(),
            state: TrackerState::Uninitialized,
            session: TrackingSession::default(),
            registry: StepRegistry::default(),
            estimator: EtaEstimator::new(),
            aggregator: StatisticsAggregator::new(),
            dispatcher: CallbackDispatcher::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    // === Accessors ===

    /// Current lifecycle state.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// The session being tracked.
    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// Steps of the current session.
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Configuration in use.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The injected clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // === Observers ===

    /// Register an observer for all notification kinds.
    pub fn subscribe(&mut self, observer: impl ProgressObserver + 'static) -> ObserverId {
        self.dispatcher.subscribe(observer)
    }

    /// Remove an observer.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Register a progress callback.
    pub fn on_progress_update(
        &mut self,
        f: impl FnMut(&ProgressUpdate) + Send + 'static,
    ) -> ObserverId {
        self.dispatcher.on_progress_update(f)
    }

    /// Register a step callback.
    pub fn on_step_update(&mut self, f: impl FnMut(&StepUpdate) + Send + 'static) -> ObserverId {
        self.dispatcher.on_step_update(f)
    }

    /// Register an ETA callback.
    pub fn on_eta_update(&mut self, f: impl FnMut(&CombinedEta) + Send + 'static) -> ObserverId {
        self.dispatcher.on_eta_update(f)
    }

    /// Register a statistics callback.
    pub fn on_statistics_update(
        &mut self,
        f: impl FnMut(&StatisticsSnapshot) + Send + 'static,
    ) -> ObserverId {
        self.dispatcher.on_statistics_update(f)
    }

    // === Session lifecycle ===

    /// Start a new session, discarding any previous one.
    ///
    /// `None` or an empty registry installs [`StepRegistry::default_pipeline`].
    /// A `total_steps` of zero falls back to the number of registered steps.
    pub fn start_tracking(&mut self, total_steps: usize, total_items: u64, steps: Option<StepRegistry>) {
        if self.state == TrackerState::Tracking {
            debug!("Discarding session {:?} in progress", self.session.id);
        }

        let registry = match steps {
            Some(registry) if !registry.is_empty() => registry,
            _ => StepRegistry::default_pipeline(),
        };
        let total_steps = if total_steps == 0 {
            debug!("No step count given, using {} registered steps", registry.len());
            registry.len()
        } else {
            total_steps
        };

        let id = SessionId::new();
        self.session = TrackingSession {
            id: Some(id),
            started_at: Some(self.clock.wall_time()),
            start_time: Some(self.clock.now()),
            total_steps,
            total_items,
            ..Default::default()
        };
        self.registry = registry;
        self.state = TrackerState::Tracking;

        info!("Started session {} ({} steps, {} items)", id, total_steps, total_items);
        self.notify();
    }

    /// Name the operation being tracked.
    pub fn set_operation_name(&mut self, name: impl Into<String>) {
        if !self.ensure_tracking("set_operation_name") {
            return;
        }
        self.session.operation_name = Some(name.into());
        self.notify();
    }

    /// Begin a step. A step still in progress is completed first.
    ///
    /// Without a name, the registered name (or the id) is used.
    pub fn start_step(&mut self, id: impl Into<StepId>, name: Option<&str>, item_count: u64) {
        if !self.ensure_tracking("start_step") {
            return;
        }
        let id = id.into();
        let now = self.clock.now();

        if let Some(previous) = self.session.current() {
            debug!("Step {} still in progress, completing it before {}", previous.id, id);
            self.seal_current(now);
        }

        let definition = self.registry.get(&id);
        if definition.is_none() {
            debug!("Step {} is not registered, it carries no weight", id);
        }
        let name = name
            .map(str::to_string)
            .or_else(|| definition.map(|def| def.name.clone()))
            .unwrap_or_else(|| id.to_string());

        debug!("Starting step {} ({} items)", id, item_count);
        self.session
            .step_history
            .push(StepInstance::begin(id, name, item_count, now));
        self.session.current_step = Some(self.session.step_history.len() - 1);
        self.notify();
    }

    /// Report progress of the active step.
    ///
    /// `processed` is the absolute number of items done in the step; `None`
    /// counts one more item. The count is clamped to the step's item count
    /// and never decreases.
    pub fn update_step_progress(
        &mut self,
        processed: Option<u64>,
        current_item: Option<&str>,
        message: Option<&str>,
    ) {
        if !self.ensure_tracking("update_step_progress") {
            return;
        }
        if self.session.current_step.is_none() {
            self.misuse("update_step_progress called with no active step");
            return;
        }
        let Some(step) = self.session.current_mut() else {
            return;
        };

        let target = match processed {
            Some(count) => count,
            None => step.processed_items.saturating_add(1),
        };
        let target = target.min(step.item_count).max(step.processed_items);
        let delta = target - step.processed_items;
        step.processed_items = target;
        if let Some(label) = current_item {
            step.current_item = Some(label.to_string());
        }
        if let Some(message) = message {
            step.message = Some(message.to_string());
        }

        self.session.processed_items = self
            .session
            .processed_items
            .saturating_add(delta)
            .min(self.session.total_items);

        if let Some(throughput) = self.step_throughput() {
            trace!("{:.2} items/s", throughput.items_per_second);
        }
        self.notify();
    }

    /// Complete the active step. Does nothing (besides a warning) without one.
    pub fn complete_step(&mut self) {
        if !self.ensure_tracking("complete_step") {
            return;
        }
        if self.session.current_step.is_none() {
            self.misuse("complete_step called with no active step");
            return;
        }
        let now = self.clock.now();
        self.seal_current(now);
        self.notify();
    }

    /// Finish the session and return the final statistics.
    ///
    /// A step still in progress is completed. Outside of tracking this only
    /// returns the current statistics.
    pub fn complete_tracking(&mut self) -> StatisticsSnapshot {
        if !self.ensure_tracking("complete_tracking") {
            return self.statistics();
        }
        let now = self.clock.now();
        self.seal_current(now);
        self.session.end_time = Some(now);
        self.state = TrackerState::Completed;

        info!(
            "Completed session {:?} in {:.2}s",
            self.session.id,
            self.session.elapsed(now).as_secs_f64()
        );
        self.notify();
        self.statistics()
    }

    /// Finish the session as failed and return the final statistics.
    pub fn fail_tracking(&mut self, reason: &str) -> StatisticsSnapshot {
        if !self.ensure_tracking("fail_tracking") {
            return self.statistics();
        }
        let now = self.clock.now();
        self.push_issue(Severity::Error, "OperationFailure", format!("Operation failed: {}", reason), now);
        self.seal_current(now);
        self.session.end_time = Some(now);
        self.state = TrackerState::Failed;

        warn!("Session {:?} failed: {}", self.session.id, reason);
        self.notify();
        self.statistics()
    }

    /// Discard the session and return to `Uninitialized`. Observers stay
    /// registered.
    pub fn reset(&mut self) {
        self.session = TrackingSession::default();
        self.registry = StepRegistry::default();
        self.state = TrackerState::Uninitialized;
        debug!("Tracker reset");
        if self.config.notify_on_reset {
            self.notify();
        }
    }

    // === Diagnostics ===

    /// Record an error against the active step.
    pub fn record_error(&mut self, kind: &str, message: impl Into<String>) {
        if !self.ensure_tracking("record_error") {
            return;
        }
        let now = self.clock.now();
        self.push_issue(Severity::Error, kind, message.into(), now);
        self.notify();
    }

    /// Record a warning against the active step.
    pub fn record_warning(&mut self, message: impl Into<String>) {
        if !self.ensure_tracking("record_warning") {
            return;
        }
        let now = self.clock.now();
        self.push_issue(Severity::Warning, "Warning", message.into(), now);
        self.notify();
    }

    /// Record a named performance metric, replacing any previous value.
    pub fn record_metric(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        if !self.ensure_tracking("record_metric") {
            return;
        }
        self.session.metrics.insert(name.into(), value.into());
        self.notify();
    }

    // === Queries ===

    /// Combined remaining-time estimate.
    pub fn calculate_eta(&self) -> CombinedEta {
        self.estimator
            .calculate(&self.session, &self.registry, self.clock.now())
    }

    /// Weighted progress of the pipeline, 0-100.
    pub fn overall_progress(&self) -> f64 {
        self.aggregator.overall_progress(&self.session, &self.registry)
    }

    /// Throughput of the active step.
    pub fn step_throughput(&self) -> Option<StepThroughput> {
        let step = self.session.current()?;
        self.aggregator.step_throughput(step, self.clock.now())
    }

    /// Full statistics snapshot.
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.snapshot_at(self.clock.now())
    }

    /// Detailed report of the session.
    pub fn report(&self) -> OperationReport {
        OperationReport::build(&self.session, self.statistics(), self.clock.wall_time())
    }

    // === Internals ===

    fn snapshot_at(&self, now: Duration) -> StatisticsSnapshot {
        let eta = self.estimator.calculate(&self.session, &self.registry, now);
        self.aggregator
            .snapshot(&self.session, &self.registry, self.state, eta, now)
    }

    fn ensure_tracking(&self, operation: &str) -> bool {
        match self.state {
            TrackerState::Tracking => true,
            state => {
                warn!("{} ignored: tracker is {}", operation, state.as_str());
                false
            }
        }
    }

    fn misuse(&mut self, message: &str) {
        warn!("{}", message);
        let now = self.clock.now();
        self.push_issue(Severity::Warning, "Misuse", message.to_string(), now);
        self.notify();
    }

    fn push_issue(&mut self, severity: Severity, kind: &str, message: String, at: Duration) {
        let issue = Issue {
            severity,
            kind: kind.to_string(),
            message,
            at,
            step: self.session.current().map(|step| step.id.clone()),
        };
        match severity {
            Severity::Warning => self.session.warnings.push(issue),
            Severity::Error => self.session.errors.push(issue),
        }
    }

    /// Complete the active step, if any.
    fn seal_current(&mut self, now: Duration) {
        let Some(index) = self.session.current_step.take() else {
            return;
        };
        let Some(duration) = self
            .session
            .step_history
            .get_mut(index)
            .and_then(|step| step.complete(now))
        else {
            return;
        };

        let window = self.config.retained_durations();
        let durations = &mut self.session.step_durations;
        durations.push_back(duration);
        while window.is_some_and(|window| durations.len() > window) {
            durations.pop_front();
        }

        if self.session.completed_steps < self.session.total_steps {
            self.session.completed_steps += 1;
        } else {
            debug!("More steps completed than the {} declared", self.session.total_steps);
        }
        debug!(
            "Completed step {} in {:.3}s",
            self.session.step_history[index].id,
            duration.as_secs_f64()
        );
    }

    fn notify(&mut self) {
        if self.dispatcher.is_empty() {
            return;
        }
        let snapshot = self.snapshot_at(self.clock.now());
        let current = self.session.current();
        let progress = ProgressUpdate {
            overall_progress: snapshot.overall_progress,
            step_progress: snapshot.step_progress,
            message: current.and_then(|step| step.message.clone()),
            current_item: current.and_then(|step| step.current_item.clone()),
        };
        let step = StepUpdate {
            current_step: snapshot.current_step.clone(),
            step_name: current.map(|step| step.name.clone()),
            completed_steps: snapshot.completed_steps,
            total_steps: snapshot.total_steps,
            step_history: snapshot.step_history.clone(),
        };
        let eta = snapshot.eta.clone();
        self.dispatcher.dispatch(&progress, &step, &eta, &snapshot);
    }
}

impl<C: Clock> std::fmt::Debug for Tracker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("state", &self.state)
            .field("session", &self.session.id)
            .field("completed_steps", &self.session.completed_steps)
            .field("total_steps", &self.session.total_steps)
            .field("observers", &self.dispatcher.len())
            .finish()
    }
}
