//! Step registry - the validated, ordered set of pipeline steps.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use vidseq_core::{StepDefinition, StepId};

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-3;

/// Error type for registry construction.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while building a [`StepRegistry`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Two definitions share an id
    #[error("Duplicate step id: {0}")]
    DuplicateStep(StepId),

    /// A definition has a blank id
    #[error("Step id must not be empty")]
    EmptyStepId,

    /// A weight is negative, NaN or infinite
    #[error("Invalid weight {weight} for step {id}")]
    InvalidWeight {
        /// Offending step
        id: StepId,
        /// Offending weight
        weight: f64,
    },

    /// Weights do not sum to 1.0
    #[error("Step weights sum to {0}, expected 1.0")]
    WeightSum(f64),

    /// All weights are zero, so they cannot be normalized
    #[error("Step weights sum to zero")]
    ZeroTotalWeight,
}

/// Ordered, validated collection of [`StepDefinition`]s keyed by [`StepId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
    index: HashMap<StepId, usize>,
}

impl StepRegistry {
    /// Build a registry whose weights already sum to 1.0.
    ///
    /// An empty list is accepted; the tracker substitutes the default
    /// pipeline for it.
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self> {
        let registry = Self::build(steps)?;
        if !registry.is_empty() {
            let sum = registry.total_weight();
            if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(RegistryError::WeightSum(sum));
            }
        }
        Ok(registry)
    }

    /// Build a registry, rescaling the weights so they sum to 1.0.
    pub fn normalized(steps: Vec<StepDefinition>) -> Result<Self> {
        let mut registry = Self::build(steps)?;
        if registry.is_empty() {
            return Ok(registry);
        }
        let sum = registry.total_weight();
        if sum <= 0.0 {
            return Err(RegistryError::ZeroTotalWeight);
        }
        for step in &mut registry.steps {
            step.weight /= sum;
        }
        Ok(registry)
    }

    /// The five-stage image-to-video pipeline.
    ///
    /// Weights: validation 0.10, processing 0.15, encoder init 0.20,
    /// encoding 0.50, finalization 0.05.
    pub fn default_pipeline() -> Self {
        let steps = vec![
            StepDefinition::new("validation", "Validating images", 0.10, Duration::from_secs(2)),
            StepDefinition::new("processing", "Processing images", 0.15, Duration::from_secs(5)),
            StepDefinition::new("encoder_init", "Initializing encoder", 0.20, Duration::from_secs(3)),
            StepDefinition::new("encoding", "Encoding video", 0.50, Duration::from_secs(20)),
            StepDefinition::new("finalization", "Finalizing output", 0.05, Duration::from_secs(1)),
        ];
        let index = Self::index_of(&steps);
        Self { steps, index }
    }

    fn build(steps: Vec<StepDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for step in &steps {
            if step.id.is_blank() {
                return Err(RegistryError::EmptyStepId);
            }
            if !step.weight.is_finite() || step.weight < 0.0 {
                return Err(RegistryError::InvalidWeight {
                    id: step.id.clone(),
                    weight: step.weight,
                });
            }
            if !seen.insert(&step.id) {
                return Err(RegistryError::DuplicateStep(step.id.clone()));
            }
        }
        let index = Self::index_of(&steps);
        Ok(Self { steps, index })
    }

    fn index_of(steps: &[StepDefinition]) -> HashMap<StepId, usize> {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.id.clone(), i))
            .collect()
    }

    /// Look up a definition.
    pub fn get(&self, id: &StepId) -> Option<&StepDefinition> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &StepId) -> bool {
        self.index.contains_key(id)
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter()
    }

    /// Definitions as a slice.
    pub fn definitions(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the registry has no definitions.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.steps.iter().map(|step| step.weight).sum()
    }
}
