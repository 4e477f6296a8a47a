//! The chromosome abstraction shared by every search algorithm.
//!
//! A chromosome is one candidate test. Besides its genes it carries an
//! [`Evaluation`]: the trace of its last completed playthrough and a
//! per-objective fitness cache. Both are only meaningful for the genes they
//! were computed from, so every genetic operator returns a chromosome with a
//! fresh [`ChromosomeId`] and an empty evaluation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::program::LocationId;
use crate::randomness::Randomness;
use crate::trace::ExecutionTrace;

/// Identifier of a fitness objective (e.g. the location a statement
/// fitness targets).
pub type ObjectiveId = String;

static NEXT_CHROMOSOME_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one chromosome instance.
///
/// Clones share the id of their source; genetic operators always allocate
/// a new one. Archives use it to report distinct solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChromosomeId(u64);

impl ChromosomeId {
    /// Allocate a process-unique id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_CHROMOSOME_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Default for ChromosomeId {
    fn default() -> Self {
        Self::fresh()
    }
}

impl fmt::Display for ChromosomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of the last completed evaluation of a chromosome.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    trace: Option<ExecutionTrace>,
    fitness: HashMap<ObjectiveId, f64>,
    failed: bool,
}

impl Evaluation {
    /// Whether a playthrough completed (successfully or not) since the last
    /// genetic change.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.trace.is_some() || self.failed
    }

    /// Whether the last playthrough crashed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    #[must_use]
    pub fn trace(&self) -> Option<&ExecutionTrace> {
        self.trace.as_ref()
    }

    /// Store a completed trace, dropping every cached fitness value.
    pub fn complete(&mut self, trace: ExecutionTrace) {
        self.trace = Some(trace);
        self.fitness.clear();
        self.failed = false;
    }

    /// Record a crashed playthrough. No partial trace is kept.
    pub fn fail(&mut self) {
        self.trace = None;
        self.fitness.clear();
        self.failed = true;
    }

    /// Forget everything; required after any genetic modification.
    pub fn invalidate(&mut self) {
        self.trace = None;
        self.fitness.clear();
        self.failed = false;
    }

    #[must_use]
    pub fn cached(&self, objective: &str) -> Option<f64> {
        self.fitness.get(objective).copied()
    }

    pub fn cache(&mut self, objective: &str, value: f64) {
        self.fitness.insert(objective.to_string(), value);
    }
}

/// A candidate solution.
pub trait Chromosome: Clone + fmt::Debug {
    fn id(&self) -> ChromosomeId;

    /// Genome length used to prefer shorter solutions in the archive.
    fn length(&self) -> usize;

    fn evaluation(&self) -> &Evaluation;

    fn evaluation_mut(&mut self) -> &mut Evaluation;

    fn trace(&self) -> Option<&ExecutionTrace> {
        self.evaluation().trace()
    }

    /// Locations covered by the last playthrough (empty when unevaluated).
    fn coverage(&self) -> BTreeSet<LocationId> {
        self.trace()
            .map(|trace| trace.coverage.clone())
            .unwrap_or_default()
    }
}

/// Chromosomes that carry their own mutation and crossover operators.
///
/// Operators never touch the evaluation of their inputs; results always come
/// back unevaluated.
pub trait Evolvable: Chromosome {
    #[must_use]
    fn mutate(&self, rng: &mut Randomness) -> Self;

    #[must_use]
    fn crossover(&self, other: &Self, rng: &mut Randomness) -> (Self, Self);
}

/// Produces fresh random chromosomes.
pub trait ChromosomeGenerator<C> {
    fn generate(&mut self, rng: &mut Randomness) -> C;
}
