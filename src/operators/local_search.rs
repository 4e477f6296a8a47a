//! Local search: post-processing of evaluated chromosomes.
//!
//! An operator is only tried on chromosomes it is applicable to, and only
//! with its configured probability. Whatever it produces is already
//! evaluated; the search keeps it only if [`LocalSearch::has_improved`].

use std::collections::HashSet;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::chromosome::{Chromosome, ChromosomeId};
use crate::error::ExecutionError;
use crate::executor::Evaluator;
use crate::randomness::Randomness;
use crate::testcase::TestChromosome;

/// Search state an operator's applicability depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSearchContext {
    /// Consumed fraction of the search budget, in `[0, 1]`.
    pub progress: f64,
    /// Iterations completed so far.
    pub iteration: usize,
    /// Objectives not covered by the archive yet.
    pub uncovered_objectives: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalSearchKind {
    Extension,
    Reduction,
}

/// Configuration of one local search operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalSearchProperties {
    #[serde(rename = "type")]
    pub kind: LocalSearchKind,
    /// Chance of running on an applicable chromosome.
    pub probability: f64,
    /// Budget fraction that must be consumed before the operator kicks in.
    #[serde(default)]
    pub resources_threshold: f64,
    /// Only run every this many iterations.
    #[serde(default = "default_generation_interval")]
    pub generation_interval: usize,
}

fn default_generation_interval() -> usize {
    1
}

/// A post-processing step for chromosomes of kind `C`.
#[async_trait(?Send)]
pub trait LocalSearch<C> {
    fn name(&self) -> &'static str;

    /// Chance of running on an applicable chromosome.
    fn probability(&self) -> f64;

    fn is_applicable(&self, chromosome: &C, context: &LocalSearchContext) -> bool;

    /// Produce an evaluated variant of `chromosome`, or `None` when there is
    /// nothing to change.
    ///
    /// # Errors
    ///
    /// Propagates failures of the re-evaluation.
    async fn apply(
        &mut self,
        chromosome: &C,
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) -> Result<Option<C>, ExecutionError>;

    fn has_improved(&self, original: &C, modified: &C) -> bool;

    /// Forget which chromosomes were already tried. Called when a run starts.
    fn reset(&mut self) {}
}

/// Shared applicability gate: budget window, interval and one attempt per
/// chromosome.
#[derive(Debug, Clone)]
struct Gate {
    probability: f64,
    resources_threshold: f64,
    generation_interval: usize,
    /// Ids already tried in this run. Grows by at most two per local search
    /// evaluation and is cleared by [`Gate::reset`].
    targeted: HashSet<ChromosomeId>,
}

impl Gate {
    fn new(properties: &LocalSearchProperties) -> Self {
        Self {
            probability: properties.probability,
            resources_threshold: properties.resources_threshold,
            generation_interval: properties.generation_interval.max(1),
            targeted: HashSet::new(),
        }
    }

    fn admits(&self, id: ChromosomeId, context: &LocalSearchContext) -> bool {
        self.resources_threshold <= context.progress
            && context.progress < 1.0
            && context.iteration % self.generation_interval == 0
            && context.uncovered_objectives > 0
            && !self.targeted.contains(&id)
    }

    fn reset(&mut self) {
        self.targeted.clear();
    }
}

/// Appends the longest possible waits to a test while they keep
/// improving coverage, to reach behaviour that only happens after time
/// passes.
#[derive(Debug, Clone)]
pub struct ExtensionLocalSearch {
    gate: Gate,
}

impl ExtensionLocalSearch {
    #[must_use]
    pub fn new(properties: &LocalSearchProperties) -> Self {
        Self {
            gate: Gate::new(properties),
        }
    }
}

#[async_trait(?Send)]
impl<C: Chromosome> LocalSearch<C> for ExtensionLocalSearch {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn probability(&self) -> f64 {
        self.gate.probability
    }

    fn is_applicable(&self, chromosome: &C, context: &LocalSearchContext) -> bool {
        self.gate.admits(chromosome.id(), context)
            && chromosome
                .trace()
                .is_some_and(|trace| trace.program_running)
    }

    async fn apply(
        &mut self,
        chromosome: &C,
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) -> Result<Option<C>, ExecutionError> {
        self.gate.targeted.insert(chromosome.id());
        let extended = evaluator.extend(chromosome, rng).await?;
        if let Some(extended) = &extended {
            self.gate.targeted.insert(extended.id());
            debug!(
                "extended {} from {} to {} codons",
                chromosome.id(),
                chromosome.length(),
                extended.length()
            );
        }
        Ok(extended)
    }

    fn has_improved(&self, original: &C, modified: &C) -> bool {
        modified.coverage().len() > original.coverage().len()
    }

    fn reset(&mut self) {
        self.gate.reset();
    }
}

/// Cuts a test after the last event that added coverage.
#[derive(Debug, Clone)]
pub struct ReductionLocalSearch {
    gate: Gate,
}

impl ReductionLocalSearch {
    #[must_use]
    pub fn new(properties: &LocalSearchProperties) -> Self {
        Self {
            gate: Gate::new(properties),
        }
    }

    /// Codons up to and including the last coverage-increasing event.
    fn reduced_length(chromosome: &TestChromosome) -> Option<usize> {
        let trace = chromosome.trace()?;
        let last = trace.last_improving_event()?;
        let end = trace.events[last].codon_end;
        (end < chromosome.length()).then_some(end)
    }
}

#[async_trait(?Send)]
impl LocalSearch<TestChromosome> for ReductionLocalSearch {
    fn name(&self) -> &'static str {
        "reduction"
    }

    fn probability(&self) -> f64 {
        self.gate.probability
    }

    fn is_applicable(&self, chromosome: &TestChromosome, context: &LocalSearchContext) -> bool {
        self.gate.admits(chromosome.id(), context) && Self::reduced_length(chromosome).is_some()
    }

    async fn apply(
        &mut self,
        chromosome: &TestChromosome,
        evaluator: &mut dyn Evaluator<TestChromosome>,
        rng: &mut Randomness,
    ) -> Result<Option<TestChromosome>, ExecutionError> {
        self.gate.targeted.insert(chromosome.id());
        let Some(length) = Self::reduced_length(chromosome) else {
            return Ok(None);
        };
        let mut reduced = chromosome.clone_with(chromosome.codons()[..length].to_vec());
        evaluator.evaluate(&mut reduced, rng).await?;
        self.gate.targeted.insert(reduced.id());
        debug!(
            "reduced {} from {} to {} codons",
            chromosome.id(),
            chromosome.length(),
            reduced.length()
        );
        Ok(Some(reduced))
    }

    fn has_improved(&self, original: &TestChromosome, modified: &TestChromosome) -> bool {
        modified.length() < original.length()
            && modified.coverage().is_superset(&original.coverage())
    }

    fn reset(&mut self) {
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::executor::DirectEvaluator;
    use crate::operators::crossover::ListCrossover;
    use crate::operators::mutation::VariableLengthMutation;
    use crate::trace::ExecutionTrace;

    fn properties(kind: LocalSearchKind) -> LocalSearchProperties {
        LocalSearchProperties {
            kind,
            probability: 1.0,
            resources_threshold: 0.5,
            generation_interval: 2,
        }
    }

    fn context(progress: f64, iteration: usize) -> LocalSearchContext {
        LocalSearchContext {
            progress,
            iteration,
            uncovered_objectives: 3,
        }
    }

    fn evaluated_test(codons: Vec<i64>, covered_after: &[usize], running: bool) -> TestChromosome {
        let mut test = TestChromosome::new(
            codons,
            VariableLengthMutation::new(0, 10, 20, 5.0),
            ListCrossover::SinglePoint,
        );
        let mut trace = ExecutionTrace::new();
        for (index, &covered) in covered_after.iter().enumerate() {
            let coverage = (0..covered).map(|i| format!("block-{i}")).collect();
            trace.record(Event::wait(), vec![1.0], 2 * (index + 1), coverage);
        }
        trace.program_running = running;
        test.evaluation_mut().complete(trace);
        test
    }

    #[test]
    fn test_gate_respects_budget_and_interval() {
        let search = ExtensionLocalSearch::new(&properties(LocalSearchKind::Extension));
        let test = evaluated_test(vec![0, 1, 0, 1], &[1, 2], true);
        let applicable = |ctx: LocalSearchContext| LocalSearch::<TestChromosome>::is_applicable(&search, &test, &ctx);

        assert!(applicable(context(0.6, 4)));
        assert!(!applicable(context(0.4, 4)));
        assert!(!applicable(context(0.6, 3)));
        assert!(!applicable(context(1.0, 4)));
        assert!(!applicable(LocalSearchContext {
            uncovered_objectives: 0,
            ..context(0.6, 4)
        }));
    }

    #[test]
    fn test_extension_needs_running_program() {
        let search = ExtensionLocalSearch::new(&properties(LocalSearchKind::Extension));
        let stopped = evaluated_test(vec![0, 1], &[1], false);
        assert!(!LocalSearch::<TestChromosome>::is_applicable(
            &search,
            &stopped,
            &context(0.6, 2)
        ));
    }

    #[test]
    fn test_reduction_cuts_after_last_improvement() {
        let test = evaluated_test(vec![0, 1, 0, 1, 0, 1], &[1, 2, 2], true);
        assert_eq!(ReductionLocalSearch::reduced_length(&test), Some(4));

        let search = ReductionLocalSearch::new(&properties(LocalSearchKind::Reduction));
        assert!(search.is_applicable(&test, &context(0.6, 0)));

        let nothing_to_cut = evaluated_test(vec![0, 1, 0, 1], &[1, 2], true);
        assert!(!search.is_applicable(&nothing_to_cut, &context(0.6, 0)));
    }

    #[test]
    fn test_reduction_improvement_requires_same_coverage() {
        let search = ReductionLocalSearch::new(&properties(LocalSearchKind::Reduction));
        let original = evaluated_test(vec![0, 1, 0, 1, 0, 1], &[1, 2, 2], true);
        let shorter = evaluated_test(vec![0, 1, 0, 1], &[1, 2], true);
        let lossy = evaluated_test(vec![0, 1], &[1], true);
        assert!(search.has_improved(&original, &shorter));
        assert!(!search.has_improved(&original, &lossy));
    }

    #[tokio::test]
    async fn test_each_chromosome_is_tried_once_per_run() {
        let mut search = ReductionLocalSearch::new(&properties(LocalSearchKind::Reduction));
        let test = evaluated_test(vec![0, 1, 0, 1, 0, 1], &[1, 2, 2], true);
        let mut rng = Randomness::new(4);

        let reduced = search
            .apply(&test, &mut DirectEvaluator, &mut rng)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reduced.length(), 4);
        assert!(!search.is_applicable(&test, &context(0.6, 0)));

        search.reset();
        assert!(search.is_applicable(&test, &context(0.6, 0)));
    }
}
