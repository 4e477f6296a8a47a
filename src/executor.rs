//! Playthroughs: driving the program-under-test with a chromosome.
//!
//! An [`Evaluator`] runs one chromosome against the program and stores the
//! completed trace on it. Test chromosomes are decoded codon by codon by a
//! [`TestExecutor`]; networks play by reading the program's features at
//! every step in a [`NetworkExecutor`]. Synthetic chromosomes that never
//! touch a program use the [`DirectEvaluator`].
//!
//! Only one playthrough is ever in flight. A playthrough that fails leaves
//! the chromosome untouched; the caller decides how to record the failure.

use std::collections::HashSet;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::chromosome::Chromosome;
use crate::error::ExecutionError;
use crate::evaluator::NetworkEvaluator;
use crate::event::{Event, EventBounds};
use crate::extractor::EventExtractor;
use crate::network::NetworkChromosome;
use crate::program::ProgramUnderTest;
use crate::randomness::Randomness;
use crate::testcase::TestChromosome;
use crate::trace::ExecutionTrace;

/// Consecutive waits without progress after which an extension stops.
pub const MAX_STAGNANT_EXTENSIONS: usize = 3;

/// Runs chromosomes of kind `C`.
#[async_trait(?Send)]
pub trait Evaluator<C> {
    /// Run one playthrough of `chromosome` and store its trace on it.
    /// Returns the number of executed events.
    ///
    /// # Errors
    ///
    /// Returns the program's [`ExecutionError`]; the chromosome's
    /// evaluation is left unchanged in that case.
    async fn evaluate(&mut self, chromosome: &mut C, rng: &mut Randomness)
        -> Result<usize, ExecutionError>;

    /// Replay `chromosome` and keep appending the longest possible wait
    /// while the program runs and coverage keeps improving. The result is
    /// already evaluated. `None` if this kind of chromosome cannot grow.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    async fn extend(
        &mut self,
        _chromosome: &C,
        _rng: &mut Randomness,
    ) -> Result<Option<C>, ExecutionError> {
        Ok(None)
    }
}

/// Evaluator for chromosomes whose fitness depends on their genes alone,
/// such as bitstrings. Completes an empty trace without running anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectEvaluator;

#[async_trait(?Send)]
impl<C: Chromosome> Evaluator<C> for DirectEvaluator {
    async fn evaluate(
        &mut self,
        chromosome: &mut C,
        _rng: &mut Randomness,
    ) -> Result<usize, ExecutionError> {
        chromosome.evaluation_mut().complete(ExecutionTrace::new());
        Ok(0)
    }
}

/// How a codon picks one of the currently available events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EventSelector {
    /// `codon mod |events|`.
    #[default]
    Interleaving,
    /// The codon range is split into `|events|` equally wide clusters.
    Clustering,
}

impl EventSelector {
    /// Index of the event selected by `codon` among `count` events, for
    /// codons drawn from `[range.0, range.1)`.
    #[must_use]
    pub fn select(self, codon: i64, count: usize, range: (i64, i64)) -> usize {
        if count == 0 {
            return 0;
        }
        match self {
            Self::Interleaving => codon.rem_euclid(count as i64) as usize,
            Self::Clustering => {
                let (min, max) = range;
                let width = (max - min).max(1);
                let offset = (codon - min).clamp(0, width - 1);
                let index = i128::from(offset) * count as i128 / i128::from(width);
                (index as usize).min(count - 1)
            }
        }
    }

    /// Smallest codon selecting `index` among `count` events. With more
    /// events than codons, clustering cannot reach every index.
    #[must_use]
    pub fn codon_for(self, index: usize, count: usize, range: (i64, i64)) -> i64 {
        match self {
            Self::Interleaving => index as i64,
            Self::Clustering => {
                let (min, max) = range;
                let width = i128::from((max - min).max(1));
                let count = count.max(1) as i128;
                let offset = (index as i128 * width + count - 1) / count;
                min + offset as i64
            }
        }
    }
}

/// How a network picks its next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EventSelection {
    /// The available event with the highest classification probability;
    /// parameters from the regression outputs.
    #[default]
    Activation,
    /// A uniformly random available event with random parameters. Used to
    /// compare networks against random play.
    Random,
}

/// Fill in the end-of-playthrough fields of `trace`.
fn finish_trace<P: ProgramUnderTest + ?Sized>(
    program: &P,
    extractor: &EventExtractor,
    trace: &mut ExecutionTrace,
    rng: &mut Randomness,
) {
    trace.coverage = program.coverage();
    trace.branch_distances = program.branch_distances();
    trace.final_events = extractor.extract_or_wait(program.state(), rng);
    trace.program_running = program.is_running();
    trace.steps = program.current_step();
    trace.score = program.score();
}

/// Decodes test chromosomes against the live event set.
///
/// At every step the extractor proposes the applicable events, one codon
/// selects among them and the following codons become the event's
/// parameters.
#[derive(Debug)]
pub struct TestExecutor<P> {
    program: P,
    extractor: EventExtractor,
    selector: EventSelector,
    codon_range: (i64, i64),
}

impl<P: ProgramUnderTest> TestExecutor<P> {
    #[must_use]
    pub fn new(
        program: P,
        extractor: EventExtractor,
        selector: EventSelector,
        codon_range: (i64, i64),
    ) -> Self {
        Self {
            program,
            extractor,
            selector,
            codon_range,
        }
    }

    #[must_use]
    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    #[must_use]
    pub fn extractor(&self) -> &EventExtractor {
        &self.extractor
    }

    /// Reset the program and apply every codon of `codons`.
    async fn replay(
        &mut self,
        codons: &[i64],
        rng: &mut Randomness,
    ) -> Result<ExecutionTrace, ExecutionError> {
        self.program.reset().await?;
        let mut trace = ExecutionTrace::new();
        let mut position = 0;
        while position < codons.len() {
            let events = self.extractor.extract_or_wait(self.program.state(), rng);
            position = self.step(&events, codons, position, &mut trace).await?;
        }
        Ok(trace)
    }

    /// Decode the event starting at `position` and apply it. Returns the
    /// position of the next event codon.
    async fn step(
        &mut self,
        events: &[Event],
        codons: &[i64],
        position: usize,
        trace: &mut ExecutionTrace,
    ) -> Result<usize, ExecutionError> {
        let index = self
            .selector
            .select(codons[position], events.len(), self.codon_range);
        let mut event = events.get(index).cloned().unwrap_or_else(Event::wait);
        let parameters: Vec<f64> = codons[position + 1..]
            .iter()
            .take(event.num_parameters())
            .map(|&codon| codon as f64)
            .collect();
        let end = position + 1 + parameters.len();
        event.set_parameters(&parameters, self.extractor.bounds());

        self.program.apply_event(&event).await?;
        trace.record(event, parameters, end, self.program.coverage());
        Ok(end)
    }

    /// Coverage size and total branch distance; larger coverage first,
    /// then smaller distance.
    fn progress(&self) -> (usize, f64) {
        let distance = self.program.branch_distances().values().sum();
        (self.program.coverage().len(), distance)
    }
}

fn improves(current: (usize, f64), best: (usize, f64)) -> bool {
    current.0 > best.0 || (current.0 == best.0 && current.1 < best.1)
}

#[async_trait(?Send)]
impl<P: ProgramUnderTest> Evaluator<TestChromosome> for TestExecutor<P> {
    async fn evaluate(
        &mut self,
        chromosome: &mut TestChromosome,
        rng: &mut Randomness,
    ) -> Result<usize, ExecutionError> {
        let mut trace = self.replay(chromosome.codons(), rng).await?;
        finish_trace(&self.program, &self.extractor, &mut trace, rng);
        let executed = trace.len();
        chromosome.evaluation_mut().complete(trace);
        Ok(executed)
    }

    async fn extend(
        &mut self,
        chromosome: &TestChromosome,
        rng: &mut Randomness,
    ) -> Result<Option<TestChromosome>, ExecutionError> {
        let mut codons = chromosome.codons().to_vec();
        let mut trace = self.replay(&codons, rng).await?;
        let longest_wait = i64::from(self.extractor.bounds().wait_step_upper_bound) - 1;

        let mut best = self.progress();
        let mut stagnant = 0;
        while codons.len() + 2 <= chromosome.max_length()
            && self.program.is_running()
            && stagnant < MAX_STAGNANT_EXTENSIONS
        {
            let events = self.extractor.extract_or_wait(self.program.state(), rng);
            let Some(wait) = events.iter().position(|e| matches!(e, Event::Wait { .. })) else {
                break;
            };
            let position = codons.len();
            codons.push(self.selector.codon_for(wait, events.len(), self.codon_range));
            codons.push(longest_wait.max(0));
            self.step(&events, &codons, position, &mut trace).await?;

            let current = self.progress();
            if improves(current, best) {
                best = current;
                stagnant = 0;
            } else {
                stagnant += 1;
            }
        }

        finish_trace(&self.program, &self.extractor, &mut trace, rng);
        let mut extended = chromosome.clone_with(codons);
        extended.evaluation_mut().complete(trace);
        Ok(Some(extended))
    }
}

/// Lets networks play: at every step the program's features are fed
/// through the network and its outputs pick the next event.
#[derive(Debug)]
pub struct NetworkExecutor<P> {
    program: P,
    extractor: EventExtractor,
    selection: EventSelection,
    /// Simulated steps after which a playthrough ends.
    timeout: u64,
}

impl<P: ProgramUnderTest> NetworkExecutor<P> {
    #[must_use]
    pub fn new(
        program: P,
        extractor: EventExtractor,
        selection: EventSelection,
        timeout: u64,
    ) -> Self {
        Self {
            program,
            extractor,
            selection,
            timeout,
        }
    }

    #[must_use]
    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    fn choose_event(
        &self,
        evaluator: &NetworkEvaluator,
        outputs: &[f64],
        events: &[Event],
        rng: &mut Randomness,
    ) -> Event {
        if self.selection == EventSelection::Activation {
            let available: HashSet<String> = events.iter().map(Event::identifier).collect();
            let probabilities =
                evaluator.event_probabilities(outputs, |id| available.contains(id));
            let chosen = probabilities
                .iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .and_then(|(id, _)| events.iter().find(|e| e.identifier() == *id));
            if let Some(event) = chosen {
                return event.clone();
            }
        }
        rng.pick(events).cloned().unwrap_or_else(Event::wait)
    }

    fn parameters(
        &self,
        evaluator: &NetworkEvaluator,
        outputs: &[f64],
        event: &Event,
        bounds: &EventBounds,
        rng: &mut Randomness,
    ) -> Vec<f64> {
        let identifier = event.identifier();
        (0..event.num_parameters())
            .map(|index| {
                let scale = event.parameter_scale(index, bounds);
                let regression = match self.selection {
                    EventSelection::Activation => {
                        evaluator.regression_output(outputs, &identifier, index)
                    }
                    EventSelection::Random => None,
                };
                regression.map_or_else(|| rng.next_double_between(0.0, scale), |v| v * scale)
            })
            .collect()
    }
}

#[async_trait(?Send)]
impl<P: ProgramUnderTest> Evaluator<NetworkChromosome> for NetworkExecutor<P> {
    async fn evaluate(
        &mut self,
        network: &mut NetworkChromosome,
        rng: &mut Randomness,
    ) -> Result<usize, ExecutionError> {
        let mut evaluator = NetworkEvaluator::try_new(network)
            .or_else(|_| {
                network.mark_recurrent_cycles();
                NetworkEvaluator::try_new(network)
            })
            .map_err(|err| ExecutionError::Crashed(err.to_string()))?;

        self.program.reset().await?;
        let bounds = *self.extractor.bounds();
        let mut trace = ExecutionTrace::new();
        while self.program.is_running() && self.program.current_step() < self.timeout {
            let events = self.extractor.extract_or_wait(self.program.state(), rng);
            let outputs = evaluator.activate(&self.program.input_features());
            let mut event = self.choose_event(&evaluator, &outputs, &events, rng);
            let parameters = self.parameters(&evaluator, &outputs, &event, &bounds, rng);
            event.set_parameters(&parameters, &bounds);

            let before = self.program.current_step();
            self.program.apply_event(&event).await?;
            let codon_end = trace.len() + 1;
            trace.record(event, parameters, codon_end, self.program.coverage());
            if self.program.current_step() <= before {
                warn!("program did not advance after an event; ending playthrough of {}", network.id());
                break;
            }
        }

        finish_trace(&self.program, &self.extractor, &mut trace, rng);
        let executed = trace.len();
        network.evaluation_mut().complete(trace);
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaving_wraps_codons() {
        let selector = EventSelector::Interleaving;
        assert_eq!(selector.select(7, 3, (0, 100)), 1);
        assert_eq!(selector.select(-1, 3, (0, 100)), 2);
        assert_eq!(selector.select(5, 0, (0, 100)), 0);
    }

    #[test]
    fn test_clustering_partitions_range() {
        let selector = EventSelector::Clustering;
        assert_eq!(selector.select(0, 2, (0, 10)), 0);
        assert_eq!(selector.select(4, 2, (0, 10)), 0);
        assert_eq!(selector.select(5, 2, (0, 10)), 1);
        assert_eq!(selector.select(99, 2, (0, 10)), 1);
    }

    #[test]
    fn test_codon_for_selects_index() {
        for selector in [EventSelector::Interleaving, EventSelector::Clustering] {
            for count in 1..7 {
                for index in 0..count {
                    let codon = selector.codon_for(index, count, (0, 42));
                    assert_eq!(selector.select(codon, count, (0, 42)), index, "{selector:?}");
                }
            }
        }
    }

    #[test]
    fn test_improves_prefers_coverage_then_distance() {
        assert!(improves((3, 9.0), (2, 0.0)));
        assert!(improves((2, 0.5), (2, 1.0)));
        assert!(!improves((2, 1.0), (2, 1.0)));
    }
}
