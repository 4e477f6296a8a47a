//! Search algorithms and the loop they share.
//!
//! Every algorithm is configured through [`SearchAlgorithm`] and then runs
//! the same skeleton: generate a population, evaluate each candidate
//! (checking the stopping condition after every single evaluation), update
//! the archive, evolve, count the iteration. [`SearchCore`] owns the shared
//! state and implements the evaluate-and-archive half of that loop.

mod mosa;
mod one_plus_one;
mod random;
mod simple_ga;

pub use mosa::Mosa;
pub use one_plus_one::OnePlusOne;
pub use random::RandomSearch;
pub use simple_ga::SimpleGa;

use std::cmp::Ordering;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::chromosome::{Chromosome, ChromosomeGenerator, Evolvable};
use crate::error::SearchError;
use crate::executor::Evaluator;
use crate::fitness::{get_fitness, is_covered, FitnessFunction};
use crate::operators::local_search::{LocalSearch, LocalSearchContext};
use crate::operators::selection::Selection;
use crate::randomness::Randomness;
use crate::stopping::{SearchStatistics, StoppingCondition};
use crate::trace::ExecutionTrace;

pub type BoxedGenerator<C> = Box<dyn ChromosomeGenerator<C>>;
pub type BoxedFitness<C> = Box<dyn FitnessFunction<C>>;

/// Hyperparameters of the list-based algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SearchProperties {
    pub population_size: usize,
    pub crossover_probability: f64,
    pub mutation_probability: f64,
    pub selection: Selection,
}

impl Default for SearchProperties {
    fn default() -> Self {
        Self {
            population_size: 50,
            crossover_probability: 0.8,
            mutation_probability: 1.0,
            selection: Selection::default(),
        }
    }
}

/// A configurable search producing chromosomes of kind `C`.
#[async_trait(?Send)]
pub trait SearchAlgorithm<C: Chromosome> {
    type Properties;
    type Generator;

    fn set_properties(&mut self, properties: Self::Properties);

    fn set_chromosome_generator(&mut self, generator: Self::Generator);

    fn set_fitness_functions(&mut self, functions: Vec<BoxedFitness<C>>);

    fn set_stopping_condition(&mut self, condition: StoppingCondition);

    fn add_local_search(&mut self, operator: Box<dyn LocalSearch<C>>);

    /// Run until the stopping condition holds and return the distinct
    /// archived solutions.
    ///
    /// # Errors
    ///
    /// Fails before any evaluation if the search is not fully configured.
    /// Failing playthroughs are logged and scored worst, never returned.
    async fn find_solution(
        &mut self,
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) -> Result<Vec<C>, SearchError>;

    fn statistics(&self) -> &SearchStatistics;

    fn archive(&self) -> &Archive<C>;

    fn iterations(&self) -> usize {
        self.statistics().iterations
    }
}

/// State shared by all algorithms: configuration, archive and statistics.
pub struct SearchCore<C> {
    properties: SearchProperties,
    generator: Option<BoxedGenerator<C>>,
    functions: Vec<BoxedFitness<C>>,
    stopping: Option<StoppingCondition>,
    local_search: Vec<Box<dyn LocalSearch<C>>>,
    archive: Archive<C>,
    statistics: SearchStatistics,
}

impl<C: Chromosome> Default for SearchCore<C> {
    fn default() -> Self {
        Self {
            properties: SearchProperties::default(),
            generator: None,
            functions: Vec::new(),
            stopping: None,
            local_search: Vec::new(),
            archive: Archive::new(),
            statistics: SearchStatistics::default(),
        }
    }
}

impl<C: Chromosome> SearchCore<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn properties(&self) -> &SearchProperties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: SearchProperties) {
        self.properties = properties;
    }

    pub fn set_generator(&mut self, generator: BoxedGenerator<C>) {
        self.generator = Some(generator);
    }

    pub fn set_functions(&mut self, functions: Vec<BoxedFitness<C>>) {
        self.functions = functions;
    }

    #[must_use]
    pub fn functions(&self) -> &[BoxedFitness<C>] {
        &self.functions
    }

    pub fn set_stopping_condition(&mut self, condition: StoppingCondition) {
        self.stopping = Some(condition);
    }

    pub fn add_local_search(&mut self, operator: Box<dyn LocalSearch<C>>) {
        self.local_search.push(operator);
    }

    #[must_use]
    pub fn archive(&self) -> &Archive<C> {
        &self.archive
    }

    #[must_use]
    pub fn statistics(&self) -> &SearchStatistics {
        &self.statistics
    }

    /// Check the configuration and reset archive, statistics and local
    /// search operators for a new run.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotConfigured`] if fitness functions or the stopping
    /// condition are missing.
    pub fn start(&mut self) -> Result<(), SearchError> {
        if self.functions.is_empty() {
            return Err(SearchError::NotConfigured("fitness functions"));
        }
        if self.stopping.is_none() {
            return Err(SearchError::NotConfigured("stopping condition"));
        }
        self.archive.clear();
        self.statistics.start(self.functions.len());
        for operator in &mut self.local_search {
            operator.reset();
        }
        Ok(())
    }

    /// A fresh chromosome from the configured generator.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotConfigured`] without a generator.
    pub fn generate(&mut self, rng: &mut Randomness) -> Result<C, SearchError> {
        self.generator
            .as_mut()
            .map(|generator| generator.generate(rng))
            .ok_or(SearchError::NotConfigured("chromosome generator"))
    }

    /// `population_size` fresh chromosomes.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub fn generate_population(&mut self, rng: &mut Randomness) -> Result<Vec<C>, SearchError> {
        (0..self.properties.population_size.max(1))
            .map(|_| self.generate(rng))
            .collect()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stopping
            .as_ref()
            .is_some_and(|condition| condition.is_finished(&self.statistics))
    }

    /// Consumed fraction of the budget.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.stopping
            .as_ref()
            .map_or(0.0, |condition| condition.progress(&self.statistics))
    }

    /// Run one playthrough and archive the result. A failing playthrough is
    /// logged and recorded as failed, so it scores worst everywhere.
    pub async fn evaluate(
        &mut self,
        chromosome: &mut C,
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) {
        match evaluator.evaluate(chromosome, rng).await {
            Ok(executed) => self.statistics.executed_events += executed,
            Err(err) => {
                warn!("evaluation of {} failed: {err}", chromosome.id());
                chromosome.evaluation_mut().fail();
            }
        }
        self.statistics.evaluations += 1;
        self.record(chromosome);
    }

    /// Offer an evaluated chromosome to the archive.
    pub fn record(&mut self, chromosome: &mut C) {
        self.archive.update(chromosome, &self.functions);
        self.statistics.set_covered(self.archive.len());
    }

    /// Keep `chromosome` in the best-individual slot if `score` is a new
    /// maximum.
    pub fn update_best(&mut self, chromosome: &C, score: f64) {
        if self.archive.update_best(chromosome, score) {
            self.statistics.best_fitness = Some(score);
        }
    }

    /// Evaluate every chromosome that has not been evaluated yet, in order.
    /// Returns `true` as soon as the stopping condition holds; the remaining
    /// chromosomes are left unevaluated.
    pub async fn evaluate_population(
        &mut self,
        population: &mut [C],
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) -> bool {
        for chromosome in population.iter_mut() {
            if !chromosome.evaluation().is_evaluated() {
                self.evaluate(chromosome, evaluator, rng).await;
                let score = self.scalar_fitness(chromosome);
                self.update_best(chromosome, score);
            }
            if self.is_finished() {
                return true;
            }
        }
        false
    }

    /// Try every local search operator on every chromosome; improvements
    /// replace the chromosome in place.
    pub async fn apply_local_search(
        &mut self,
        population: &mut [C],
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) {
        if self.local_search.is_empty() {
            return;
        }
        for chromosome in population.iter_mut() {
            for index in 0..self.local_search.len() {
                if self.is_finished() {
                    return;
                }
                let context = LocalSearchContext {
                    progress: self.progress(),
                    iteration: self.statistics.iterations,
                    uncovered_objectives: self.functions.len().saturating_sub(self.archive.len()),
                };
                let operator = &self.local_search[index];
                if !operator.is_applicable(chromosome, &context)
                    || !rng.chance(operator.probability())
                {
                    continue;
                }
                let result = self.local_search[index]
                    .apply(chromosome, evaluator, rng)
                    .await;
                let mut modified = match result {
                    Ok(Some(modified)) => modified,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("local search on {} failed: {err}", chromosome.id());
                        continue;
                    }
                };
                self.statistics.evaluations += 1;
                self.statistics.executed_events +=
                    modified.trace().map_or(0, ExecutionTrace::len);
                self.record(&mut modified);
                if self.local_search[index].has_improved(chromosome, &modified) {
                    *chromosome = modified;
                }
            }
        }
    }

    /// Count a finished iteration and report progress.
    pub fn finish_iteration(&mut self, algorithm: &str) {
        self.statistics.iterations += 1;
        let statistics = &self.statistics;
        info!(
            "{algorithm} iteration {}: {}/{} objectives covered, {} evaluations, best fitness {:?}",
            statistics.iterations,
            statistics.covered_objectives,
            statistics.total_objectives,
            statistics.evaluations,
            statistics.best_fitness
        );
    }

    /// Distinct archived solutions, plus the best individual if no
    /// objective archived it.
    #[must_use]
    pub fn solutions(&self) -> Vec<C> {
        let mut solutions = self.archive.distinct_values();
        if let Some(best) = self.archive.best() {
            if solutions.iter().all(|s| s.id() != best.id()) {
                solutions.push(best.clone());
            }
        }
        solutions
    }

    /// Compare two chromosomes on objective `index`; `Greater` means `a`
    /// is better.
    pub fn compare_on(&self, index: usize, a: &mut C, b: &mut C) -> Ordering {
        let function = self.functions[index].as_ref();
        let (va, vb) = (get_fitness(a, function), get_fitness(b, function));
        function.compare(va, vb)
    }

    /// One number per chromosome, larger is better: the oriented fitness
    /// for a single objective, the number of covered objectives otherwise.
    pub fn scalar_fitness(&self, chromosome: &mut C) -> f64 {
        match self.functions.as_slice() {
            [function] => {
                let value = get_fitness(chromosome, function.as_ref());
                oriented(function.as_ref(), value)
            }
            functions => functions
                .iter()
                .filter(|function| is_covered(chromosome, function.as_ref()))
                .count() as f64,
        }
    }

    /// Rank-based selection scores on the first objective: the worst
    /// chromosome scores 0, the best `len - 1`.
    pub fn primary_scores(&self, population: &mut [C]) -> Vec<f64> {
        let Some(function) = self.functions.first() else {
            return vec![0.0; population.len()];
        };
        let values: Vec<f64> = population
            .iter_mut()
            .map(|chromosome| get_fitness(chromosome, function.as_ref()))
            .collect();
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| function.compare(values[a], values[b]));
        let mut scores = vec![0.0; values.len()];
        for (rank, index) in order.into_iter().enumerate() {
            scores[index] = rank as f64;
        }
        scores
    }
}

/// Map a fitness value onto "larger is better".
fn oriented<C>(function: &dyn FitnessFunction<C>, value: f64) -> f64 {
    match function.compare(1.0, 0.0) {
        Ordering::Less => -value,
        _ => value,
    }
}

/// Breed `count` offspring from `population` with the chromosomes' own
/// operators. Unchanged copies keep their evaluation.
pub(crate) fn breed<C: Evolvable>(
    population: &[C],
    scores: &[f64],
    count: usize,
    properties: &SearchProperties,
    rng: &mut Randomness,
) -> Vec<C> {
    let mut offspring = Vec::with_capacity(count);
    while offspring.len() < count {
        let (Some(first), Some(second)) = (
            properties.selection.select(population, scores, rng),
            properties.selection.select(population, scores, rng),
        ) else {
            break;
        };
        let (mut a, mut b) = if rng.chance(properties.crossover_probability) {
            first.crossover(second, rng)
        } else {
            (first.clone(), second.clone())
        };
        if rng.chance(properties.mutation_probability) {
            a = a.mutate(rng);
        }
        if rng.chance(properties.mutation_probability) {
            b = b.mutate(rng);
        }
        offspring.push(a);
        if offspring.len() < count {
            offspring.push(b);
        }
    }
    offspring
}
