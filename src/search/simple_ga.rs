//! Generational genetic algorithm with single-individual elitism.

use async_trait::async_trait;

use crate::archive::Archive;
use crate::chromosome::Evolvable;
use crate::error::SearchError;
use crate::executor::Evaluator;
use crate::operators::local_search::LocalSearch;
use crate::randomness::Randomness;
use crate::search::{
    breed, BoxedFitness, BoxedGenerator, SearchAlgorithm, SearchCore, SearchProperties,
};
use crate::stopping::{SearchStatistics, StoppingCondition};

/// Optimises the first objective; every objective feeds the archive.
///
/// Each generation keeps the best chromosome unchanged and fills the rest
/// with offspring of selected parents.
pub struct SimpleGa<C> {
    core: SearchCore<C>,
    population: Vec<C>,
}

impl<C: Evolvable> Default for SimpleGa<C> {
    fn default() -> Self {
        Self {
            core: SearchCore::new(),
            population: Vec::new(),
        }
    }
}

impl<C: Evolvable> SimpleGa<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Population of the last generation.
    #[must_use]
    pub fn population(&self) -> &[C] {
        &self.population
    }

    fn evolve(&mut self, mut population: Vec<C>, rng: &mut Randomness) -> Vec<C> {
        let scores = self.core.primary_scores(&mut population);
        let size = self.core.properties().population_size.max(1);
        let elite = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| population[index].clone());

        let mut next = Vec::with_capacity(size);
        next.extend(elite);
        let count = size - next.len();
        next.extend(breed(&population, &scores, count, self.core.properties(), rng));
        next
    }
}

#[async_trait(?Send)]
impl<C: Evolvable> SearchAlgorithm<C> for SimpleGa<C> {
    type Properties = SearchProperties;
    type Generator = BoxedGenerator<C>;

    fn set_properties(&mut self, properties: SearchProperties) {
        self.core.set_properties(properties);
    }

    fn set_chromosome_generator(&mut self, generator: BoxedGenerator<C>) {
        self.core.set_generator(generator);
    }

    fn set_fitness_functions(&mut self, functions: Vec<BoxedFitness<C>>) {
        self.core.set_functions(functions);
    }

    fn set_stopping_condition(&mut self, condition: StoppingCondition) {
        self.core.set_stopping_condition(condition);
    }

    fn add_local_search(&mut self, operator: Box<dyn LocalSearch<C>>) {
        self.core.add_local_search(operator);
    }

    async fn find_solution(
        &mut self,
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) -> Result<Vec<C>, SearchError> {
        self.core.start()?;
        let mut population = self.core.generate_population(rng)?;
        while !self.core.is_finished() {
            let finished = self
                .core
                .evaluate_population(&mut population, evaluator, rng)
                .await;
            if finished {
                self.core.finish_iteration("simple GA");
                break;
            }
            self.core
                .apply_local_search(&mut population, evaluator, rng)
                .await;
            population = self.evolve(population, rng);
            self.core.finish_iteration("simple GA");
        }
        self.population = population;
        Ok(self.core.solutions())
    }

    fn statistics(&self) -> &SearchStatistics {
        self.core.statistics()
    }

    fn archive(&self) -> &Archive<C> {
        self.core.archive()
    }
}
