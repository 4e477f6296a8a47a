//! Random search: one fresh chromosome per iteration, no evolution.

use async_trait::async_trait;

use crate::archive::Archive;
use crate::chromosome::Chromosome;
use crate::error::SearchError;
use crate::executor::Evaluator;
use crate::operators::local_search::LocalSearch;
use crate::randomness::Randomness;
use crate::search::{BoxedFitness, BoxedGenerator, SearchAlgorithm, SearchCore, SearchProperties};
use crate::stopping::{SearchStatistics, StoppingCondition};

/// Baseline search sampling the generator until the budget runs out.
pub struct RandomSearch<C> {
    core: SearchCore<C>,
}

impl<C: Chromosome> Default for RandomSearch<C> {
    fn default() -> Self {
        Self {
            core: SearchCore::new(),
        }
    }
}

impl<C: Chromosome> RandomSearch<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl<C: Chromosome> SearchAlgorithm<C> for RandomSearch<C> {
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
        while !self.core.is_finished() {
            let mut candidate = [self.core.generate(rng)?];
            if !self
                .core
                .evaluate_population(&mut candidate, evaluator, rng)
                .await
            {
                self.core
                    .apply_local_search(&mut candidate, evaluator, rng)
                    .await;
            }
            self.core.finish_iteration("random search");
        }
        Ok(self.core.solutions())
    }

    fn statistics(&self) -> &SearchStatistics {
        self.core.statistics()
    }

    fn archive(&self) -> &Archive<C> {
        self.core.archive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstring::{BitstringChromosome, BitstringChromosomeGenerator};
    use crate::executor::DirectEvaluator;
    use crate::fitness::SingleBit;
    use crate::operators::crossover::ListCrossover;

    #[tokio::test]
    async fn test_random_search_counts_iterations() {
        let mut rng = Randomness::new(42);
        let mut search = RandomSearch::<BitstringChromosome>::new();
        search.set_chromosome_generator(Box::new(BitstringChromosomeGenerator::new(
            4,
            ListCrossover::SinglePoint,
        )));
        search.set_fitness_functions(
            SingleBit::all(4)
                .into_iter()
                .map(|f| Box::new(f) as BoxedFitness<BitstringChromosome>)
                .collect(),
        );
        search.set_stopping_condition(StoppingCondition::FixedIteration { iterations: 30 });

        let solutions = search
            .find_solution(&mut DirectEvaluator, &mut rng)
            .await
            .unwrap();
        assert_eq!(search.iterations(), 30);
        assert_eq!(search.statistics().evaluations, 30);
        assert!(!solutions.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_search_fails_fast() {
        let mut rng = Randomness::new(42);
        let mut search = RandomSearch::<BitstringChromosome>::new();
        search.set_stopping_condition(StoppingCondition::Optimal);
        let result = search.find_solution(&mut DirectEvaluator, &mut rng).await;
        assert_eq!(
            result.unwrap_err(),
            SearchError::NotConfigured("fitness functions")
        );
        assert_eq!(search.statistics().evaluations, 0);
    }
}
