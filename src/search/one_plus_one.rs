//! (1+1) evolutionary algorithm.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::archive::Archive;
use crate::chromosome::Evolvable;
use crate::error::SearchError;
use crate::executor::Evaluator;
use crate::operators::local_search::LocalSearch;
use crate::randomness::Randomness;
use crate::search::{BoxedFitness, BoxedGenerator, SearchAlgorithm, SearchCore, SearchProperties};
use crate::stopping::{SearchStatistics, StoppingCondition};

/// Keeps a single parent and replaces it with its mutant whenever the
/// mutant is at least as good on the first objective. All objectives still
/// feed the archive.
pub struct OnePlusOne<C> {
    core: SearchCore<C>,
    best: Option<C>,
}

impl<C: Evolvable> Default for OnePlusOne<C> {
    fn default() -> Self {
        Self {
            core: SearchCore::new(),
            best: None,
        }
    }
}

impl<C: Evolvable> OnePlusOne<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current parent.
    #[must_use]
    pub fn best(&self) -> Option<&C> {
        self.best.as_ref()
    }
}

#[async_trait(?Send)]
impl<C: Evolvable> SearchAlgorithm<C> for OnePlusOne<C> {
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
        let mut parent = [self.core.generate(rng)?];
        self.core
            .evaluate_population(&mut parent, evaluator, rng)
            .await;
        let [mut best] = parent;

        while !self.core.is_finished() {
            let mut offspring = [best.mutate(rng)];
            if !self
                .core
                .evaluate_population(&mut offspring, evaluator, rng)
                .await
            {
                self.core
                    .apply_local_search(&mut offspring, evaluator, rng)
                    .await;
            }
            let [mut candidate] = offspring;
            if self.core.compare_on(0, &mut candidate, &mut best) != Ordering::Less {
                best = candidate;
            }
            self.core.finish_iteration("(1+1) EA");
        }
        self.best = Some(best);
        Ok(self.core.solutions())
    }

    fn statistics(&self) -> &SearchStatistics {
        self.core.statistics()
    }

    fn archive(&self) -> &Archive<C> {
        self.core.archive()
    }
}
