//! The NEAT search loop over [`NetworkChromosome`]s.

use async_trait::async_trait;
use log::info;

use crate::archive::Archive;
use crate::error::SearchError;
use crate::executor::Evaluator;
use crate::neat::generator::NetworkGenerator;
use crate::neat::population::NeatPopulation;
use crate::neat::properties::NeatProperties;
use crate::neat::snapshot::PopulationSnapshot;
use crate::network::NetworkChromosome;
use crate::operators::local_search::LocalSearch;
use crate::randomness::Randomness;
use crate::search::{BoxedFitness, SearchAlgorithm, SearchCore};
use crate::stopping::{SearchStatistics, StoppingCondition};

/// Neuroevolution of augmenting topologies as a search algorithm.
///
/// Every network of a generation is played once; the playthrough feeds
/// both the objective archive and the network fitness that drives
/// speciation and reproduction.
#[derive(Default)]
pub struct Neat {
    core: SearchCore<NetworkChromosome>,
    properties: NeatProperties,
    generator: Option<NetworkGenerator>,
    population: Option<NeatPopulation>,
    resume_from: Option<PopulationSnapshot>,
}

impl Neat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Population of the last run, if any.
    #[must_use]
    pub fn population(&self) -> Option<&NeatPopulation> {
        self.population.as_ref()
    }

    /// Capture the last run's population for a later [`resume_from`].
    ///
    /// [`resume_from`]: Self::resume_from
    #[must_use]
    pub fn snapshot(&self) -> Option<PopulationSnapshot> {
        self.population.as_ref().map(PopulationSnapshot::capture)
    }

    /// Start the next run from `snapshot` instead of fresh networks.
    pub fn resume_from(&mut self, snapshot: PopulationSnapshot) {
        self.resume_from = Some(snapshot);
    }

    /// Evaluate the whole generation. Returns `true` once the stopping
    /// condition holds; networks after that point keep a fitness of 0.
    async fn evaluate_generation(
        &mut self,
        population: &mut NeatPopulation,
        evaluator: &mut dyn Evaluator<NetworkChromosome>,
        rng: &mut Randomness,
    ) -> bool {
        let network_fitness = self.properties.network_fitness.clone();
        for network in population.networks_mut() {
            self.core.evaluate(network, evaluator, rng).await;
            let fitness = network_fitness.assign(network);
            self.core.update_best(network, fitness);
            if self.core.is_finished() {
                return true;
            }
        }
        self.core
            .apply_local_search(population.networks_mut(), evaluator, rng)
            .await;
        for network in population.networks_mut() {
            network_fitness.assign(network);
        }
        self.core.is_finished()
    }
}

#[async_trait(?Send)]
impl SearchAlgorithm<NetworkChromosome> for Neat {
    type Properties = NeatProperties;
    type Generator = NetworkGenerator;

    fn set_properties(&mut self, properties: NeatProperties) {
        self.properties = properties;
    }

    fn set_chromosome_generator(&mut self, generator: NetworkGenerator) {
        self.generator = Some(generator);
    }

    fn set_fitness_functions(&mut self, functions: Vec<BoxedFitness<NetworkChromosome>>) {
        self.core.set_functions(functions);
    }

    fn set_stopping_condition(&mut self, condition: StoppingCondition) {
        self.core.set_stopping_condition(condition);
    }

    fn add_local_search(&mut self, operator: Box<dyn LocalSearch<NetworkChromosome>>) {
        self.core.add_local_search(operator);
    }

    async fn find_solution(
        &mut self,
        evaluator: &mut dyn Evaluator<NetworkChromosome>,
        rng: &mut Randomness,
    ) -> Result<Vec<NetworkChromosome>, SearchError> {
        self.properties.validate()?;
        self.core.start()?;
        let generator = self
            .generator
            .clone()
            .ok_or(SearchError::NotConfigured("network generator"))?;
        let mut population = match self.resume_from.take() {
            Some(snapshot) => NeatPopulation::from_snapshot(snapshot, generator, rng),
            None => NeatPopulation::generate(generator, self.properties.clone(), rng),
        };

        loop {
            let finished = self.evaluate_generation(&mut population, evaluator, rng).await;
            population.update_statistics();
            info!(
                "generation {}: {} species, best {:.3}, average {:.3}, threshold {:.2}",
                population.generation(),
                population.species().len(),
                population.best_fitness(),
                population.average_fitness(),
                population.distance_threshold()
            );
            self.core.finish_iteration("NEAT");
            if finished || self.core.is_finished() {
                break;
            }
            population.evolve(rng);
        }

        self.population = Some(population);
        Ok(self.core.solutions())
    }

    fn statistics(&self) -> &SearchStatistics {
        self.core.statistics()
    }

    fn archive(&self) -> &Archive<NetworkChromosome> {
        self.core.archive()
    }
}
