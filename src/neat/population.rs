//! NEAT population: speciation and reproduction.
//!
//! One generation runs through evaluate, [`update_statistics`], and
//! [`evolve`]. Evaluation happens outside this module; the population only
//! reads each network's `network_fitness`.
//!
//! [`update_statistics`]: NeatPopulation::update_statistics
//! [`evolve`]: NeatPopulation::evolve

use log::debug;

use crate::chromosome::ChromosomeGenerator;
use crate::innovation::InnovationTracker;
use crate::neat::crossover::NeatCrossover;
use crate::neat::generator::NetworkGenerator;
use crate::neat::mutation::NeatMutation;
use crate::neat::properties::{NeatProperties, PopulationType};
use crate::neat::snapshot::PopulationSnapshot;
use crate::neat::species::Species;
use crate::network::NetworkChromosome;
use crate::randomness::Randomness;

/// Amount the compatibility threshold moves per generation, and its floor.
const THRESHOLD_STEP: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct NeatPopulation {
    networks: Vec<NetworkChromosome>,
    species: Vec<Species>,
    properties: NeatProperties,
    mutation: NeatMutation,
    crossover: NeatCrossover,
    generator: NetworkGenerator,
    tracker: InnovationTracker,
    distance_threshold: f64,
    generation: usize,
    next_species_id: u32,
    /// Best network of the last evaluated generation.
    champion: Option<NetworkChromosome>,
    /// Highest network fitness ever seen.
    best_fitness: f64,
    /// Generations since `best_fitness` last rose.
    generations_without_improvement: usize,
    average_fitness: f64,
}

impl NeatPopulation {
    /// A fresh population of `population_size` generated networks.
    pub fn generate(
        mut generator: NetworkGenerator,
        properties: NeatProperties,
        rng: &mut Randomness,
    ) -> Self {
        let networks = (0..properties.population_size)
            .map(|_| generator.generate(rng))
            .collect();
        Self::with_networks(networks, generator, properties, rng)
    }

    /// Continue evolving existing networks, e.g. from a snapshot.
    pub fn with_networks(
        networks: Vec<NetworkChromosome>,
        generator: NetworkGenerator,
        properties: NeatProperties,
        rng: &mut Randomness,
    ) -> Self {
        let tracker = InnovationTracker::seeded_from(&networks);
        let mut population = Self::assemble(networks, generator, properties, tracker);
        population.speciate(rng);
        population
    }

    /// Continue from a snapshot. Innovation counters continue where the
    /// snapshot left off; species are rebuilt by a fresh speciation.
    pub fn from_snapshot(
        snapshot: PopulationSnapshot,
        generator: NetworkGenerator,
        rng: &mut Randomness,
    ) -> Self {
        let mut tracker = snapshot.tracker;
        for network in &snapshot.networks {
            tracker.observe(network);
        }
        let mut population =
            Self::assemble(snapshot.networks, generator, snapshot.properties, tracker);
        population.generation = snapshot.generation;
        population.distance_threshold = snapshot.distance_threshold;
        population.best_fitness = snapshot.best_fitness;
        population.speciate(rng);
        population
    }

    fn assemble(
        networks: Vec<NetworkChromosome>,
        generator: NetworkGenerator,
        properties: NeatProperties,
        tracker: InnovationTracker,
    ) -> Self {
        Self {
            networks,
            species: Vec::new(),
            mutation: NeatMutation::new(properties.mutation.clone()),
            crossover: NeatCrossover::new(properties.crossover.clone()),
            distance_threshold: properties.compatibility.distance_threshold,
            properties,
            generator,
            tracker,
            generation: 0,
            next_species_id: 0,
            champion: None,
            best_fitness: 0.0,
            generations_without_improvement: 0,
            average_fitness: 0.0,
        }
    }

    #[must_use]
    pub fn networks(&self) -> &[NetworkChromosome] {
        &self.networks
    }

    pub fn networks_mut(&mut self) -> &mut [NetworkChromosome] {
        &mut self.networks
    }

    #[must_use]
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    #[must_use]
    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    #[must_use]
    pub fn champion(&self) -> Option<&NetworkChromosome> {
        self.champion.as_ref()
    }

    #[must_use]
    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    #[must_use]
    pub fn average_fitness(&self) -> f64 {
        self.average_fitness
    }

    #[must_use]
    pub fn generations_without_improvement(&self) -> usize {
        self.generations_without_improvement
    }

    #[must_use]
    pub fn properties(&self) -> &NeatProperties {
        &self.properties
    }

    #[must_use]
    pub fn tracker(&self) -> &InnovationTracker {
        &self.tracker
    }

    /// Assign every network to the first species whose representative is
    /// within the distance threshold, founding new species as needed, then
    /// steer the threshold towards the target species count.
    pub fn speciate(&mut self, rng: &mut Randomness) {
        for species in &mut self.species {
            species.members.clear();
        }
        let coefficients = &self.properties.compatibility;
        for (index, network) in self.networks.iter_mut().enumerate() {
            let compatible = self.species.iter_mut().find(|species| {
                network.compatibility_distance(&species.representative, coefficients)
                    < self.distance_threshold
            });
            match compatible {
                Some(species) => {
                    species.members.push(index);
                    network.species = Some(species.id);
                }
                None => {
                    let id = self.next_species_id;
                    self.next_species_id += 1;
                    let mut species = Species::new(id, network.clone());
                    species.members.push(index);
                    network.species = Some(id);
                    self.species.push(species);
                }
            }
        }
        self.species.retain(|species| !species.is_empty());

        for species in &mut self.species {
            if let Some(&member) = rng.pick(&species.members) {
                species.representative = self.networks[member].clone();
            }
        }

        let previous = self.distance_threshold;
        let target = self.properties.number_of_species;
        if self.species.len() < target {
            self.distance_threshold -= THRESHOLD_STEP;
        } else if self.species.len() > target {
            self.distance_threshold += THRESHOLD_STEP;
        }
        self.distance_threshold = self.distance_threshold.max(THRESHOLD_STEP);
        if (previous - self.distance_threshold).abs() > f64::EPSILON {
            debug!(
                "{} species (target {target}); distance threshold {previous:.2} -> {:.2}",
                self.species.len(),
                self.distance_threshold
            );
        }
    }

    /// Rank species members, track the champion, share fitness and compute
    /// offspring quotas. Call once every network has its network fitness.
    pub fn update_statistics(&mut self) {
        for species in &mut self.species {
            species.rank_members(&self.networks);
        }

        let champion = self
            .networks
            .iter()
            .max_by(|a, b| a.network_fitness.total_cmp(&b.network_fitness));
        if let Some(champion) = champion {
            if champion.network_fitness > self.best_fitness {
                self.best_fitness = champion.network_fitness;
                self.generations_without_improvement = 0;
            } else {
                self.generations_without_improvement += 1;
            }
            self.champion = Some(champion.clone());
        }

        let count = self.networks.len().max(1) as f64;
        self.average_fitness = self.networks.iter().map(|n| n.network_fitness).sum::<f64>() / count;

        for species in &mut self.species {
            species.assign_shared_fitness(&mut self.networks, &self.properties);
        }
        let shared_average = self.networks.iter().map(|n| n.shared_fitness).sum::<f64>() / count;
        let mut carry = 0.0;
        for species in &mut self.species {
            species.calculate_expected_offspring(&self.networks, shared_average, &mut carry);
        }

        // Rounding leaves a few slots; they go to the species holding the champion
        let assigned: usize = self.species.iter().map(|s| s.expected_offspring).sum();
        let size = self.properties.population_size;
        if assigned < size {
            if let Some(best) = self.best_species_index() {
                self.species[best].expected_offspring += size - assigned;
            }
        }
    }

    /// Produce the next generation.
    pub fn evolve(&mut self, rng: &mut Randomness) {
        let children = match self.properties.population_type {
            PopulationType::Random => (0..self.properties.population_size)
                .map(|_| self.generator.generate(rng))
                .collect(),
            PopulationType::Neat => self.reproduce(rng),
        };
        self.networks = children;
        for species in &mut self.species {
            species.age += 1;
        }
        self.generation += 1;
        self.speciate(rng);
    }

    fn reproduce(&mut self, rng: &mut Randomness) -> Vec<NetworkChromosome> {
        self.tracker.new_generation();
        let size = self.properties.population_size;
        let mut children = Vec::with_capacity(size);
        let best_species = self.best_species_index();

        for (position, species) in self.species.iter().enumerate() {
            let mut quota = species.expected_offspring;
            let Some(champion) = species.champion() else {
                continue;
            };
            if quota == 0 {
                continue;
            }

            // Champion copies are carried over unchanged
            let mut clones = 1;
            if Some(position) == best_species {
                let rates = &self.properties.mutation;
                let offspring = rates.population_champion_number_offspring.min(quota);
                clones = rates.population_champion_number_clones.min(offspring).max(1);
                for _ in clones..offspring {
                    let mut child = self.networks[champion].clone_structure();
                    if rng.chance(rates.population_champion_connection_mutation) {
                        self.mutation
                            .mutate_add_connection(&mut child, &mut self.tracker, rng);
                    } else {
                        self.mutation.mutate_weights(&mut child, rng);
                    }
                    child.mark_recurrent_cycles();
                    children.push(child);
                }
                quota -= offspring.saturating_sub(clones);
            }
            let clones = clones.min(quota);
            for _ in 0..clones {
                children.push(self.networks[champion].clone_structure());
            }
            quota -= clones;

            let parents = species.parents(self.properties.parents_per_species);
            let scores: Vec<f64> = parents
                .iter()
                .map(|&p| self.networks[p].network_fitness)
                .collect();
            for _ in 0..quota {
                let Some(first) = self
                    .properties
                    .selection
                    .select_index(&scores, rng)
                    .map(|i| parents[i])
                else {
                    break;
                };
                let child = if parents.len() == 1
                    || rng.chance(self.properties.mutation.mutation_without_crossover)
                {
                    self.mutation
                        .apply(&self.networks[first], &mut self.tracker, rng)
                } else {
                    let second = self.mate_for(position, parents, &scores, rng);
                    let child =
                        self.crossover
                            .apply(&self.networks[first], &self.networks[second], rng);
                    if rng.chance(self.properties.crossover.crossover_without_mutation) {
                        child
                    } else {
                        self.mutation.apply(&child, &mut self.tracker, rng)
                    }
                };
                children.push(child);
            }
        }

        // Species with no quota at all can leave the population short
        while children.len() < size {
            children.push(self.generator.generate(rng));
        }
        children.truncate(size);
        children
    }

    /// Second parent: usually another parent of the same species, rarely
    /// the champion of a random other species.
    fn mate_for(
        &self,
        position: usize,
        parents: &[usize],
        scores: &[f64],
        rng: &mut Randomness,
    ) -> usize {
        if self.species.len() > 1 && rng.chance(self.properties.crossover.interspecies_rate) {
            let mut other = rng.next_index(self.species.len() - 1);
            if other >= position {
                other += 1;
            }
            if let Some(champion) = self.species[other].champion() {
                return champion;
            }
        }
        self.properties
            .selection
            .select_index(scores, rng)
            .map_or(parents[0], |i| parents[i])
    }

    fn best_species_index(&self) -> Option<usize> {
        self.species
            .iter()
            .enumerate()
            .filter_map(|(i, s)| Some((i, self.networks.get(s.champion()?)?.network_fitness)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn test_rng() -> Randomness {
        Randomness::new(42)
    }

    fn properties(population_size: usize, number_of_species: usize) -> NeatProperties {
        NeatProperties {
            population_size,
            number_of_species,
            ..NeatProperties::default()
        }
    }

    fn population(properties: NeatProperties, rng: &mut Randomness) -> NeatPopulation {
        let events = vec![
            Event::wait(),
            Event::KeyPress {
                key: "space".into(),
                steps: 1,
            },
            Event::ClickStage,
        ];
        let generator = NetworkGenerator::new(4, events, &properties);
        NeatPopulation::generate(generator, properties, rng)
    }

    /// Fitness rewarding enabled connections into the first output.
    fn assign_fitness(population: &mut NeatPopulation) {
        for network in population.networks_mut() {
            let first_output = network.output_ids[0];
            network.network_fitness = 1.0
                + network
                    .connections
                    .values()
                    .filter(|c| c.enabled && c.target == first_output)
                    .map(|c| c.weight.abs())
                    .sum::<f64>();
        }
    }

    #[test]
    fn test_every_network_belongs_to_one_species() {
        let mut rng = test_rng();
        let population = population(properties(40, 5), &mut rng);
        let total: usize = population.species().iter().map(Species::size).sum();
        assert_eq!(total, 40);
        assert!(population.networks().iter().all(|n| n.species.is_some()));
    }

    #[test]
    fn test_population_size_is_constant() {
        let mut rng = test_rng();
        let mut population = population(properties(30, 4), &mut rng);
        for _ in 0..10 {
            assign_fitness(&mut population);
            population.update_statistics();
            population.evolve(&mut rng);
            assert_eq!(population.networks().len(), 30);
            assert!(population.networks().iter().all(NetworkChromosome::is_consistent));
        }
        assert_eq!(population.generation(), 10);
        assert!(population.champion().is_some());
    }

    #[test]
    fn test_species_count_converges_to_target() {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        // Pairwise distance is 0.4 per index step
        let networks: Vec<NetworkChromosome> = (0..40)
            .map(|k| {
                let mut network = NetworkChromosome::minimal(1, &[Event::ClickStage]);
                network.connect_sources_to_outputs(&mut tracker, 1.0, 1.0, &mut rng);
                let bias = network.bias_id;
                for connection in network.connections.values_mut() {
                    connection.weight = if Some(connection.source) == bias {
                        2.0 * f64::from(k)
                    } else {
                        0.0
                    };
                }
                network
            })
            .collect();
        let properties = properties(40, 5);
        let generator = NetworkGenerator::new(1, vec![Event::ClickStage], &properties);
        let mut population =
            NeatPopulation::with_networks(networks, generator, properties, &mut rng);

        let mut counts = Vec::new();
        for _ in 0..40 {
            population.speciate(&mut rng);
            counts.push(population.species().len());
        }
        let tail = &counts[20..];
        let outside = tail.iter().filter(|&&c| !(3..=7).contains(&c)).count();
        assert!(outside <= 1, "{counts:?}");
        let mean = tail.iter().sum::<usize>() as f64 / tail.len() as f64;
        assert!((4.5..=5.5).contains(&mean), "mean {mean}: {counts:?}");
        assert!((1.5..4.0).contains(&population.distance_threshold()));
    }

    #[test]
    fn test_threshold_rises_when_too_many_species() {
        let mut rng = test_rng();
        let mut properties = properties(30, 1);
        properties.compatibility.distance_threshold = THRESHOLD_STEP;
        let mut population = population(properties, &mut rng);
        // Scatter weights so that every network is far from the others
        for network in population.networks_mut() {
            for connection in network.connections.values_mut() {
                connection.weight = rng.next_double_between(-10.0, 10.0);
            }
        }
        population.speciate(&mut rng);
        assert!(population.species().len() > 1);
        assert!(population.distance_threshold() > THRESHOLD_STEP);
    }

    #[test]
    fn test_random_population_regenerates() {
        let mut rng = test_rng();
        let properties = NeatProperties {
            population_type: PopulationType::Random,
            ..properties(10, 2)
        };
        let mut population = population(properties, &mut rng);
        assign_fitness(&mut population);
        population.update_statistics();
        population.evolve(&mut rng);
        assert_eq!(population.networks().len(), 10);
        assert!(population.networks().iter().all(|n| n.hidden_ids().is_empty()));
    }
}
