//! Species: clusters of genetically similar networks.

use serde::{Deserialize, Serialize};

use crate::neat::properties::NeatProperties;
use crate::network::NetworkChromosome;

/// Species younger than this many generations get the age bonus.
const YOUTH_AGE: usize = 10;

/// Fitness multiplier for species that stopped improving.
const STAGNATION_PENALTY: f64 = 0.01;

/// One species of a NEAT population.
///
/// Members are indices into the population's network list and are only
/// valid for the generation they were assigned in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub id: u32,
    /// Member compared against during the next speciation.
    pub representative: NetworkChromosome,
    #[serde(skip)]
    pub members: Vec<usize>,
    /// Generations this species has existed.
    pub age: usize,
    /// Best network fitness any member ever reached.
    pub best_fitness: f64,
    /// Age at which `best_fitness` was last raised.
    pub age_of_last_improvement: usize,
    /// Mean adjusted fitness of the current members.
    #[serde(skip)]
    pub average_fitness: f64,
    #[serde(skip)]
    pub expected_offspring: usize,
}

impl Species {
    #[must_use]
    pub fn new(id: u32, representative: NetworkChromosome) -> Self {
        Self {
            id,
            representative,
            members: Vec::new(),
            age: 0,
            best_fitness: 0.0,
            age_of_last_improvement: 0,
            average_fitness: 0.0,
            expected_offspring: 0,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Generations since the best fitness last improved.
    #[must_use]
    pub fn stagnation(&self) -> usize {
        self.age.saturating_sub(self.age_of_last_improvement)
    }

    /// Sort members best first and record any improvement of the best
    /// fitness.
    pub fn rank_members(&mut self, networks: &[NetworkChromosome]) {
        self.members.sort_by(|&a, &b| {
            networks[b]
                .network_fitness
                .total_cmp(&networks[a].network_fitness)
        });
        if let Some(&champion) = self.members.first() {
            let fitness = networks[champion].network_fitness;
            if fitness > self.best_fitness {
                self.best_fitness = fitness;
                self.age_of_last_improvement = self.age;
            }
        }
    }

    /// Index of the best member. Requires [`rank_members`](Self::rank_members).
    #[must_use]
    pub fn champion(&self) -> Option<usize> {
        self.members.first().copied()
    }

    /// Share each member's fitness within the species, adjusted by age.
    ///
    /// Young species are boosted by `age_significance`; species that have
    /// not improved for more than `penalizing_age` generations are
    /// penalised heavily so their quota shrinks.
    pub fn assign_shared_fitness(&mut self, networks: &mut [NetworkChromosome], properties: &NeatProperties) {
        if self.members.is_empty() {
            self.average_fitness = 0.0;
            return;
        }
        let size = self.members.len() as f64;
        let mut total = 0.0;
        for &member in &self.members {
            let mut fitness = networks[member].network_fitness.max(0.0);
            if self.age < YOUTH_AGE {
                fitness *= properties.age_significance;
            }
            if self.stagnation() > properties.penalizing_age {
                fitness *= STAGNATION_PENALTY;
            }
            networks[member].shared_fitness = fitness / size;
            total += fitness;
        }
        self.average_fitness = total / size;
    }

    /// Sum of the members' shared fitness relative to the population
    /// average. The fractional part is carried to the next species.
    pub fn calculate_expected_offspring(
        &mut self,
        networks: &[NetworkChromosome],
        population_average: f64,
        carry: &mut f64,
    ) {
        let raw: f64 = if population_average > 0.0 {
            self.members
                .iter()
                .map(|&m| networks[m].shared_fitness / population_average)
                .sum()
        } else {
            self.members.len() as f64
        };
        let with_carry = raw + *carry;
        let whole = with_carry.floor();
        *carry = with_carry - whole;
        self.expected_offspring = whole.max(0.0) as usize;
    }

    /// Members allowed to reproduce: the best `parents_per_species`
    /// fraction, at least one.
    #[must_use]
    pub fn parents(&self, parents_per_species: f64) -> &[usize] {
        let count = ((self.members.len() as f64 * parents_per_species).ceil() as usize)
            .clamp(1.min(self.members.len()), self.members.len());
        &self.members[..count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn networks(fitness: &[f64]) -> Vec<NetworkChromosome> {
        fitness
            .iter()
            .map(|&f| {
                let mut network = NetworkChromosome::minimal(1, &[Event::wait()]);
                network.network_fitness = f;
                network
            })
            .collect()
    }

    #[test]
    fn test_rank_members_tracks_improvement() {
        let networks = networks(&[1.0, 5.0, 3.0]);
        let mut species = Species::new(1, networks[0].clone());
        species.members = vec![0, 1, 2];
        species.age = 4;
        species.rank_members(&networks);

        assert_eq!(species.members, vec![1, 2, 0]);
        assert_eq!(species.champion(), Some(1));
        assert_eq!(species.best_fitness, 5.0);
        assert_eq!(species.age_of_last_improvement, 4);
        assert_eq!(species.stagnation(), 0);
    }

    #[test]
    fn test_stagnant_species_is_penalised() {
        let properties = NeatProperties::default();
        let mut networks = networks(&[4.0, 4.0]);
        let mut species = Species::new(1, networks[0].clone());
        species.members = vec![0, 1];
        species.age = 40;
        species.age_of_last_improvement = 0;
        species.assign_shared_fitness(&mut networks, &properties);

        assert!((networks[0].shared_fitness - 0.02).abs() < 1e-12);
        assert!((species.average_fitness - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_expected_offspring_follows_shared_fitness() {
        let properties = NeatProperties::default();
        let mut networks = networks(&[2.0, 1.0, 1.0]);
        let mut a = Species::new(1, networks[0].clone());
        a.members = vec![0];
        let mut b = Species::new(2, networks[1].clone());
        b.members = vec![1, 2];
        a.assign_shared_fitness(&mut networks, &properties);
        b.assign_shared_fitness(&mut networks, &properties);

        // Shared fitness 2.0, 0.5, 0.5; population average 1.0
        let mut carry = 0.0;
        a.calculate_expected_offspring(&networks, 1.0, &mut carry);
        b.calculate_expected_offspring(&networks, 1.0, &mut carry);
        assert_eq!(a.expected_offspring, 2);
        assert_eq!(b.expected_offspring, 1);
        assert!(carry.abs() < 1e-9);
    }

    #[test]
    fn test_fraction_is_carried_over() {
        let networks = networks(&[1.0]);
        let mut species = Species::new(1, networks[0].clone());
        species.members = vec![0];
        let mut carry = 0.75;
        let mut shared = networks.clone();
        shared[0].shared_fitness = 0.5;
        species.calculate_expected_offspring(&shared, 1.0, &mut carry);
        assert_eq!(species.expected_offspring, 1);
        assert!((carry - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_parents_keep_at_least_one() {
        let networks = networks(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut species = Species::new(1, networks[0].clone());
        species.members = vec![0, 1, 2, 3, 4];
        species.rank_members(&networks);
        assert_eq!(species.parents(0.2), &[4]);
        assert_eq!(species.parents(0.01), &[4]);
        assert_eq!(species.parents(1.0).len(), 5);
    }
}
