//! NEAT hyperparameters.
//!
//! Defaults are tuned for game-playing networks with a few dozen outputs.

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::ConfigError;
use crate::executor::EventSelection;
use crate::neat::network_fitness::NetworkFitness;
use crate::operators::selection::Selection;

/// Coefficients of the compatibility distance and the speciation threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Compatibility {
    /// Initial distance below which two networks share a species. Adjusted
    /// every generation towards the target species count.
    pub distance_threshold: f64,
    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
}

impl Default for Compatibility {
    fn default() -> Self {
        Self {
            distance_threshold: 3.0,
            excess_coefficient: 1.0,
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.4,
        }
    }
}

/// Probabilities and limits of the structural and weight mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NeatMutationRates {
    /// Share of offspring produced by mutation alone.
    pub mutation_without_crossover: f64,
    pub mutation_add_connection: f64,
    /// Chance that an add-connection attempt may close a cycle.
    pub recurrent_connection: f64,
    pub add_connection_tries: usize,
    /// Offspring bred from the population champion, when it is in an
    /// active species.
    pub population_champion_number_offspring: usize,
    /// Unmutated copies among those offspring.
    pub population_champion_number_clones: usize,
    /// Add-connection chance for the remaining champion offspring.
    pub population_champion_connection_mutation: f64,
    pub mutation_add_node: f64,
    pub mutate_weights: f64,
    /// Weights are perturbed uniformly within `±perturbation_power`.
    pub perturbation_power: f64,
    pub mutate_toggle_enable_connection: f64,
    pub toggle_enable_connection_times: usize,
    pub mutate_enable_connection: f64,
    /// Initial weights are drawn from `±weight_range`; mutated weights are
    /// clipped to ten times that.
    pub weight_range: f64,
    /// Activation of hidden nodes created by add-node.
    pub hidden_activation: Activation,
}

impl Default for NeatMutationRates {
    fn default() -> Self {
        Self {
            mutation_without_crossover: 0.25,
            mutation_add_connection: 0.2,
            recurrent_connection: 0.1,
            add_connection_tries: 20,
            population_champion_number_offspring: 10,
            population_champion_number_clones: 5,
            population_champion_connection_mutation: 0.3,
            mutation_add_node: 0.1,
            mutate_weights: 0.6,
            perturbation_power: 1.0,
            mutate_toggle_enable_connection: 0.1,
            toggle_enable_connection_times: 3,
            mutate_enable_connection: 0.03,
            weight_range: 1.0,
            hidden_activation: Activation::Sigmoid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NeatCrossoverRates {
    /// Chance that a crossover child skips mutation.
    pub crossover_without_mutation: f64,
    /// Chance that the second parent comes from another species.
    pub interspecies_rate: f64,
    /// Chance that matching genes average their weights.
    pub weight_average_rate: f64,
}

impl Default for NeatCrossoverRates {
    fn default() -> Self {
        Self {
            crossover_without_mutation: 0.2,
            interspecies_rate: 0.001,
            weight_average_rate: 0.4,
        }
    }
}

/// How each generation is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PopulationType {
    /// Speciation and reproduction.
    #[default]
    Neat,
    /// Fresh random networks every generation; a baseline.
    Random,
}

/// Every knob of the NEAT algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NeatProperties {
    pub population_size: usize,
    pub population_type: PopulationType,
    /// Target species count the distance threshold is steered towards.
    pub number_of_species: usize,
    /// Fraction of each species (best first) allowed to reproduce.
    pub parents_per_species: f64,
    /// Generations without improvement after which a species is penalised.
    pub penalizing_age: usize,
    /// Fitness boost for young species.
    pub age_significance: f64,
    /// Chance that an initial connection starts enabled.
    pub initial_connection_rate: f64,
    /// Simulated steps a network may play.
    pub timeout: u64,
    pub event_selection: EventSelection,
    pub network_fitness: NetworkFitness,
    /// Parent selection within a species.
    pub selection: Selection,
    pub mutation: NeatMutationRates,
    pub crossover: NeatCrossoverRates,
    pub compatibility: Compatibility,
}

impl Default for NeatProperties {
    fn default() -> Self {
        Self {
            population_size: 150,
            population_type: PopulationType::Neat,
            number_of_species: 10,
            parents_per_species: 0.2,
            penalizing_age: 15,
            age_significance: 1.0,
            initial_connection_rate: 0.6,
            timeout: 1500,
            event_selection: EventSelection::Activation,
            network_fitness: NetworkFitness::Score,
            selection: Selection::Random,
            mutation: NeatMutationRates::default(),
            crossover: NeatCrossoverRates::default(),
            compatibility: Compatibility::default(),
        }
    }
}

impl NeatProperties {
    /// Check ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::OutOfRange {
                key: "population-size",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        if self.number_of_species == 0 {
            return Err(ConfigError::OutOfRange {
                key: "number-of-species",
                value: 0.0,
                min: 1.0,
                max: self.population_size as f64,
            });
        }
        if self.parents_per_species <= 0.0 || self.parents_per_species > 1.0 {
            return Err(ConfigError::OutOfRange {
                key: "parents-per-species",
                value: self.parents_per_species,
                min: f64::MIN_POSITIVE,
                max: 1.0,
            });
        }
        if self.compatibility.distance_threshold <= 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "distance-threshold",
                value: self.compatibility.distance_threshold,
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        let m = &self.mutation;
        let c = &self.crossover;
        for (key, value) in [
            ("initial-connection-rate", self.initial_connection_rate),
            ("mutation-without-crossover", m.mutation_without_crossover),
            ("mutation-add-connection", m.mutation_add_connection),
            ("recurrent-connection", m.recurrent_connection),
            ("population-champion-connection-mutation", m.population_champion_connection_mutation),
            ("mutation-add-node", m.mutation_add_node),
            ("mutate-weights", m.mutate_weights),
            ("mutate-toggle-enable-connection", m.mutate_toggle_enable_connection),
            ("mutate-enable-connection", m.mutate_enable_connection),
            ("crossover-without-mutation", c.crossover_without_mutation),
            ("interspecies-rate", c.interspecies_rate),
            ("weight-average-rate", c.weight_average_rate),
        ] {
            probability(key, value)?;
        }
        if m.population_champion_number_clones > m.population_champion_number_offspring {
            return Err(ConfigError::Contradiction(format!(
                "population-champion-number-clones ({}) exceeds population-champion-number-offspring ({})",
                m.population_champion_number_clones, m.population_champion_number_offspring
            )));
        }
        Ok(())
    }
}

pub(crate) fn probability(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(NeatProperties::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_probability() {
        let mut properties = NeatProperties::default();
        properties.mutation.mutate_weights = 1.5;
        assert!(matches!(
            properties.validate(),
            Err(ConfigError::OutOfRange {
                key: "mutate-weights",
                ..
            })
        ));
    }

    #[test]
    fn test_clones_cannot_exceed_offspring() {
        let mut properties = NeatProperties::default();
        properties.mutation.population_champion_number_clones = 11;
        assert!(matches!(
            properties.validate(),
            Err(ConfigError::Contradiction(_))
        ));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let properties: NeatProperties = toml::from_str(
            r#"
            population-size = 20
            [compatibility]
            distance-threshold = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(properties.population_size, 20);
        assert!((properties.compatibility.distance_threshold - 1.5).abs() < 1e-12);
        assert!((properties.compatibility.weight_coefficient - 0.4).abs() < 1e-12);
        assert_eq!(properties.mutation.add_connection_tries, 20);
    }
}
