//! Persisting a NEAT population between runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::innovation::InnovationTracker;
use crate::neat::population::NeatPopulation;
use crate::neat::properties::NeatProperties;
use crate::network::NetworkChromosome;

/// Everything needed to continue evolving a population: its networks, the
/// innovation counters and the adaptive distance threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PopulationSnapshot {
    pub generation: usize,
    pub distance_threshold: f64,
    pub best_fitness: f64,
    pub properties: NeatProperties,
    pub networks: Vec<NetworkChromosome>,
    pub tracker: InnovationTracker,
}

impl PopulationSnapshot {
    #[must_use]
    pub fn capture(population: &NeatPopulation) -> Self {
        Self {
            generation: population.generation(),
            distance_threshold: population.distance_threshold(),
            best_fitness: population.best_fitness(),
            properties: population.properties().clone(),
            networks: population
                .networks()
                .iter()
                .map(NetworkChromosome::clone_structure)
                .collect(),
            tracker: population.tracker().clone(),
        }
    }

    /// # Errors
    ///
    /// Fails only if a value cannot be represented in JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// [`SnapshotError::Json`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    ///
    /// Serialisation or file system failures.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// # Errors
    ///
    /// File system failures or malformed content.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
