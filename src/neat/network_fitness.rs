//! Scalar fitness of a network's playthrough.

use serde::{Deserialize, Serialize};

use crate::chromosome::Chromosome;
use crate::network::NetworkChromosome;
use crate::trace::ExecutionTrace;

/// What makes a playthrough good. Larger is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum NetworkFitness {
    /// The game score reached.
    Score,
    /// Simulated steps survived, as a fraction of the timeout.
    Survive { timeout: u64 },
    /// Number of covered program locations.
    Coverage,
    /// Sum of the nested fitness values.
    Combined { components: Vec<NetworkFitness> },
}

impl NetworkFitness {
    /// Fitness of a completed playthrough.
    #[must_use]
    pub fn compute(&self, trace: &ExecutionTrace) -> f64 {
        match self {
            Self::Score => trace.score,
            Self::Survive { timeout } => trace.steps as f64 / (*timeout).max(1) as f64,
            Self::Coverage => trace.coverage.len() as f64,
            Self::Combined { components } => components.iter().map(|c| c.compute(trace)).sum(),
        }
    }

    /// Store the fitness of `network`'s last playthrough on it. Networks
    /// whose playthrough failed get 0.
    pub fn assign(&self, network: &mut NetworkChromosome) -> f64 {
        let fitness = network
            .trace()
            .map(|trace| self.compute(trace))
            .filter(|f| f.is_finite())
            .unwrap_or(0.0)
            .max(0.0);
        network.network_fitness = fitness;
        fitness
    }
}
