//! NeuroEvolution of Augmenting Topologies over [`NetworkChromosome`]s.
//!
//! [`NetworkChromosome`]: crate::network::NetworkChromosome

pub mod algorithm;
pub mod crossover;
pub mod generator;
pub mod mutation;
pub mod network_fitness;
pub mod population;
pub mod properties;
pub mod snapshot;
pub mod species;

pub use algorithm::Neat;
pub use generator::NetworkGenerator;
pub use network_fitness::NetworkFitness;
pub use population::NeatPopulation;
pub use properties::NeatProperties;
pub use snapshot::PopulationSnapshot;
