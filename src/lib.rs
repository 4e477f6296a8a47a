//! # Symbios Testgen
//!
//! Search-based test generation for interactive, event-driven programs.
//!
//! A test is a chromosome: either a list of integer codons that decodes into
//! a sequence of events, or a NEAT network that picks events while the
//! program runs. Search algorithms evolve populations of chromosomes and
//! keep, per coverage objective, the shortest chromosome that reaches it.
//!
//! ## Features
//!
//! - **List-based search**: random search, (1+1) EA, a simple generational
//!   GA and the many-objective MOSA over bitstring, integer-list and
//!   variable-length test chromosomes
//! - **Neuroevolution**: NEAT with speciation, an adaptive compatibility
//!   threshold and recurrent connections; networks react to the program's
//!   state instead of replaying a fixed sequence
//! - **Event extraction**: static, dynamic, naive and wait-only strategies
//!   with bounded retries and a wait fallback
//! - **Local search**: wait-based extension and coverage-preserving
//!   reduction of tests
//! - **TOML configuration**: validated before the first evaluation
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_testgen::{
//!     BitstringChromosome, BitstringChromosomeGenerator, DirectEvaluator, FitnessFunction,
//!     ListCrossover, OneMax, OnePlusOne, Randomness, SearchAlgorithm, StoppingCondition,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut rng = Randomness::new(42);
//!     let mut search = OnePlusOne::<BitstringChromosome>::new();
//!     search.set_chromosome_generator(Box::new(BitstringChromosomeGenerator::new(
//!         16,
//!         ListCrossover::SinglePoint,
//!     )));
//!     let one_max: Box<dyn FitnessFunction<BitstringChromosome>> = Box::new(OneMax::new(16));
//!     search.set_fitness_functions(vec![one_max]);
//!     search.set_stopping_condition(StoppingCondition::FixedIteration { iterations: 500 });
//!
//!     let solutions = search
//!         .find_solution(&mut DirectEvaluator, &mut rng)
//!         .await
//!         .expect("search is configured");
//!     assert!(!solutions.is_empty());
//! }
//! ```
//!
//! ## Architecture
//!
//! ### Playthroughs
//!
//! The program-under-test sits behind the async [`ProgramUnderTest`] trait.
//! An [`Evaluator`] plays a chromosome on it and stores the resulting
//! [`ExecutionTrace`] on the chromosome; fitness values are computed from
//! that trace and cached until the chromosome changes.
//!
//! ### Arena-Graph Networks
//!
//! Network nodes and connections live in `SlotMap` arenas, addressed by
//! generational keys. Innovation numbers are handed out by an
//! [`InnovationTracker`] that deduplicates identical structural mutations
//! within a generation, so crossover can align genes by number.

pub mod activation;
pub mod archive;
pub mod bitstring;
pub mod chromosome;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod executor;
pub mod extractor;
pub mod fitness;
pub mod gene;
pub mod innovation;
pub mod integerlist;
pub mod neat;
pub mod network;
pub mod operators;
pub mod program;
pub mod randomness;
pub mod search;
pub mod stopping;
pub mod testcase;
pub mod topology;
pub mod trace;

// Re-exports for convenience
pub use activation::Activation;
pub use archive::Archive;
pub use bitstring::{BitstringChromosome, BitstringChromosomeGenerator};
pub use chromosome::{Chromosome, ChromosomeGenerator, ChromosomeId, Evaluation, Evolvable};
pub use config::{AlgorithmKind, ChromosomeKind, SearchConfiguration};
pub use error::{ConfigError, ExecutionError, ExtractionError, SearchError, SnapshotError};
pub use evaluator::{EvaluatorError, NetworkEvaluator};
pub use event::{Event, EventBounds};
pub use executor::{
    DirectEvaluator, EventSelection, EventSelector, Evaluator, NetworkExecutor, TestExecutor,
};
pub use extractor::{EventExtractor, ExtractorKind};
pub use fitness::{FitnessFunction, OneMax, SingleBit, StatementFitness};
pub use gene::{ConnectionGene, ConnectionId, NodeGene, NodeId, NodeType};
pub use innovation::InnovationTracker;
pub use integerlist::{IntegerListChromosome, IntegerListChromosomeGenerator};
pub use neat::{
    Neat, NeatPopulation, NeatProperties, NetworkFitness, NetworkGenerator, PopulationSnapshot,
};
pub use network::NetworkChromosome;
pub use operators::crossover::ListCrossover;
pub use operators::local_search::{
    ExtensionLocalSearch, LocalSearch, LocalSearchProperties, ReductionLocalSearch,
};
pub use operators::selection::Selection;
pub use program::{LocationId, ProgramState, ProgramUnderTest};
pub use randomness::Randomness;
pub use search::{
    Mosa, OnePlusOne, RandomSearch, SearchAlgorithm, SearchProperties, SimpleGa,
};
pub use stopping::{SearchStatistics, StoppingCondition};
pub use testcase::{TestChromosome, TestChromosomeGenerator};
pub use topology::GraphTopology;
pub use trace::ExecutionTrace;
