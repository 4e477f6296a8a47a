//! Search configuration loaded from TOML.
//!
//! Keys are kebab-case. Everything is validated when the configuration is
//! parsed, so a run either starts fully configured or fails before its
//! first evaluation. Factory methods turn the validated settings into
//! operators, generators and search algorithms.
//!
//! ```toml
//! algorithm = "mosa"
//! chromosome = "test"
//! population-size = 30
//! chromosome-length = 20
//! integer-range = { min = 0, max = 420 }
//! extractor = "dynamic"
//! event-selector = "clustering"
//!
//! [mutation]
//! operator = "variable-length"
//! gaussian-power = 5.0
//!
//! [stopping-condition]
//! type = "one-of"
//! conditions = [{ type = "fixed-iteration", iterations = 100 }, { type = "optimal" }]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::bitstring::BitstringChromosomeGenerator;
use crate::chromosome::{Chromosome, Evolvable};
use crate::error::ConfigError;
use crate::event::EventBounds;
use crate::executor::{EventSelection, EventSelector};
use crate::extractor::{EventExtractor, ExtractorKind};
use crate::fitness::StatementFitness;
use crate::integerlist::IntegerListChromosomeGenerator;
use crate::neat::network_fitness::NetworkFitness;
use crate::neat::properties::{
    probability, Compatibility, NeatCrossoverRates, NeatMutationRates, NeatProperties,
    PopulationType,
};
use crate::neat::Neat;
use crate::operators::crossover::ListCrossover;
use crate::operators::local_search::{
    ExtensionLocalSearch, LocalSearch, LocalSearchKind, LocalSearchProperties,
    ReductionLocalSearch,
};
use crate::operators::mutation::VariableLengthMutation;
use crate::operators::selection::Selection;
use crate::program::ProgramState;
use crate::randomness::Randomness;
use crate::search::{
    BoxedFitness, BoxedGenerator, Mosa, OnePlusOne, RandomSearch, SearchAlgorithm,
    SearchProperties, SimpleGa,
};
use crate::stopping::StoppingCondition;
use crate::testcase::{TestChromosome, TestChromosomeGenerator};

/// A list-based search algorithm behind a trait object.
pub type BoxedSearch<C> =
    Box<dyn SearchAlgorithm<C, Properties = SearchProperties, Generator = BoxedGenerator<C>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    Random,
    OnePlusOne,
    SimpleGa,
    Mosa,
    Neat,
}

impl AlgorithmKind {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "random" => Ok(Self::Random),
            "one-plus-one" => Ok(Self::OnePlusOne),
            "simple-ga" => Ok(Self::SimpleGa),
            "mosa" => Ok(Self::Mosa),
            "neat" => Ok(Self::Neat),
            other => Err(ConfigError::unknown("algorithm", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromosomeKind {
    Bitstring,
    IntegerList,
    Test,
    Network,
}

impl ChromosomeKind {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "bitstring" => Ok(Self::Bitstring),
            "integer-list" => Ok(Self::IntegerList),
            "test" => Ok(Self::Test),
            "network" => Ok(Self::Network),
            other => Err(ConfigError::unknown("chromosome", other)),
        }
    }

    /// The mutation each list chromosome is built with.
    fn mutation(self) -> &'static str {
        match self {
            Self::Bitstring => "bitflip",
            Self::IntegerList => "integer-list",
            Self::Test => "variable-length",
            Self::Network => "neat",
        }
    }
}

/// A validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfiguration {
    pub algorithm: AlgorithmKind,
    pub chromosome: ChromosomeKind,
    pub search: SearchProperties,
    pub chromosome_length: usize,
    /// Codon range `[min, max)`.
    pub integer_range: (i64, i64),
    pub gaussian_power: f64,
    pub crossover: ListCrossover,
    pub stopping_condition: StoppingCondition,
    pub extractor: ExtractorKind,
    pub event_selector: EventSelector,
    pub bounds: EventBounds,
    pub local_search: Vec<LocalSearchProperties>,
    pub neat: NeatProperties,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfiguration {
    algorithm: Option<String>,
    chromosome: Option<String>,
    population_size: Option<usize>,
    #[serde(default = "default_chromosome_length")]
    chromosome_length: usize,
    #[serde(default)]
    integer_range: IntegerRange,
    #[serde(default)]
    mutation: RawMutation,
    #[serde(default)]
    crossover: RawCrossover,
    #[serde(default)]
    selection: RawSelection,
    stopping_condition: Option<StoppingCondition>,
    extractor: Option<String>,
    event_selector: Option<String>,
    #[serde(default)]
    local_search: Vec<LocalSearchProperties>,
    #[serde(default)]
    compatibility: Compatibility,
    #[serde(default)]
    neat: RawNeat,
    wait_step_upper_bound: Option<u32>,
    press_duration_upper_bound: Option<u32>,
    click_duration: Option<u32>,
    seed: Option<u64>,
}

fn default_chromosome_length() -> usize {
    10
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct IntegerRange {
    min: i64,
    max: i64,
}

impl Default for IntegerRange {
    fn default() -> Self {
        Self { min: 0, max: 420 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawMutation {
    operator: Option<String>,
    probability: f64,
    gaussian_power: f64,
    #[serde(flatten)]
    neat: NeatMutationRates,
}

impl Default for RawMutation {
    fn default() -> Self {
        Self {
            operator: None,
            probability: SearchProperties::default().mutation_probability,
            gaussian_power: 5.0,
            neat: NeatMutationRates::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawCrossover {
    operator: Option<String>,
    probability: f64,
    #[serde(flatten)]
    neat: NeatCrossoverRates,
}

impl Default for RawCrossover {
    fn default() -> Self {
        Self {
            operator: None,
            probability: SearchProperties::default().crossover_probability,
            neat: NeatCrossoverRates::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawSelection {
    operator: Option<String>,
    size: Option<usize>,
}

/// NEAT settings that have no list-based counterpart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawNeat {
    population_type: PopulationType,
    number_of_species: usize,
    parents_per_species: f64,
    penalizing_age: usize,
    age_significance: f64,
    initial_connection_rate: f64,
    timeout: u64,
    event_selection: EventSelection,
    network_fitness: NetworkFitness,
}

impl Default for RawNeat {
    fn default() -> Self {
        let defaults = NeatProperties::default();
        Self {
            population_type: defaults.population_type,
            number_of_species: defaults.number_of_species,
            parents_per_species: defaults.parents_per_species,
            penalizing_age: defaults.penalizing_age,
            age_significance: defaults.age_significance,
            initial_connection_rate: defaults.initial_connection_rate,
            timeout: defaults.timeout,
            event_selection: defaults.event_selection,
            network_fitness: defaults.network_fitness,
        }
    }
}

impl SearchConfiguration {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, otherwise the first
    /// missing, unknown, out-of-range or contradictory setting.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let raw: RawConfiguration =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let configuration = Self::resolve(raw)?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    fn resolve(raw: RawConfiguration) -> Result<Self, ConfigError> {
        let algorithm =
            AlgorithmKind::parse(raw.algorithm.as_deref().ok_or(ConfigError::MissingKey("algorithm"))?)?;
        let chromosome = match (raw.chromosome.as_deref(), algorithm) {
            (Some(name), _) => ChromosomeKind::parse(name)?,
            (None, AlgorithmKind::Neat) => ChromosomeKind::Network,
            (None, _) => return Err(ConfigError::MissingKey("chromosome")),
        };
        if let Some(operator) = raw.mutation.operator.as_deref() {
            if !["bitflip", "integer-list", "variable-length", "neat"].contains(&operator) {
                return Err(ConfigError::unknown("mutation operator", operator));
            }
            if operator != chromosome.mutation() {
                return Err(ConfigError::Contradiction(format!(
                    "mutation operator `{operator}` does not apply to {chromosome:?} chromosomes"
                )));
            }
        }
        let crossover = match raw.crossover.operator.as_deref() {
            None | Some("single-point") => ListCrossover::SinglePoint,
            Some("single-point-relative") => ListCrossover::SinglePointRelative,
            Some(other) => return Err(ConfigError::unknown("crossover operator", other)),
        };
        let selection = match (raw.selection.operator.as_deref(), raw.selection.size) {
            (None, None) => Selection::default(),
            (Some("rank"), _) => Selection::Rank,
            (Some("random"), _) => Selection::Random,
            (None | Some("tournament"), size) => Selection::Tournament {
                size: size.unwrap_or(2),
            },
            (Some(other), _) => return Err(ConfigError::unknown("selection operator", other)),
        };
        let extractor = match raw.extractor.as_deref() {
            None => ExtractorKind::default(),
            Some("static") => ExtractorKind::Static,
            Some("dynamic") => ExtractorKind::Dynamic,
            Some("naive") => ExtractorKind::Naive,
            Some("wait") => ExtractorKind::Wait,
            Some("neuroevolution") => ExtractorKind::Neuroevolution,
            Some(other) => return Err(ConfigError::unknown("extractor", other)),
        };
        let event_selector = match raw.event_selector.as_deref() {
            None | Some("interleaving") => EventSelector::Interleaving,
            Some("clustering") => EventSelector::Clustering,
            Some(other) => return Err(ConfigError::unknown("event selector", other)),
        };
        let stopping_condition = raw
            .stopping_condition
            .ok_or(ConfigError::MissingKey("stopping-condition"))?;

        let defaults = EventBounds::default();
        let bounds = EventBounds {
            wait_step_upper_bound: raw
                .wait_step_upper_bound
                .unwrap_or(defaults.wait_step_upper_bound),
            press_duration_upper_bound: raw
                .press_duration_upper_bound
                .unwrap_or(defaults.press_duration_upper_bound),
            click_duration: raw.click_duration.unwrap_or(defaults.click_duration),
            ..defaults
        };

        let population_size = raw.population_size.unwrap_or(match algorithm {
            AlgorithmKind::Neat => NeatProperties::default().population_size,
            _ => SearchProperties::default().population_size,
        });
        let search = SearchProperties {
            population_size,
            crossover_probability: raw.crossover.probability,
            mutation_probability: raw.mutation.probability,
            selection,
        };
        let neat = NeatProperties {
            population_size,
            population_type: raw.neat.population_type,
            number_of_species: raw.neat.number_of_species,
            parents_per_species: raw.neat.parents_per_species,
            penalizing_age: raw.neat.penalizing_age,
            age_significance: raw.neat.age_significance,
            initial_connection_rate: raw.neat.initial_connection_rate,
            timeout: raw.neat.timeout,
            event_selection: raw.neat.event_selection,
            network_fitness: raw.neat.network_fitness,
            selection,
            mutation: raw.mutation.neat,
            crossover: raw.crossover.neat,
            compatibility: raw.compatibility,
        };

        Ok(Self {
            algorithm,
            chromosome,
            search,
            chromosome_length: raw.chromosome_length,
            integer_range: (raw.integer_range.min, raw.integer_range.max),
            gaussian_power: raw.mutation.gaussian_power,
            crossover,
            stopping_condition,
            extractor,
            event_selector,
            bounds,
            local_search: raw.local_search,
            neat,
            seed: raw.seed,
        })
    }

    /// Check ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.algorithm, self.chromosome) {
            (AlgorithmKind::Neat, ChromosomeKind::Network) => {}
            (AlgorithmKind::Neat, other) => {
                return Err(ConfigError::Contradiction(format!(
                    "neat evolves networks, not {other:?} chromosomes"
                )))
            }
            (other, ChromosomeKind::Network) => {
                return Err(ConfigError::Contradiction(format!(
                    "network chromosomes need the neat algorithm, not {other:?}"
                )))
            }
            _ => {}
        }
        if self.search.population_size == 0 {
            return Err(ConfigError::OutOfRange {
                key: "population-size",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        if self.chromosome_length == 0 {
            return Err(ConfigError::OutOfRange {
                key: "chromosome-length",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        let (min, max) = self.integer_range;
        if min >= max {
            return Err(ConfigError::Contradiction(format!(
                "integer-range min ({min}) must be below max ({max})"
            )));
        }
        if self.bounds.wait_step_upper_bound == 0 {
            return Err(ConfigError::OutOfRange {
                key: "wait-step-upper-bound",
                value: 0.0,
                min: 1.0,
                max: f64::from(u32::MAX),
            });
        }
        if let Selection::Tournament { size: 0 } = self.search.selection {
            return Err(ConfigError::OutOfRange {
                key: "size",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        probability("mutation probability", self.search.mutation_probability)?;
        probability("crossover probability", self.search.crossover_probability)?;
        if !self.gaussian_power.is_finite() || self.gaussian_power < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "gaussian-power",
                value: self.gaussian_power,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        validate_stopping_condition(&self.stopping_condition)?;
        for operator in &self.local_search {
            if self.chromosome != ChromosomeKind::Test {
                return Err(ConfigError::Contradiction(format!(
                    "local search only applies to test chromosomes, not {:?}",
                    self.chromosome
                )));
            }
            probability("local-search probability", operator.probability)?;
            probability("resources-threshold", operator.resources_threshold)?;
        }
        if self.algorithm == AlgorithmKind::Neat {
            self.neat.validate()?;
        }
        Ok(())
    }

    /// Seeded from `seed`, or from the clock when no seed is configured.
    #[must_use]
    pub fn randomness(&self) -> Randomness {
        let seed = self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_nanos() as u64)
        });
        Randomness::new(seed)
    }

    #[must_use]
    pub fn event_extractor(&self) -> EventExtractor {
        EventExtractor::new(self.extractor, self.bounds)
    }

    #[must_use]
    pub fn codon_range(&self) -> (i64, i64) {
        self.integer_range
    }

    /// # Errors
    ///
    /// [`ConfigError::Contradiction`] unless the chromosome is `bitstring`.
    pub fn bitstring_generator(&self) -> Result<BitstringChromosomeGenerator, ConfigError> {
        self.expect_chromosome(ChromosomeKind::Bitstring)?;
        Ok(BitstringChromosomeGenerator::new(
            self.chromosome_length,
            self.crossover,
        ))
    }

    /// # Errors
    ///
    /// [`ConfigError::Contradiction`] unless the chromosome is `integer-list`.
    pub fn integer_list_generator(&self) -> Result<IntegerListChromosomeGenerator, ConfigError> {
        self.expect_chromosome(ChromosomeKind::IntegerList)?;
        let (min, max) = self.integer_range;
        Ok(IntegerListChromosomeGenerator::new(
            self.chromosome_length,
            min,
            max,
            self.crossover,
        ))
    }

    /// Tests start between 2 and `chromosome-length` codons long and may
    /// grow up to that length.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Contradiction`] unless the chromosome is `test`.
    pub fn test_generator(&self) -> Result<TestChromosomeGenerator, ConfigError> {
        self.expect_chromosome(ChromosomeKind::Test)?;
        let (min, max) = self.integer_range;
        let mutation =
            VariableLengthMutation::new(min, max, self.chromosome_length, self.gaussian_power);
        Ok(TestChromosomeGenerator::new(2, mutation, self.crossover))
    }

    /// Configured local search operators for test chromosomes.
    #[must_use]
    pub fn local_search_operators(&self) -> Vec<Box<dyn LocalSearch<TestChromosome>>> {
        self.local_search
            .iter()
            .map(|properties| -> Box<dyn LocalSearch<TestChromosome>> {
                match properties.kind {
                    LocalSearchKind::Extension => Box::new(ExtensionLocalSearch::new(properties)),
                    LocalSearchKind::Reduction => Box::new(ReductionLocalSearch::new(properties)),
                }
            })
            .collect()
    }

    /// One statement objective per block of the program.
    #[must_use]
    pub fn statement_objectives<C: Chromosome + 'static>(
        &self,
        state: &ProgramState,
    ) -> Vec<BoxedFitness<C>> {
        StatementFitness::for_program(state)
            .into_iter()
            .map(|function| Box::new(function) as BoxedFitness<C>)
            .collect()
    }

    /// The configured list-based algorithm with properties and stopping
    /// condition applied. Generator, fitness functions and local search are
    /// left to the caller.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Contradiction`] for the `neat` algorithm; use
    /// [`neat`](Self::neat) instead.
    pub fn search_algorithm<C: Evolvable + 'static>(&self) -> Result<BoxedSearch<C>, ConfigError> {
        let mut search: BoxedSearch<C> = match self.algorithm {
            AlgorithmKind::Random => Box::new(RandomSearch::new()),
            AlgorithmKind::OnePlusOne => Box::new(OnePlusOne::new()),
            AlgorithmKind::SimpleGa => Box::new(SimpleGa::new()),
            AlgorithmKind::Mosa => Box::new(Mosa::new()),
            AlgorithmKind::Neat => {
                return Err(ConfigError::Contradiction(
                    "neat is not a list-based algorithm".to_string(),
                ))
            }
        };
        search.set_properties(self.search.clone());
        search.set_stopping_condition(self.stopping_condition.clone());
        Ok(search)
    }

    /// NEAT with its properties and stopping condition applied.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Contradiction`] unless the algorithm is `neat`.
    pub fn neat(&self) -> Result<Neat, ConfigError> {
        if self.algorithm != AlgorithmKind::Neat {
            return Err(ConfigError::Contradiction(format!(
                "configured algorithm is {:?}, not neat",
                self.algorithm
            )));
        }
        let mut neat = Neat::new();
        neat.set_properties(self.neat.clone());
        neat.set_stopping_condition(self.stopping_condition.clone());
        Ok(neat)
    }

    fn expect_chromosome(&self, kind: ChromosomeKind) -> Result<(), ConfigError> {
        if self.chromosome == kind {
            Ok(())
        } else {
            Err(ConfigError::Contradiction(format!(
                "configured chromosome is {:?}, not {kind:?}",
                self.chromosome
            )))
        }
    }
}

fn validate_stopping_condition(condition: &StoppingCondition) -> Result<(), ConfigError> {
    match condition {
        StoppingCondition::OneOf { conditions } if conditions.is_empty() => Err(
            ConfigError::Contradiction("`one-of` needs at least one condition".to_string()),
        ),
        StoppingCondition::OneOf { conditions } => {
            conditions.iter().try_for_each(validate_stopping_condition)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MOSA: &str = r#"
        algorithm = "mosa"
        chromosome = "test"
        population-size = 30
        chromosome-length = 20
        integer-range = { min = 0, max = 100 }
        event-selector = "clustering"
        seed = 7

        [mutation]
        operator = "variable-length"
        gaussian-power = 3.0

        [crossover]
        operator = "single-point-relative"
        probability = 0.7

        [selection]
        operator = "rank"

        [stopping-condition]
        type = "one-of"
        conditions = [
            { type = "fixed-iteration", iterations = 20 },
            { type = "fixed-time", duration = 60000 },
        ]

        [[local-search]]
        type = "extension"
        probability = 0.5
        resources-threshold = 0.25
    "#;

    #[test]
    fn test_full_configuration() {
        let config = SearchConfiguration::from_toml_str(MOSA).unwrap();
        assert_eq!(config.algorithm, AlgorithmKind::Mosa);
        assert_eq!(config.chromosome, ChromosomeKind::Test);
        assert_eq!(config.search.population_size, 30);
        assert_eq!(config.search.selection, Selection::Rank);
        assert!((config.search.crossover_probability - 0.7).abs() < 1e-12);
        assert_eq!(config.crossover, ListCrossover::SinglePointRelative);
        assert_eq!(config.event_selector, EventSelector::Clustering);
        assert_eq!(config.integer_range, (0, 100));
        assert_eq!(config.bounds.wait_step_upper_bound, 200);
        assert_eq!(config.seed, Some(7));
        assert_eq!(
            config.stopping_condition,
            StoppingCondition::OneOf {
                conditions: vec![
                    StoppingCondition::FixedIteration { iterations: 20 },
                    StoppingCondition::FixedTime {
                        duration: Duration::from_secs(60)
                    },
                ]
            }
        );
        assert_eq!(config.local_search.len(), 1);
        assert_eq!(config.local_search[0].generation_interval, 1);
        assert_eq!(config.local_search_operators().len(), 1);

        let generator = config.test_generator().unwrap();
        assert_eq!(generator.mutation.max_length, 20);
        assert!(config.bitstring_generator().is_err());
        assert!(config.search_algorithm::<TestChromosome>().is_ok());
        assert!(config.neat().is_err());
    }

    #[test]
    fn test_missing_algorithm() {
        let err = SearchConfiguration::from_toml_str(
            "chromosome = \"bitstring\"\n[stopping-condition]\ntype = \"optimal\"\n",
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("algorithm"));
    }

    #[test]
    fn test_missing_stopping_condition() {
        let err =
            SearchConfiguration::from_toml_str("algorithm = \"random\"\nchromosome = \"bitstring\"\n")
                .unwrap_err();
        assert_eq!(err, ConfigError::MissingKey("stopping-condition"));
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let err = SearchConfiguration::from_toml_str(
            "algorithm = \"hill-climbing\"\n[stopping-condition]\ntype = \"optimal\"\n",
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::unknown("algorithm", "hill-climbing"));

        let err = SearchConfiguration::from_toml_str(
            "algorithm = \"random\"\nchromosome = \"bitstring\"\n[mutation]\noperator = \"swap\"\n[stopping-condition]\ntype = \"optimal\"\n",
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::unknown("mutation operator", "swap"));
    }

    #[test]
    fn test_contradictions() {
        let neat_on_bits = "algorithm = \"neat\"\nchromosome = \"bitstring\"\n[stopping-condition]\ntype = \"optimal\"\n";
        assert!(matches!(
            SearchConfiguration::from_toml_str(neat_on_bits),
            Err(ConfigError::Contradiction(_))
        ));

        let empty_one_of = "algorithm = \"random\"\nchromosome = \"bitstring\"\n[stopping-condition]\ntype = \"one-of\"\nconditions = []\n";
        assert!(matches!(
            SearchConfiguration::from_toml_str(empty_one_of),
            Err(ConfigError::Contradiction(_))
        ));

        let wrong_mutation = "algorithm = \"random\"\nchromosome = \"bitstring\"\n[mutation]\noperator = \"variable-length\"\n[stopping-condition]\ntype = \"optimal\"\n";
        assert!(matches!(
            SearchConfiguration::from_toml_str(wrong_mutation),
            Err(ConfigError::Contradiction(_))
        ));
    }

    #[test]
    fn test_probability_out_of_range() {
        let err = SearchConfiguration::from_toml_str(
            "algorithm = \"simple-ga\"\nchromosome = \"bitstring\"\n[mutation]\nprobability = 1.5\n[stopping-condition]\ntype = \"optimal\"\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                key: "mutation probability",
                ..
            }
        ));
    }

    #[test]
    fn test_neat_configuration() {
        let config = SearchConfiguration::from_toml_str(
            r#"
            algorithm = "neat"
            population-size = 60
            wait-step-upper-bound = 50

            [neat]
            number-of-species = 6
            timeout = 900
            network-fitness = { type = "survive", timeout = 900 }

            [mutation]
            mutation-add-node = 0.05

            [compatibility]
            distance-threshold = 2.5

            [stopping-condition]
            type = "evaluations"
            max-evaluations = 600
            "#,
        )
        .unwrap();
        assert_eq!(config.chromosome, ChromosomeKind::Network);
        assert_eq!(config.neat.population_size, 60);
        assert_eq!(config.neat.number_of_species, 6);
        assert_eq!(config.neat.timeout, 900);
        assert_eq!(
            config.neat.network_fitness,
            NetworkFitness::Survive { timeout: 900 }
        );
        assert!((config.neat.mutation.mutation_add_node - 0.05).abs() < 1e-12);
        assert!((config.neat.compatibility.distance_threshold - 2.5).abs() < 1e-12);
        assert_eq!(config.bounds.wait_step_upper_bound, 50);
        assert!(config.neat().is_ok());
        assert!(config.search_algorithm::<TestChromosome>().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            SearchConfiguration::from_toml_str("algorithm = "),
            Err(ConfigError::Parse(_))
        ));
    }
}
