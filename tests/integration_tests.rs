//! Integration tests for symbios-testgen.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use symbios_testgen::neat::mutation::NeatMutation;
use symbios_testgen::program::{Block, Script, Target};
use symbios_testgen::search::BoxedFitness;
use symbios_testgen::{
    Archive, BitstringChromosome, BitstringChromosomeGenerator, Chromosome, ChromosomeId,
    DirectEvaluator, Event, EventBounds, EventExtractor, EventSelection, EventSelector, Evaluator,
    ExecutionError, ExecutionTrace, ExtractorKind, InnovationTracker, ListCrossover, LocationId,
    Mosa, Neat, NeatProperties, NetworkChromosome, NetworkEvaluator, NetworkExecutor,
    NetworkGenerator, OneMax, ProgramState, ProgramUnderTest, Randomness, SearchAlgorithm,
    SearchConfiguration, SearchProperties, SimpleGa, StatementFitness, StoppingCondition,
    TestChromosome, TestExecutor,
};

/// Steps after which the game is over.
const GAME_LENGTH: u64 = 400;

/// A tiny key-driven game: the left and right arrow scripts move the cat,
/// and a second right press reaches a bonus branch.
struct CatchGame {
    state: ProgramState,
    covered: BTreeSet<LocationId>,
    step: u64,
    right_presses: u32,
}

impl CatchGame {
    fn new() -> Self {
        let key_script = |id: &str, key: &str, body: Vec<Block>| Script {
            id: id.into(),
            hat: Block::new(id, "event_whenkeypressed").with_field("KEY_OPTION", key),
            body,
        };
        let cat = Target {
            name: "Cat".into(),
            is_stage: false,
            x: 0.0,
            y: 0.0,
            visible: true,
            scripts: vec![
                key_script(
                    "left",
                    "left arrow",
                    vec![Block::new("move-left", "motion_changexby")],
                ),
                key_script(
                    "right",
                    "right arrow",
                    vec![
                        Block::new("move-right", "motion_changexby"),
                        Block::new("check", "control_if")
                            .with_substack(vec![Block::new("bonus", "looks_say")]),
                    ],
                ),
            ],
            procedures: Default::default(),
        };
        Self {
            state: ProgramState {
                targets: vec![cat],
                ..ProgramState::default()
            },
            covered: BTreeSet::new(),
            step: 0,
            right_presses: 0,
        }
    }

    fn cover(&mut self, locations: &[&str]) {
        self.covered
            .extend(locations.iter().map(|location| (*location).to_string()));
    }
}

#[async_trait(?Send)]
impl ProgramUnderTest for CatchGame {
    async fn reset(&mut self) -> Result<(), ExecutionError> {
        self.covered.clear();
        self.step = 0;
        self.right_presses = 0;
        Ok(())
    }

    async fn apply_event(&mut self, event: &Event) -> Result<(), ExecutionError> {
        match event {
            Event::Wait { steps } => self.step += u64::from((*steps).max(1)),
            Event::KeyPress { key, steps } => {
                self.step += u64::from((*steps).max(1));
                match key.as_str() {
                    "left arrow" => self.cover(&["left", "move-left"]),
                    "right arrow" => {
                        self.right_presses += 1;
                        self.cover(&["right", "move-right", "check"]);
                        if self.right_presses >= 2 {
                            self.cover(&["bonus"]);
                        }
                    }
                    _ => {}
                }
            }
            _ => self.step += 1,
        }
        Ok(())
    }

    fn state(&self) -> &ProgramState {
        &self.state
    }

    fn coverage(&self) -> BTreeSet<LocationId> {
        self.covered.clone()
    }

    fn is_running(&self) -> bool {
        self.step < GAME_LENGTH
    }

    fn current_step(&self) -> u64 {
        self.step
    }

    fn input_features(&self) -> Vec<f64> {
        vec![
            self.step as f64 / GAME_LENGTH as f64,
            f64::from(self.right_presses),
        ]
    }

    fn score(&self) -> f64 {
        self.covered.len() as f64
    }
}

fn game_objectives<C: Chromosome + 'static>(game: &CatchGame) -> Vec<BoxedFitness<C>> {
    StatementFitness::for_program(game.state())
        .into_iter()
        .map(|function| Box::new(function) as BoxedFitness<C>)
        .collect()
}

fn test_executor() -> TestExecutor<CatchGame> {
    TestExecutor::new(
        CatchGame::new(),
        EventExtractor::new(ExtractorKind::Dynamic, EventBounds::default()),
        EventSelector::Interleaving,
        (0, 420),
    )
}

#[tokio::test]
async fn test_one_of_fixed_iteration_stops_exactly() {
    let mut rng = Randomness::new(42);
    let mut search = SimpleGa::<BitstringChromosome>::new();
    search.set_properties(SearchProperties {
        population_size: 10,
        ..SearchProperties::default()
    });
    search.set_chromosome_generator(Box::new(BitstringChromosomeGenerator::new(
        200,
        ListCrossover::SinglePoint,
    )));
    search.set_fitness_functions(vec![
        Box::new(OneMax::new(200)) as BoxedFitness<BitstringChromosome>
    ]);
    search.set_stopping_condition(StoppingCondition::OneOf {
        conditions: vec![
            StoppingCondition::FixedIteration { iterations: 20 },
            StoppingCondition::Evaluations {
                max_evaluations: 1_000_000,
            },
        ],
    });

    search
        .find_solution(&mut DirectEvaluator, &mut rng)
        .await
        .unwrap();
    assert_eq!(search.iterations(), 20);
}

/// Crashes on every second playthrough and remembers whom it crashed on.
#[derive(Default)]
struct FlakyEvaluator {
    calls: usize,
    crashed: HashSet<ChromosomeId>,
}

#[async_trait(?Send)]
impl Evaluator<BitstringChromosome> for FlakyEvaluator {
    async fn evaluate(
        &mut self,
        chromosome: &mut BitstringChromosome,
        _rng: &mut Randomness,
    ) -> Result<usize, ExecutionError> {
        self.calls += 1;
        if self.calls % 2 == 0 {
            self.crashed.insert(chromosome.id());
            return Err(ExecutionError::Crashed("segfault in sprite".into()));
        }
        chromosome.evaluation_mut().complete(ExecutionTrace::new());
        Ok(0)
    }
}

#[tokio::test]
async fn test_failed_playthroughs_do_not_abort_the_search() {
    let mut rng = Randomness::new(8);
    let mut search = SimpleGa::<BitstringChromosome>::new();
    search.set_properties(SearchProperties {
        population_size: 10,
        ..SearchProperties::default()
    });
    search.set_chromosome_generator(Box::new(BitstringChromosomeGenerator::new(
        4,
        ListCrossover::SinglePoint,
    )));
    search.set_fitness_functions(vec![
        Box::new(OneMax::new(4)) as BoxedFitness<BitstringChromosome>
    ]);
    search.set_stopping_condition(StoppingCondition::FixedIteration { iterations: 5 });

    let mut evaluator = FlakyEvaluator::default();
    let result = search.find_solution(&mut evaluator, &mut rng).await;
    assert!(result.is_ok());
    assert_eq!(search.iterations(), 5);
    assert!(!evaluator.crashed.is_empty());
    assert_eq!(search.statistics().evaluations, evaluator.calls);

    let archive = search.archive();
    for objective in archive.objectives() {
        let archived = archive.get(objective).unwrap();
        assert!(!archived.evaluation().is_failed());
        assert!(!evaluator.crashed.contains(&archived.id()));
    }
}

#[tokio::test]
async fn test_test_executor_replays_codons() {
    let mut rng = Randomness::new(1);
    let mut executor = test_executor();
    // Available events are [left, right, wait]: right, right, left, wait 9
    let codons = vec![1, 0, 1, 0, 0, 0, 2, 9];
    let mut test = TestChromosome::new(
        codons,
        symbios_testgen::operators::mutation::VariableLengthMutation::new(0, 420, 20, 5.0),
        ListCrossover::SinglePoint,
    );

    let executed = executor.evaluate(&mut test, &mut rng).await.unwrap();
    assert_eq!(executed, 4);
    let trace = test.trace().unwrap();
    assert!(trace.covers("bonus"));
    assert!(trace.covers("move-left"));
    assert!(matches!(trace.events[3].event, Event::Wait { .. }));
    assert_eq!(trace.events[3].codon_end, 8);
    assert!(trace.program_running);
    assert_eq!(trace.last_improving_event(), Some(2));

    // Same codons, same playthrough
    let mut replay = test.clone_with(test.codons().to_vec());
    executor.evaluate(&mut replay, &mut rng).await.unwrap();
    assert_eq!(replay.coverage(), test.coverage());
}

#[tokio::test]
async fn test_mosa_covers_the_game() {
    let mut rng = Randomness::new(7);
    let config = SearchConfiguration::from_toml_str(
        r#"
        algorithm = "mosa"
        chromosome = "test"
        population-size = 10
        chromosome-length = 20

        [stopping-condition]
        type = "one-of"
        conditions = [{ type = "optimal" }, { type = "fixed-iteration", iterations = 100 }]

        [[local-search]]
        type = "reduction"
        probability = 1.0
        "#,
    )
    .unwrap();

    let mut executor = test_executor();
    let mut search = config.search_algorithm::<TestChromosome>().unwrap();
    search.set_chromosome_generator(Box::new(config.test_generator().unwrap()));
    search.set_fitness_functions(game_objectives(executor.program()));
    for operator in config.local_search_operators() {
        search.add_local_search(operator);
    }

    let solutions = search.find_solution(&mut executor, &mut rng).await.unwrap();
    let statistics = search.statistics();
    assert_eq!(statistics.total_objectives, 6);
    assert!(statistics.is_fully_covered());
    assert!(search.archive().contains("bonus"));
    assert_eq!(search.archive().len(), 6);
    assert!(!solutions.is_empty());
}

#[tokio::test]
async fn test_mosa_iteration_budget_with_unreachable_goal() {
    let mut rng = Randomness::new(3);
    let mut executor = test_executor();
    let mut objectives = game_objectives::<TestChromosome>(executor.program());
    objectives.push(Box::new(StatementFitness::new("unreachable", Vec::new())));

    let mut search = Mosa::<TestChromosome>::new();
    search.set_properties(SearchProperties {
        population_size: 6,
        ..SearchProperties::default()
    });
    search.set_chromosome_generator(Box::new(
        symbios_testgen::TestChromosomeGenerator::new(
            2,
            symbios_testgen::operators::mutation::VariableLengthMutation::new(0, 420, 10, 5.0),
            ListCrossover::SinglePoint,
        ),
    ));
    search.set_fitness_functions(objectives);
    search.set_stopping_condition(StoppingCondition::OneOf {
        conditions: vec![
            StoppingCondition::Optimal,
            StoppingCondition::FixedIteration { iterations: 20 },
        ],
    });

    search.find_solution(&mut executor, &mut rng).await.unwrap();
    assert_eq!(search.iterations(), 20);
    assert!(!search.archive().contains("unreachable"));
}

#[tokio::test]
async fn test_neat_plays_the_game() {
    let mut rng = Randomness::new(11);
    let game = CatchGame::new();
    let extractor = EventExtractor::new(ExtractorKind::Neuroevolution, EventBounds::default());
    let properties = NeatProperties {
        population_size: 10,
        number_of_species: 2,
        timeout: 100,
        ..NeatProperties::default()
    };
    let generator = NetworkGenerator::from_program(&game, &extractor, &properties, &mut rng);
    assert_eq!(generator.events().len(), 3);
    let objectives = game_objectives::<NetworkChromosome>(&game);

    let mut executor =
        NetworkExecutor::new(game, extractor, EventSelection::Activation, properties.timeout);
    let mut neat = Neat::new();
    neat.set_properties(properties);
    neat.set_chromosome_generator(generator);
    neat.set_fitness_functions(objectives);
    neat.set_stopping_condition(StoppingCondition::FixedIteration { iterations: 3 });

    neat.find_solution(&mut executor, &mut rng).await.unwrap();
    assert_eq!(neat.iterations(), 3);
    assert_eq!(neat.statistics().evaluations, 30);
    assert!(neat.statistics().executed_events >= 30);
    let population = neat.population().unwrap();
    assert!(population.networks().iter().all(NetworkChromosome::is_consistent));
    assert!(population.champion().is_some());
}

#[test]
fn test_identical_mutations_share_innovations() {
    let events = vec![Event::wait(), Event::ClickStage];
    let mut tracker = InnovationTracker::new();
    let mut rng = Randomness::new(5);
    let mut first = NetworkChromosome::minimal(2, &events);
    first.connect_sources_to_outputs(&mut tracker, 1.0, 1.0, &mut rng);
    let mut second = first.clone_structure();

    let split_first = first.connections.keys().next().unwrap();
    let innovation = first.connections[split_first].innovation;
    let split_second = second.find_connection_by_innovation(innovation).unwrap();

    let hidden_first = first
        .add_node(split_first, symbios_testgen::Activation::Sigmoid, &mut tracker)
        .unwrap();
    let hidden_second = second
        .add_node(split_second, symbios_testgen::Activation::Sigmoid, &mut tracker)
        .unwrap();
    assert_eq!(first.nodes[hidden_first].uid, second.nodes[hidden_second].uid);

    let innovations = |network: &NetworkChromosome| -> BTreeSet<u64> {
        network.connections.values().map(|c| c.innovation).collect()
    };
    assert_eq!(innovations(&first), innovations(&second));

    // The next generation numbers the same split anew
    tracker.new_generation();
    let mut third = second.clone_structure();
    let split_third = third
        .connections
        .iter()
        .find(|(_, c)| c.enabled && c.innovation != innovation)
        .map(|(id, _)| id)
        .unwrap();
    let before = tracker.next_innovation();
    third
        .add_node(split_third, symbios_testgen::Activation::Sigmoid, &mut tracker)
        .unwrap();
    assert_eq!(tracker.next_innovation(), before + 2);
}

#[test]
fn test_mutation_never_leaves_dangling_references() {
    let events = vec![Event::wait(), Event::ClickStage, Event::MouseDown { down: true }];
    let properties = NeatProperties::default();
    let mut mutation_rates = properties.mutation.clone();
    mutation_rates.mutation_add_node = 0.5;
    mutation_rates.mutation_add_connection = 0.8;
    mutation_rates.recurrent_connection = 0.5;
    let mutation = NeatMutation::new(mutation_rates);
    let mut tracker = InnovationTracker::new();
    let mut rng = Randomness::new(99);

    let mut network = NetworkChromosome::minimal(3, &events);
    network.connect_sources_to_outputs(&mut tracker, 0.6, 1.0, &mut rng);
    for _ in 0..200 {
        network = mutation.apply(&network, &mut tracker, &mut rng);
        assert!(network.is_consistent());
        for connection in network.connections.values() {
            assert!(network.nodes.contains_key(connection.source));
            assert!(network.nodes.contains_key(connection.target));
        }
        let mut evaluator = NetworkEvaluator::try_new(&network).unwrap();
        let outputs = evaluator.activate(&[0.1, 0.2, 0.3]);
        assert!(outputs.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_extraction_is_deterministic() {
    let game = CatchGame::new();
    for kind in [
        ExtractorKind::Static,
        ExtractorKind::Dynamic,
        ExtractorKind::Naive,
        ExtractorKind::Neuroevolution,
    ] {
        let extractor = EventExtractor::new(kind, EventBounds::default());
        let first = extractor
            .extract_events(game.state(), &mut Randomness::new(17))
            .unwrap();
        let second = extractor
            .extract_events(game.state(), &mut Randomness::new(17))
            .unwrap();
        assert_eq!(first, second, "{kind:?}");
        let identities: BTreeSet<String> = first.iter().map(Event::identifier).collect();
        assert_eq!(identities.len(), first.len(), "{kind:?} returned duplicates");
    }
}

#[test]
fn test_archive_resubmission_is_idempotent() {
    let functions: Vec<BoxedFitness<BitstringChromosome>> = vec![Box::new(OneMax::new(4))];
    let mut archive = Archive::new();
    let mut optimal = BitstringChromosome::new(
        vec![true; 4],
        Default::default(),
        ListCrossover::SinglePoint,
    );
    optimal.evaluation_mut().complete(Default::default());

    assert_eq!(archive.update(&mut optimal, &functions), 1);
    let kept = archive.get("one-max").unwrap().id();

    let mut same = optimal.clone_with(vec![true; 4]);
    same.evaluation_mut().complete(Default::default());
    assert_eq!(archive.update(&mut same, &functions), 0);
    assert_eq!(archive.update(&mut optimal, &functions), 0);
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.get("one-max").unwrap().id(), kept);
}
