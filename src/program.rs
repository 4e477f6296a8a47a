//! Read-only model of the program-under-test and the driver interface.
//!
//! The search never looks inside the execution engine. It only needs the
//! structure exposed by [`ProgramState`] (for event extraction) and the
//! operations of [`ProgramUnderTest`] (to run playthroughs).

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::event::Event;

/// Opaque identifier of a coverable program location (e.g. a block id).
pub type LocationId = String;

/// One statement of a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub opcode: String,
    /// Menu and field values, e.g. `KEY_OPTION -> "space"`.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Nested branches (`if`, `else`, loop bodies).
    #[serde(default)]
    pub substacks: Vec<Vec<Block>>,
    /// Reporter blocks plugged into this block's inputs (conditions, operands).
    #[serde(default)]
    pub inputs: Vec<Block>,
}

impl Block {
    /// Convenience constructor for tests and fakes.
    #[must_use]
    pub fn new(id: impl Into<String>, opcode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opcode: opcode.into(),
            ..Self::default()
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style input setter.
    #[must_use]
    pub fn with_input(mut self, input: Block) -> Self {
        self.inputs.push(input);
        self
    }

    /// Builder-style branch setter.
    #[must_use]
    pub fn with_substack(mut self, blocks: Vec<Block>) -> Self {
        self.substacks.push(blocks);
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A hat block and the statements it triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub hat: Block,
    #[serde(default)]
    pub body: Vec<Block>,
}

/// A sprite or the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub is_stage: bool,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub scripts: Vec<Script>,
    /// Custom procedure bodies keyed by their signature.
    #[serde(default)]
    pub procedures: BTreeMap<String, Vec<Block>>,
}

fn default_visible() -> bool {
    true
}

/// Snapshot of the running program used for event extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramState {
    pub targets: Vec<Target>,
    /// Ids of scripts that currently own a running thread.
    #[serde(default)]
    pub active_scripts: HashSet<String>,
    /// Locations covered during the previous step only.
    #[serde(default)]
    pub last_step_coverage: HashSet<LocationId>,
    /// Literal text found in the program, offered as answers to questions.
    #[serde(default)]
    pub text_snippets: Vec<String>,
}

impl ProgramState {
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Every location that a complete playthrough could cover.
    #[must_use]
    pub fn all_locations(&self) -> BTreeSet<LocationId> {
        fn walk(blocks: &[Block], out: &mut BTreeSet<LocationId>) {
            for block in blocks {
                out.insert(block.id.clone());
                for branch in &block.substacks {
                    walk(branch, out);
                }
            }
        }

        let mut locations = BTreeSet::new();
        for target in &self.targets {
            for script in &target.scripts {
                locations.insert(script.hat.id.clone());
                walk(&script.body, &mut locations);
            }
        }
        locations
    }
}

/// Driver for the program-under-test.
///
/// Every async method is a suspension point: control goes to the engine,
/// which advances simulated time before resuming the search. Only one
/// playthrough is ever in flight.
#[async_trait(?Send)]
pub trait ProgramUnderTest {
    /// Restore the initial state before a new playthrough.
    async fn reset(&mut self) -> Result<(), ExecutionError>;

    /// Perform one action, advancing simulated time by at least one step.
    async fn apply_event(&mut self, event: &Event) -> Result<(), ExecutionError>;

    /// Current program state, read by the event extractors.
    fn state(&self) -> &ProgramState;

    /// Locations covered since the last reset.
    fn coverage(&self) -> BTreeSet<LocationId>;

    /// Whether the program still has running threads.
    fn is_running(&self) -> bool;

    /// Simulated steps elapsed since the last reset.
    fn current_step(&self) -> u64;

    /// Feature vector describing the current state, fed to networks.
    fn input_features(&self) -> Vec<f64>;

    /// Game score, if the program keeps one.
    fn score(&self) -> f64 {
        0.0
    }

    /// Distance to flipping each evaluated branch condition, per location.
    fn branch_distances(&self) -> BTreeMap<LocationId, f64> {
        BTreeMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_locations_walks_branches() {
        let body = vec![Block::new("if", "control_if")
            .with_substack(vec![Block::new("say", "looks_say")])];
        let state = ProgramState {
            targets: vec![Target {
                name: "Cat".into(),
                is_stage: false,
                x: 0.0,
                y: 0.0,
                visible: true,
                scripts: vec![Script {
                    id: "hat".into(),
                    hat: Block::new("hat", "event_whenflagclicked"),
                    body,
                }],
                procedures: BTreeMap::new(),
            }],
            ..ProgramState::default()
        };

        let locations = state.all_locations();
        assert_eq!(locations.len(), 3);
        assert!(locations.contains("say"));
    }
}
