//! Event extraction: turning program state into the finite set of actions a
//! test can take next.
//!
//! All extractors return events deduplicated by [`Event::identifier`].
//! Extraction is deterministic for a given program state and random seed.

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::event::{distinct_events, Event, EventBounds};
use crate::program::{Block, ProgramState, Script, Target};
use crate::randomness::Randomness;

/// Number of retries after a failed extraction before falling back to a
/// wait-only event set.
pub const MAX_EXTRACTION_RETRIES: usize = 5;

/// Hat opcodes that other blocks can trigger during a step.
const BLOCK_TRIGGERED_HATS: [&str; 3] = [
    "event_whenbroadcastreceived",
    "event_whenbackdropswitchesto",
    "control_start_as_clone",
];

/// The available extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorKind {
    /// Whole-program scan ignoring the runtime state.
    Static,
    /// Only events reachable from currently active control flow.
    #[default]
    Dynamic,
    /// Every event kind the program could react to, unfiltered.
    Naive,
    /// A single wait event.
    Wait,
    /// Dynamic extraction without drag-style events.
    Neuroevolution,
}

/// Extracts applicable events from a [`ProgramState`].
#[derive(Debug, Clone)]
pub struct EventExtractor {
    kind: ExtractorKind,
    bounds: EventBounds,
}

impl EventExtractor {
    #[must_use]
    pub fn new(kind: ExtractorKind, bounds: EventBounds) -> Self {
        Self { kind, bounds }
    }

    #[must_use]
    pub fn kind(&self) -> ExtractorKind {
        self.kind
    }

    #[must_use]
    pub fn bounds(&self) -> &EventBounds {
        &self.bounds
    }

    /// Extract the events applicable in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] when the program structure is malformed
    /// (e.g. a sensing block without its menu input).
    pub fn extract_events(
        &self,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Result<Vec<Event>, ExtractionError> {
        match self.kind {
            ExtractorKind::Static => self.extract_static(state, rng),
            ExtractorKind::Dynamic => self.extract_dynamic(state, rng),
            ExtractorKind::Naive => self.extract_naive(state, rng),
            ExtractorKind::Wait => Ok(vec![Event::wait()]),
            ExtractorKind::Neuroevolution => Ok(self
                .extract_dynamic(state, rng)?
                .into_iter()
                .filter(|event| !event.is_continuous())
                .collect()),
        }
    }

    /// Whole-program extraction, used to size network outputs before any
    /// playthrough. Neuroevolution drops drag-style events here as well.
    ///
    /// # Errors
    ///
    /// Same as [`extract_events`](Self::extract_events).
    pub fn extract_static_events(
        &self,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Result<Vec<Event>, ExtractionError> {
        let events = self.extract_static(state, rng)?;
        if self.kind == ExtractorKind::Neuroevolution {
            Ok(events.into_iter().filter(|e| !e.is_continuous()).collect())
        } else {
            Ok(events)
        }
    }

    /// Extract with the bounded retry policy; never fails.
    ///
    /// After [`MAX_EXTRACTION_RETRIES`] failed retries a wait-only set is
    /// returned and a warning is logged.
    pub fn extract_or_wait(&self, state: &ProgramState, rng: &mut Randomness) -> Vec<Event> {
        extract_with_retry(|| self.extract_events(state, rng))
    }

    fn extract_static(
        &self,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Result<Vec<Event>, ExtractionError> {
        let mut events = Vec::new();
        for target in &state.targets {
            for script in &target.scripts {
                events.extend(self.events_from_block(target, &script.hat, state, rng)?);
                self.traverse(target, &script.body, state, rng, &mut events, &mut HashSet::new())?;
            }
        }
        events.push(Event::wait());
        Ok(distinct_events(events))
    }

    fn extract_dynamic(
        &self,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Result<Vec<Event>, ExtractionError> {
        let mut events = Vec::new();
        for target in &state.targets {
            for script in &target.scripts {
                let active = state.active_scripts.contains(&script.id)
                    || triggered_by_block(script, state);
                if active {
                    // Running scripts cannot be re-triggered; look for handlers below the hat.
                    self.traverse(
                        target,
                        &script.body,
                        state,
                        rng,
                        &mut events,
                        &mut HashSet::new(),
                    )?;
                } else {
                    events.extend(self.events_from_block(target, &script.hat, state, rng)?);
                }
            }
        }

        if events.iter().any(Event::is_text_input) {
            events.retain(Event::is_text_input);
        } else {
            events.push(Event::wait());
        }
        Ok(distinct_events(events))
    }

    fn extract_naive(
        &self,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Result<Vec<Event>, ExtractionError> {
        let mut events = self.extract_static(state, rng)?;
        for target in state.targets.iter().filter(|t| !t.is_stage && t.visible) {
            events.push(Event::ClickSprite {
                target: target.name.clone(),
                steps: self.bounds.click_duration,
            });
        }
        events.push(Event::ClickStage);
        events.push(Event::MouseMove { x: 0.0, y: 0.0 });
        events.push(Event::MouseDown { down: true });
        Ok(distinct_events(events))
    }

    fn traverse(
        &self,
        target: &Target,
        blocks: &[Block],
        state: &ProgramState,
        rng: &mut Randomness,
        found: &mut Vec<Event>,
        visited_procedures: &mut HashSet<String>,
    ) -> Result<(), ExtractionError> {
        for block in blocks {
            found.extend(self.events_from_block(target, block, state, rng)?);
            for input in &block.inputs {
                self.traverse(
                    target,
                    std::slice::from_ref(input),
                    state,
                    rng,
                    found,
                    visited_procedures,
                )?;
            }
            for branch in &block.substacks {
                self.traverse(target, branch, state, rng, found, visited_procedures)?;
            }
            if block.opcode == "procedures_call" {
                let proccode = block
                    .field("proccode")
                    .ok_or_else(|| missing(block, "proccode"))?;
                if visited_procedures.insert(proccode.to_string()) {
                    if let Some(body) = target.procedures.get(proccode) {
                        self.traverse(target, body, state, rng, found, visited_procedures)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn events_from_block(
        &self,
        target: &Target,
        block: &Block,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Result<Vec<Event>, ExtractionError> {
        let mut events = Vec::new();
        match block.opcode.as_str() {
            "event_whenkeypressed" => {
                let key = block
                    .field("KEY_OPTION")
                    .ok_or_else(|| missing(block, "KEY_OPTION"))?;
                events.push(key_press(key));
            }
            "sensing_keypressed" => {
                let key = menu_value(block, "KEY_OPTION")?;
                events.push(key_press(key));
            }
            "sensing_mousex" | "sensing_mousey" | "pen_penDown" => {
                events.push(Event::MouseMove { x: 0.0, y: 0.0 });
            }
            "motion_goto" | "motion_pointtowards" | "sensing_distanceto" => {
                let menu = match block.opcode.as_str() {
                    "motion_goto" => "TO",
                    "motion_pointtowards" => "TOWARDS",
                    _ => "DISTANCETOMENU",
                };
                if menu_value(block, menu)? == "_mouse_" {
                    events.push(Event::MouseMove { x: 0.0, y: 0.0 });
                }
            }
            "sensing_touchingobject" => {
                let sensed = menu_value(block, "TOUCHINGOBJECTMENU")?;
                events.extend(self.touching_events(target, sensed, state, rng));
            }
            "sensing_mousedown" => events.push(Event::MouseDown { down: true }),
            "event_whenthisspriteclicked" if target.visible => {
                events.push(Event::ClickSprite {
                    target: target.name.clone(),
                    steps: self.bounds.click_duration,
                });
            }
            "event_whenstageclicked" => events.push(Event::ClickStage),
            "sensing_askandwait" => {
                if state.text_snippets.is_empty() {
                    events.push(Event::TypeText { text: "0".into() });
                } else {
                    events.extend(
                        state
                            .text_snippets
                            .iter()
                            .map(|text| Event::TypeText { text: text.clone() }),
                    );
                }
            }
            "event_whengreaterthan" if block.field("WHENGREATERTHANMENU") == Some("LOUDNESS") => {
                events.push(Event::Sound { volume: 0.0 });
            }
            "sensing_loudness" => events.push(Event::Sound { volume: 0.0 }),
            _ => {}
        }
        Ok(events)
    }

    fn touching_events(
        &self,
        target: &Target,
        sensed: &str,
        state: &ProgramState,
        rng: &mut Randomness,
    ) -> Vec<Event> {
        match sensed {
            "_mouse_" => vec![
                Event::MouseMoveTo {
                    x: target.x,
                    y: target.y,
                },
                Event::MouseMove { x: 0.0, y: 0.0 },
            ],
            "_edge_" => {
                let half_width = self.bounds.stage_width / 2.0;
                let half_height = self.bounds.stage_height / 2.0;
                let (x, y) = if rng.coin() {
                    let x = if rng.coin() { -half_width } else { half_width };
                    (x, rng.next_double_between(-half_height, half_height))
                } else {
                    let y = if rng.coin() { -half_height } else { half_height };
                    (rng.next_double_between(-half_width, half_width), y)
                };
                vec![Event::DragSprite {
                    target: target.name.clone(),
                    x,
                    y,
                }]
            }
            other => match state.target(other) {
                // Statements guarded by sensing an absent sprite are unreachable.
                None => Vec::new(),
                Some(sensed_target) => vec![Event::DragSprite {
                    target: target.name.clone(),
                    x: sensed_target.x,
                    y: sensed_target.y,
                }],
            },
        }
    }
}

/// Run `attempt` until it succeeds, at most `1 + MAX_EXTRACTION_RETRIES`
/// times, falling back to a wait-only set.
pub fn extract_with_retry<F>(mut attempt: F) -> Vec<Event>
where
    F: FnMut() -> Result<Vec<Event>, ExtractionError>,
{
    let mut retries = 0;
    loop {
        match attempt() {
            Ok(events) => return events,
            Err(err) if retries < MAX_EXTRACTION_RETRIES => {
                retries += 1;
                warn!("{err}; retrying event extraction ({retries}/{MAX_EXTRACTION_RETRIES})");
            }
            Err(err) => {
                warn!(
                    "event extraction kept failing ({err}); continuing with a wait-only event set"
                );
                return vec![Event::wait()];
            }
        }
    }
}

fn triggered_by_block(script: &Script, state: &ProgramState) -> bool {
    BLOCK_TRIGGERED_HATS.contains(&script.hat.opcode.as_str())
        && state.last_step_coverage.contains(&script.hat.id)
}

fn key_press(key: &str) -> Event {
    Event::KeyPress {
        key: key.to_string(),
        steps: 1,
    }
}

fn menu_value<'a>(block: &'a Block, field: &'static str) -> Result<&'a str, ExtractionError> {
    block
        .inputs
        .iter()
        .find_map(|input| input.field(field))
        .or_else(|| block.field(field))
        .ok_or_else(|| missing(block, field))
}

fn missing(block: &Block, field: &str) -> ExtractionError {
    ExtractionError(format!(
        "block `{}` ({}) has no `{field}`",
        block.id, block.opcode
    ))
}
