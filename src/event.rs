//! Executable actions a test can send to the program-under-test.
//!
//! An [`Event`] is produced by an event extractor and carries its own
//! parameters. Parameters are filled in later from the chromosome (codons
//! for test chromosomes, regression outputs for networks) through
//! [`Event::set_parameters`], always bounded by [`EventBounds`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bounds applied when decoding event parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventBounds {
    /// Maximum number of steps a wait may last.
    pub wait_step_upper_bound: u32,
    /// Maximum number of steps a key may be held.
    pub press_duration_upper_bound: u32,
    /// Number of steps a sprite click lasts.
    pub click_duration: u32,
    /// Stage width in program coordinates.
    pub stage_width: f64,
    /// Stage height in program coordinates.
    pub stage_height: f64,
}

impl Default for EventBounds {
    fn default() -> Self {
        Self {
            wait_step_upper_bound: 200,
            press_duration_upper_bound: 50,
            click_duration: 10,
            stage_width: 480.0,
            stage_height: 360.0,
        }
    }
}

/// An action applicable to the running program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Let simulated time advance.
    Wait { steps: u32 },
    /// Hold a key for a number of steps.
    KeyPress { key: String, steps: u32 },
    /// Move the mouse pointer to a parametrised position.
    MouseMove { x: f64, y: f64 },
    /// Move the mouse pointer to a fixed position (e.g. onto a sprite).
    MouseMoveTo { x: f64, y: f64 },
    /// Press or release the mouse button.
    MouseDown { down: bool },
    /// Click on a sprite.
    ClickSprite { target: String, steps: u32 },
    /// Click on the stage.
    ClickStage,
    /// Answer a pending text question.
    TypeText { text: String },
    /// Drag a sprite to a position.
    DragSprite { target: String, x: f64, y: f64 },
    /// Produce microphone loudness.
    Sound { volume: f64 },
}

impl Event {
    /// A single-step wait, the minimal safe action.
    #[must_use]
    pub fn wait() -> Self {
        Self::Wait { steps: 1 }
    }

    /// Number of parameters this event consumes from the chromosome.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        match self {
            Self::Wait { .. } | Self::KeyPress { .. } | Self::Sound { .. } => 1,
            Self::MouseMove { .. } => 2,
            Self::MouseMoveTo { .. }
            | Self::MouseDown { .. }
            | Self::ClickSprite { .. }
            | Self::ClickStage
            | Self::TypeText { .. }
            | Self::DragSprite { .. } => 0,
        }
    }

    /// Current parameter values.
    #[must_use]
    pub fn parameters(&self) -> Vec<f64> {
        match self {
            Self::Wait { steps } | Self::KeyPress { steps, .. } => vec![f64::from(*steps)],
            Self::MouseMove { x, y } => vec![*x, *y],
            Self::Sound { volume } => vec![*volume],
            _ => Vec::new(),
        }
    }

    /// Decode raw parameter values into this event, folding them into the
    /// valid range. Missing values leave the current parameter untouched.
    pub fn set_parameters(&mut self, args: &[f64], bounds: &EventBounds) {
        match self {
            Self::Wait { steps } => {
                if let Some(&arg) = args.first() {
                    *steps = fold_duration(arg, bounds.wait_step_upper_bound);
                }
            }
            Self::KeyPress { steps, .. } => {
                if let Some(&arg) = args.first() {
                    *steps = fold_duration(arg, bounds.press_duration_upper_bound);
                }
            }
            Self::MouseMove { x, y } => {
                if let Some(&arg) = args.first() {
                    *x = fold_coordinate(arg, bounds.stage_width);
                }
                if let Some(&arg) = args.get(1) {
                    *y = fold_coordinate(arg, bounds.stage_height);
                }
            }
            Self::Sound { volume } => {
                if let Some(&arg) = args.first() {
                    *volume = arg.abs() % 101.0;
                }
            }
            _ => {}
        }
    }

    /// Scale factor turning a network regression output (roughly in
    /// `[-1, 1]`) into the raw parameter space of [`set_parameters`](Self::set_parameters).
    #[must_use]
    pub fn parameter_scale(&self, index: usize, bounds: &EventBounds) -> f64 {
        match self {
            Self::Wait { .. } => f64::from(bounds.wait_step_upper_bound),
            Self::KeyPress { .. } => f64::from(bounds.press_duration_upper_bound),
            Self::MouseMove { .. } if index == 0 => bounds.stage_width / 2.0,
            Self::MouseMove { .. } => bounds.stage_height / 2.0,
            Self::Sound { .. } => 100.0,
            _ => 1.0,
        }
    }

    /// Structural identity used to deduplicate semantically identical events.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Self::Wait { .. } => "Wait".to_string(),
            Self::KeyPress { key, .. } => format!("KeyPress-{key}"),
            Self::MouseMove { .. } => "MouseMove".to_string(),
            Self::MouseMoveTo { x, y } => format!("MouseMoveTo-{}-{}", x.trunc(), y.trunc()),
            Self::MouseDown { down } => format!("MouseDown-{down}"),
            Self::ClickSprite { target, .. } => format!("ClickSprite-{target}"),
            Self::ClickStage => "ClickStage".to_string(),
            Self::TypeText { text } => format!("TypeText-{text}"),
            Self::DragSprite { target, .. } => format!("DragSprite-{target}"),
            Self::Sound { .. } => "Sound".to_string(),
        }
    }

    /// Whether this is a text-input event, which takes priority whenever the
    /// program waits for an answer.
    #[must_use]
    pub fn is_text_input(&self) -> bool {
        matches!(self, Self::TypeText { .. })
    }

    /// Drag-style events with continuous targets. Excluded from
    /// neuroevolution, where every event needs a discrete output node.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::DragSprite { .. })
    }

    /// Minimum number of simulated steps this event advances time by.
    #[must_use]
    pub fn steps(&self, bounds: &EventBounds) -> u32 {
        match self {
            Self::Wait { steps } | Self::KeyPress { steps, .. } => (*steps).max(1),
            Self::ClickSprite { .. } => bounds.click_duration.max(1),
            _ => 1,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wait { steps } => write!(f, "Wait for {steps} steps"),
            Self::KeyPress { key, steps } => write!(f, "KeyPress {key} for {steps} steps"),
            Self::MouseMove { x, y } => write!(f, "MouseMove {}/{}", x.trunc(), y.trunc()),
            Self::MouseMoveTo { x, y } => write!(f, "MouseMoveTo {}/{}", x.trunc(), y.trunc()),
            Self::MouseDown { down } => write!(f, "MouseDown {down}"),
            Self::ClickSprite { target, .. } => write!(f, "ClickSprite {target}"),
            Self::ClickStage => write!(f, "ClickStage"),
            Self::TypeText { text } => write!(f, "TypeText {text}"),
            Self::DragSprite { target, x, y } => {
                write!(f, "DragSprite {target} to {}/{}", x.trunc(), y.trunc())
            }
            Self::Sound { volume } => write!(f, "Sound {volume}"),
        }
    }
}

fn fold_duration(arg: f64, upper: u32) -> u32 {
    let upper = f64::from(upper.max(1));
    (arg.abs().trunc() % upper) as u32
}

fn fold_coordinate(arg: f64, extent: f64) -> f64 {
    let half = extent / 2.0;
    if (-half..=half).contains(&arg) {
        arg
    } else {
        (arg + half).rem_euclid(extent + 1.0) - half
    }
}

/// Remove events sharing a structural identity, keeping first occurrences.
#[must_use]
pub fn distinct_events(events: Vec<Event>) -> Vec<Event> {
    let mut seen = std::collections::HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| seen.insert(event.identifier()))
        .collect()
}
