//! Execution traces recorded during a playthrough.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::program::LocationId;

/// One executed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// The event as it was sent, parameters included.
    pub event: Event,
    /// Raw parameter values consumed by the event.
    pub parameters: Vec<f64>,
    /// Number of codons consumed once this event was decoded.
    pub codon_end: usize,
    /// Size of the coverage set after this event was applied.
    pub covered: usize,
}

/// Ordered event log and coverage of one completed playthrough.
///
/// A trace is only ever stored on a chromosome once the playthrough has
/// finished; executors build it locally and hand it over in one piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub events: Vec<TraceEntry>,
    pub coverage: BTreeSet<LocationId>,
    /// Normalisable branch distances reported by the program, per location.
    #[serde(default)]
    pub branch_distances: BTreeMap<LocationId, f64>,
    /// Events that were available once the playthrough ended.
    #[serde(default)]
    pub final_events: Vec<Event>,
    /// Whether the program was still running at the end.
    #[serde(default)]
    pub program_running: bool,
    /// Simulated steps the playthrough lasted.
    #[serde(default)]
    pub steps: u64,
    /// Game score at the end of the playthrough.
    #[serde(default)]
    pub score: f64,
}

impl ExecutionTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an executed event together with the coverage it produced.
    pub fn record(
        &mut self,
        event: Event,
        parameters: Vec<f64>,
        codon_end: usize,
        coverage: BTreeSet<LocationId>,
    ) {
        self.events.push(TraceEntry {
            event,
            parameters,
            codon_end,
            covered: coverage.len(),
        });
        self.coverage = coverage;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn covers(&self, location: &str) -> bool {
        self.coverage.contains(location)
    }

    /// Index of the last event that increased coverage, if any did.
    #[must_use]
    pub fn last_improving_event(&self) -> Option<usize> {
        let mut previous = 0;
        let mut last = None;
        for (index, entry) in self.events.iter().enumerate() {
            if entry.covered > previous {
                last = Some(index);
            }
            previous = entry.covered;
        }
        last
    }
}
