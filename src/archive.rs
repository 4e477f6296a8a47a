//! Best-known solution per objective.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::chromosome::{Chromosome, ObjectiveId};
use crate::fitness::{get_fitness, FitnessFunction};

/// Maps each covered objective to the shortest chromosome covering it, and
/// separately keeps the highest-scoring individual seen.
///
/// The set of covered objectives only grows during a run; [`clear`](Self::clear)
/// is reserved for starting an independent run.
#[derive(Debug, Clone)]
pub struct Archive<C> {
    entries: BTreeMap<ObjectiveId, C>,
    best: Option<(f64, C)>,
}

impl<C> Default for Archive<C> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            best: None,
        }
    }
}

impl<C: Chromosome> Archive<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `candidate` for every objective.
    ///
    /// An entry is replaced iff the candidate is optimal for the objective
    /// and the objective is either unarchived or archived with a strictly
    /// longer chromosome. Returns the number of objectives newly covered.
    pub fn update(&mut self, candidate: &mut C, functions: &[Box<dyn FitnessFunction<C>>]) -> usize {
        let mut newly_covered = 0;
        for function in functions {
            let value = get_fitness(candidate, function.as_ref());
            if !function.is_optimal(value) {
                continue;
            }
            let objective = function.objective();
            let archived_length = self.entries.get(objective).map(Chromosome::length);
            match archived_length {
                Some(length) if length <= candidate.length() => continue,
                Some(_) => debug!(
                    "shorter solution for {objective}: {} (length {})",
                    candidate.id(),
                    candidate.length()
                ),
                None => {
                    newly_covered += 1;
                    debug!("covered objective {objective} with {}", candidate.id());
                }
            }
            self.entries.insert(objective.to_string(), candidate.clone());
        }
        newly_covered
    }

    /// Keep `candidate` in the best-individual slot if `score` beats the
    /// current holder.
    pub fn update_best(&mut self, candidate: &C, score: f64) -> bool {
        let improves = self.best.as_ref().is_none_or(|(best, _)| score > *best);
        if improves {
            self.best = Some((score, candidate.clone()));
        }
        improves
    }

    #[must_use]
    pub fn best(&self) -> Option<&C> {
        self.best.as_ref().map(|(_, c)| c)
    }

    #[must_use]
    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|(score, _)| *score)
    }

    #[must_use]
    pub fn get(&self, objective: &str) -> Option<&C> {
        self.entries.get(objective)
    }

    #[must_use]
    pub fn contains(&self, objective: &str) -> bool {
        self.entries.contains_key(objective)
    }

    /// Number of covered objectives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn objectives(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Archived chromosomes without duplicates, in objective order.
    #[must_use]
    pub fn distinct_values(&self) -> Vec<C> {
        let mut seen = HashSet::new();
        self.entries
            .values()
            .filter(|c| seen.insert(c.id()))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.best = None;
    }
}
