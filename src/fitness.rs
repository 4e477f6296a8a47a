//! Per-objective fitness functions.
//!
//! A fitness function is immutable and keyed by its objective. Values are
//! deterministic given a chromosome's genes and completed trace, and are
//! cached on the chromosome by [`get_fitness`].

use std::cmp::Ordering;

use crate::bitstring::BitstringChromosome;
use crate::chromosome::Chromosome;
use crate::program::{Block, LocationId, ProgramState};

/// Fitness of a chromosome with respect to one objective.
pub trait FitnessFunction<C> {
    /// Objective identity; also the archive key.
    fn objective(&self) -> &str;

    /// Raw fitness value. Must not depend on anything but `chromosome`.
    fn compute(&self, chromosome: &C) -> f64;

    /// Total order on fitness values: `Greater` means `a` is better.
    fn compare(&self, a: f64, b: f64) -> Ordering;

    fn is_optimal(&self, value: f64) -> bool;

    /// Value assigned to candidates whose evaluation failed.
    fn worst(&self) -> f64;

    /// Number of unsatisfied control dependencies, for graduated guidance.
    fn approach_level(&self, _chromosome: &C) -> Option<u32> {
        None
    }

    /// Normalised distance to taking the branch towards the objective.
    fn branch_distance(&self, _chromosome: &C) -> Option<f64> {
        None
    }
}

/// Fitness of `chromosome`, computed on first request and cached until the
/// chromosome's evaluation changes. Failed evaluations score worst.
pub fn get_fitness<C: Chromosome>(chromosome: &mut C, function: &dyn FitnessFunction<C>) -> f64 {
    if chromosome.evaluation().is_failed() {
        return function.worst();
    }
    if let Some(value) = chromosome.evaluation().cached(function.objective()) {
        return value;
    }
    let value = function.compute(chromosome);
    chromosome
        .evaluation_mut()
        .cache(function.objective(), value);
    value
}

/// Whether `chromosome` reaches the optimum of `function`.
pub fn is_covered<C: Chromosome>(chromosome: &mut C, function: &dyn FitnessFunction<C>) -> bool {
    let value = get_fitness(chromosome, function);
    function.is_optimal(value)
}

/// Number of set bits; optimal when all bits are set.
#[derive(Debug, Clone)]
pub struct OneMax {
    size: usize,
}

impl OneMax {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl FitnessFunction<BitstringChromosome> for OneMax {
    fn objective(&self) -> &str {
        "one-max"
    }

    fn compute(&self, chromosome: &BitstringChromosome) -> f64 {
        chromosome.bits().iter().filter(|&&bit| bit).count() as f64
    }

    fn compare(&self, a: f64, b: f64) -> Ordering {
        a.total_cmp(&b)
    }

    fn is_optimal(&self, value: f64) -> bool {
        value >= self.size as f64
    }

    fn worst(&self) -> f64 {
        0.0
    }
}

/// Target: exactly one bit set, at `position`. Every correct bit adds one,
/// so the optimum equals the bitstring length.
#[derive(Debug, Clone)]
pub struct SingleBit {
    size: usize,
    position: usize,
    objective: String,
}

impl SingleBit {
    #[must_use]
    pub fn new(size: usize, position: usize) -> Self {
        debug_assert!(position < size);
        Self {
            size,
            position,
            objective: format!("bit-{position}"),
        }
    }

    /// One objective per bit position.
    #[must_use]
    pub fn all(size: usize) -> Vec<Self> {
        (0..size).map(|position| Self::new(size, position)).collect()
    }
}

impl FitnessFunction<BitstringChromosome> for SingleBit {
    fn objective(&self) -> &str {
        &self.objective
    }

    fn compute(&self, chromosome: &BitstringChromosome) -> f64 {
        chromosome
            .bits()
            .iter()
            .enumerate()
            .filter(|&(index, &bit)| bit == (index == self.position))
            .count() as f64
    }

    fn compare(&self, a: f64, b: f64) -> Ordering {
        a.total_cmp(&b)
    }

    fn is_optimal(&self, value: f64) -> bool {
        value >= self.size as f64
    }

    fn worst(&self) -> f64 {
        0.0
    }
}

/// Reach a program location. Minimising; 0 means covered.
///
/// An uncovered target scores `approach_level + normalised branch distance`,
/// where the approach level counts the enclosing control dependencies
/// between the innermost covered one and the target.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementFitness {
    target: LocationId,
    /// Enclosing control locations, innermost first, ending with the hat.
    control_dependencies: Vec<LocationId>,
}

impl StatementFitness {
    #[must_use]
    pub fn new(target: impl Into<LocationId>, control_dependencies: Vec<LocationId>) -> Self {
        Self {
            target: target.into(),
            control_dependencies,
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// One statement objective per location of `state`, with control
    /// dependencies derived from block nesting.
    #[must_use]
    pub fn for_program(state: &ProgramState) -> Vec<Self> {
        fn walk(blocks: &[Block], enclosing: &mut Vec<LocationId>, out: &mut Vec<StatementFitness>) {
            for block in blocks {
                let dependencies = enclosing.iter().rev().cloned().collect();
                out.push(StatementFitness::new(block.id.clone(), dependencies));
                if !block.substacks.is_empty() {
                    enclosing.push(block.id.clone());
                    for branch in &block.substacks {
                        walk(branch, enclosing, out);
                    }
                    enclosing.pop();
                }
            }
        }

        let mut objectives = Vec::new();
        for target in &state.targets {
            for script in &target.scripts {
                objectives.push(Self::new(script.hat.id.clone(), Vec::new()));
                let mut enclosing = vec![script.hat.id.clone()];
                walk(&script.body, &mut enclosing, &mut objectives);
            }
        }
        objectives
    }

    fn level_and_distance<C: Chromosome>(&self, chromosome: &C) -> Option<(u32, f64)> {
        let trace = chromosome.trace()?;
        if trace.covers(&self.target) {
            return Some((0, 0.0));
        }
        let innermost_covered = self
            .control_dependencies
            .iter()
            .position(|location| trace.covers(location));
        let level = innermost_covered.unwrap_or(self.control_dependencies.len()) as u32;
        let raw = innermost_covered
            .and_then(|index| self.control_dependencies.get(index))
            .and_then(|location| trace.branch_distances.get(location))
            .copied()
            .unwrap_or(1.0);
        Some((level, normalise(raw)))
    }
}

impl<C: Chromosome> FitnessFunction<C> for StatementFitness {
    fn objective(&self) -> &str {
        &self.target
    }

    fn compute(&self, chromosome: &C) -> f64 {
        match self.level_and_distance(chromosome) {
            Some((level, distance)) => f64::from(level) + distance,
            None => FitnessFunction::<C>::worst(self),
        }
    }

    fn compare(&self, a: f64, b: f64) -> Ordering {
        b.total_cmp(&a)
    }

    fn is_optimal(&self, value: f64) -> bool {
        value == 0.0
    }

    fn worst(&self) -> f64 {
        self.control_dependencies.len() as f64 + 1.0
    }

    fn approach_level(&self, chromosome: &C) -> Option<u32> {
        self.level_and_distance(chromosome).map(|(level, _)| level)
    }

    fn branch_distance(&self, chromosome: &C) -> Option<f64> {
        self.level_and_distance(chromosome)
            .map(|(_, distance)| distance)
    }
}

fn normalise(distance: f64) -> f64 {
    let distance = distance.max(0.0);
    distance / (distance + 1.0)
}
