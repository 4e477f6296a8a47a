//! Many-objective sorting algorithm (MOSA).
//!
//! Survivors are chosen by preference sorting over the objectives that are
//! still uncovered: the best chromosome per uncovered objective forms the
//! first front, the rest is ranked by non-dominated sorting, and the last
//! admitted front is truncated by crowding distance.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use async_trait::async_trait;
use log::debug;

use crate::archive::Archive;
use crate::chromosome::{Chromosome, Evolvable};
use crate::error::SearchError;
use crate::executor::Evaluator;
use crate::fitness::get_fitness;
use crate::operators::local_search::LocalSearch;
use crate::randomness::Randomness;
use crate::search::{
    breed, BoxedFitness, BoxedGenerator, SearchAlgorithm, SearchCore, SearchProperties,
};
use crate::stopping::{SearchStatistics, StoppingCondition};

pub struct Mosa<C> {
    core: SearchCore<C>,
    population: Vec<C>,
}

impl<C: Evolvable> Default for Mosa<C> {
    fn default() -> Self {
        Self {
            core: SearchCore::new(),
            population: Vec::new(),
        }
    }
}

impl<C: Evolvable> Mosa<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Population of the last generation.
    #[must_use]
    pub fn population(&self) -> &[C] {
        &self.population
    }

    /// Indices of the objectives the archive does not cover yet; all of
    /// them once everything is covered.
    fn open_objectives(&self) -> Vec<usize> {
        let functions = self.core.functions();
        let archive = self.core.archive();
        let open: Vec<usize> = (0..functions.len())
            .filter(|&k| !archive.contains(functions[k].objective()))
            .collect();
        if open.is_empty() {
            (0..functions.len()).collect()
        } else {
            open
        }
    }

    /// Pick `size` survivors from `union`, returning them with their
    /// selection scores (front rank first, crowding second).
    fn select_survivors(&self, mut union: Vec<C>, size: usize) -> (Vec<C>, Vec<f64>) {
        let objectives = self.open_objectives();
        let functions = self.core.functions();
        let values: Vec<Vec<f64>> = union
            .iter_mut()
            .map(|chromosome| {
                objectives
                    .iter()
                    .map(|&k| get_fitness(chromosome, functions[k].as_ref()))
                    .collect()
            })
            .collect();
        let compare = |k: usize, a: f64, b: f64| functions[objectives[k]].compare(a, b);
        let lengths: Vec<usize> = union.iter().map(Chromosome::length).collect();

        // Preference front: the best chromosome per open objective, shorter
        // on ties.
        let mut preferred = BTreeSet::new();
        for k in 0..objectives.len() {
            let best = (0..union.len()).max_by(|&a, &b| {
                compare(k, values[a][k], values[b][k]).then(lengths[b].cmp(&lengths[a]))
            });
            preferred.extend(best);
        }
        let mut fronts = vec![preferred.iter().copied().collect::<Vec<_>>()];
        let rest: Vec<usize> = (0..union.len()).filter(|i| !preferred.contains(i)).collect();
        fronts.extend(non_dominated_sort(&rest, &values, &compare));

        let mut chosen: Vec<(usize, f64)> = Vec::with_capacity(size);
        for (rank, front) in fronts.iter().enumerate() {
            if chosen.len() >= size {
                break;
            }
            let distances = crowding_distances(front, &values, &compare);
            let mut members: Vec<(usize, f64)> = front.iter().copied().zip(distances).collect();
            members.sort_by(|a, b| b.1.total_cmp(&a.1));
            members.truncate(size - chosen.len());
            for (index, distance) in members {
                let crowding = if distance.is_finite() {
                    distance / (1.0 + distance)
                } else {
                    1.0
                };
                chosen.push((index, -(rank as f64) * 2.0 + crowding));
            }
        }
        debug!(
            "MOSA: {} fronts, {} preferred, {} open objectives",
            fronts.len(),
            fronts[0].len(),
            objectives.len()
        );

        let mut slots: Vec<Option<C>> = union.into_iter().map(Some).collect();
        let mut survivors = Vec::with_capacity(chosen.len());
        let mut scores = Vec::with_capacity(chosen.len());
        for (index, score) in chosen {
            if let Some(chromosome) = slots[index].take() {
                survivors.push(chromosome);
                scores.push(score);
            }
        }
        (survivors, scores)
    }
}

/// `a` dominates `b`: no worse on any objective and better on one.
fn dominates(a: &[f64], b: &[f64], compare: &impl Fn(usize, f64, f64) -> Ordering) -> bool {
    let mut better = false;
    for k in 0..a.len() {
        match compare(k, a[k], b[k]) {
            Ordering::Less => return false,
            Ordering::Greater => better = true,
            Ordering::Equal => {}
        }
    }
    better
}

/// Split `members` into successive non-dominated fronts.
fn non_dominated_sort(
    members: &[usize],
    values: &[Vec<f64>],
    compare: &impl Fn(usize, f64, f64) -> Ordering,
) -> Vec<Vec<usize>> {
    let mut remaining = members.to_vec();
    let mut fronts = Vec::new();
    while !remaining.is_empty() {
        let (front, dominated): (Vec<usize>, Vec<usize>) =
            remaining.iter().partition(|&&i| {
                !remaining
                    .iter()
                    .any(|&j| j != i && dominates(&values[j], &values[i], compare))
            });
        fronts.push(front);
        remaining = dominated;
    }
    fronts
}

/// Crowding distance of each front member; boundary members are infinite.
fn crowding_distances(
    front: &[usize],
    values: &[Vec<f64>],
    compare: &impl Fn(usize, f64, f64) -> Ordering,
) -> Vec<f64> {
    if front.len() <= 2 {
        return vec![f64::INFINITY; front.len()];
    }
    let mut distances = vec![0.0; front.len()];
    let objectives = values.get(front[0]).map_or(0, Vec::len);
    for k in 0..objectives {
        let mut order: Vec<usize> = (0..front.len()).collect();
        order.sort_by(|&a, &b| compare(k, values[front[a]][k], values[front[b]][k]));
        let first = order[0];
        let last = order[order.len() - 1];
        distances[first] = f64::INFINITY;
        distances[last] = f64::INFINITY;
        let span = (values[front[last]][k] - values[front[first]][k]).abs();
        if span == 0.0 {
            continue;
        }
        for window in order.windows(3) {
            let gap = (values[front[window[2]]][k] - values[front[window[0]]][k]).abs();
            distances[window[1]] += gap / span;
        }
    }
    distances
}

#[async_trait(?Send)]
impl<C: Evolvable> SearchAlgorithm<C> for Mosa<C> {
    type Properties = SearchProperties;
    type Generator = BoxedGenerator<C>;

    fn set_properties(&mut self, properties: SearchProperties) {
        self.core.set_properties(properties);
    }

    fn set_chromosome_generator(&mut self, generator: BoxedGenerator<C>) {
        self.core.set_generator(generator);
    }

    fn set_fitness_functions(&mut self, functions: Vec<BoxedFitness<C>>) {
        self.core.set_functions(functions);
    }

    fn set_stopping_condition(&mut self, condition: StoppingCondition) {
        self.core.set_stopping_condition(condition);
    }

    fn add_local_search(&mut self, operator: Box<dyn LocalSearch<C>>) {
        self.core.add_local_search(operator);
    }

    async fn find_solution(
        &mut self,
        evaluator: &mut dyn Evaluator<C>,
        rng: &mut Randomness,
    ) -> Result<Vec<C>, SearchError> {
        self.core.start()?;
        let size = self.core.properties().population_size.max(1);
        let mut population = self.core.generate_population(rng)?;
        if self
            .core
            .evaluate_population(&mut population, evaluator, rng)
            .await
        {
            self.population = population;
            return Ok(self.core.solutions());
        }
        let (mut population, mut scores) = self.select_survivors(population, size);

        while !self.core.is_finished() {
            let mut offspring = breed(&population, &scores, size, self.core.properties(), rng);
            let finished = self
                .core
                .evaluate_population(&mut offspring, evaluator, rng)
                .await;
            if !finished {
                self.core
                    .apply_local_search(&mut offspring, evaluator, rng)
                    .await;
            }
            // Offspring cut short by the stopping condition stay unevaluated
            // and must not compete for survival.
            population.extend(offspring.into_iter().filter(|c| c.evaluation().is_evaluated()));
            (population, scores) = self.select_survivors(population, size);
            self.core.finish_iteration("MOSA");
        }
        self.population = population;
        Ok(self.core.solutions())
    }

    fn statistics(&self) -> &SearchStatistics {
        self.core.statistics()
    }

    fn archive(&self) -> &Archive<C> {
        self.core.archive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstring::{BitstringChromosome, BitstringChromosomeGenerator};
    use crate::executor::DirectEvaluator;
    use crate::fitness::SingleBit;
    use crate::operators::crossover::ListCrossover;

    fn maximise(_: usize, a: f64, b: f64) -> Ordering {
        a.total_cmp(&b)
    }

    #[test]
    fn test_non_dominated_sort_layers() {
        let values = vec![vec![3.0, 3.0], vec![1.0, 1.0], vec![3.0, 1.0], vec![1.0, 3.0]];
        let fronts = non_dominated_sort(&[0, 1, 2, 3], &values, &maximise);
        assert_eq!(fronts, vec![vec![0], vec![2, 3], vec![1]]);
    }

    #[test]
    fn test_crowding_marks_boundaries_infinite() {
        let values = vec![vec![0.0], vec![1.0], vec![4.0]];
        let distances = crowding_distances(&[0, 1, 2], &values, &maximise);
        assert!(distances[0].is_infinite());
        assert!(distances[2].is_infinite());
        assert!((distances[1] - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_mosa_covers_every_bit() {
        let mut rng = Randomness::new(42);
        let mut search = Mosa::<BitstringChromosome>::new();
        search.set_properties(SearchProperties {
            population_size: 12,
            ..SearchProperties::default()
        });
        search.set_chromosome_generator(Box::new(BitstringChromosomeGenerator::new(
            6,
            ListCrossover::SinglePoint,
        )));
        search.set_fitness_functions(
            SingleBit::all(6)
                .into_iter()
                .map(|f| Box::new(f) as BoxedFitness<BitstringChromosome>)
                .collect(),
        );
        search.set_stopping_condition(StoppingCondition::OneOf {
            conditions: vec![
                StoppingCondition::Optimal,
                StoppingCondition::FixedIteration { iterations: 300 },
            ],
        });

        let solutions = search
            .find_solution(&mut DirectEvaluator, &mut rng)
            .await
            .unwrap();
        assert_eq!(search.archive().len(), 6);
        assert!(search.statistics().is_fully_covered());
        assert!(solutions.len() >= 6);
        assert!(search.population().len() <= 12);
    }
}
