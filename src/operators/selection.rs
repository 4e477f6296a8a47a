//! Parent selection.
//!
//! Selection works on a score slice parallel to the population, where a
//! larger score is better. Callers translate their own notion of quality
//! (fitness, front rank, crowding) into that score.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::randomness::Randomness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "operator")]
pub enum Selection {
    /// Linear ranking: the i-th worst individual is picked with weight `i + 1`.
    Rank,
    /// Best of `size` uniformly drawn individuals.
    Tournament { size: usize },
    /// Uniform choice.
    Random,
}

impl Default for Selection {
    fn default() -> Self {
        Self::Tournament { size: 2 }
    }
}

impl Selection {
    /// Index of the selected individual, or `None` for an empty population.
    pub fn select_index(&self, scores: &[f64], rng: &mut Randomness) -> Option<usize> {
        if scores.is_empty() {
            return None;
        }
        let selected = match self {
            Self::Random => rng.next_index(scores.len()),
            Self::Tournament { size } => {
                let mut best = rng.next_index(scores.len());
                for _ in 1..(*size).max(1) {
                    let contender = rng.next_index(scores.len());
                    if scores[contender] > scores[best] {
                        best = contender;
                    }
                }
                best
            }
            Self::Rank => {
                let mut order: Vec<usize> = (0..scores.len()).collect();
                order.sort_by(|&a, &b| {
                    scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal)
                });
                let total = scores.len() * (scores.len() + 1) / 2;
                let mut ticket = rng.next_index(total);
                let mut chosen = order[order.len() - 1];
                for (rank, &index) in order.iter().enumerate() {
                    if ticket <= rank {
                        chosen = index;
                        break;
                    }
                    ticket -= rank + 1;
                }
                chosen
            }
        };
        Some(selected)
    }

    /// Select a member of `population` by its parallel `scores`.
    pub fn select<'a, T>(
        &self,
        population: &'a [T],
        scores: &[f64],
        rng: &mut Randomness,
    ) -> Option<&'a T> {
        debug_assert_eq!(population.len(), scores.len());
        self.select_index(scores, rng)
            .and_then(|index| population.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_prefers_better_scores() {
        let mut rng = Randomness::new(42);
        let scores = [0.0, 1.0, 2.0, 3.0, 100.0];
        let selection = Selection::Tournament { size: 5 };
        let wins = (0..200)
            .filter(|_| selection.select_index(&scores, &mut rng) == Some(4))
            .count();
        assert!(wins > 100);
    }

    #[test]
    fn test_rank_selection_covers_range() {
        let mut rng = Randomness::new(42);
        let scores = [5.0, 1.0, 3.0];
        for _ in 0..100 {
            let index = Selection::Rank.select_index(&scores, &mut rng).unwrap();
            assert!(index < 3);
        }
    }

    #[test]
    fn test_empty_population() {
        let mut rng = Randomness::new(1);
        assert!(Selection::Random.select_index(&[], &mut rng).is_none());
    }
}
