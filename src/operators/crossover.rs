//! Crossover operators for the list-based chromosomes.

use serde::{Deserialize, Serialize};

use crate::randomness::Randomness;

/// Recombination of two gene lists into two children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListCrossover {
    /// One shared cut point; both parents must have equal length for the
    /// children to keep it.
    #[default]
    SinglePoint,
    /// One relative cut point applied to each parent's own length, so
    /// parents of different lengths recombine proportionally.
    SinglePointRelative,
}

impl ListCrossover {
    #[must_use]
    pub fn apply<G: Clone>(
        &self,
        first: &[G],
        second: &[G],
        rng: &mut Randomness,
    ) -> (Vec<G>, Vec<G>) {
        let (cut_first, cut_second) = match self {
            Self::SinglePoint => {
                let shortest = first.len().min(second.len());
                let cut = rng.next_int(0, shortest as i64 + 1) as usize;
                (cut, cut)
            }
            Self::SinglePointRelative => {
                let relative = rng.next_double();
                (
                    (relative * first.len() as f64).round() as usize,
                    (relative * second.len() as f64).round() as usize,
                )
            }
        };

        let child_a = first[..cut_first]
            .iter()
            .chain(&second[cut_second..])
            .cloned()
            .collect();
        let child_b = second[..cut_second]
            .iter()
            .chain(&first[cut_first..])
            .cloned()
            .collect();
        (child_a, child_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_point_preserves_genes() {
        let mut rng = Randomness::new(42);
        let a = vec![0; 8];
        let b = vec![1; 8];
        let (x, y) = ListCrossover::SinglePoint.apply(&a, &b, &mut rng);

        assert_eq!(x.len(), 8);
        assert_eq!(y.len(), 8);
        assert_eq!(x.iter().sum::<i32>() + y.iter().sum::<i32>(), 8);
    }

    #[test]
    fn test_relative_crossover_total_length() {
        let mut rng = Randomness::new(7);
        let a = vec![0; 4];
        let b = vec![1; 10];
        let (x, y) = ListCrossover::SinglePointRelative.apply(&a, &b, &mut rng);
        assert_eq!(x.len() + y.len(), 14);
    }
}
