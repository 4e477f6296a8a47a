//! Mutation operators for the list-based chromosomes.

use serde::{Deserialize, Serialize};

use crate::randomness::Randomness;

/// Flips each bit with probability `1 / len`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitflipMutation;

impl BitflipMutation {
    #[must_use]
    pub fn apply(&self, bits: &[bool], rng: &mut Randomness) -> Vec<bool> {
        let p = per_locus(bits.len());
        bits.iter().map(|&bit| bit ^ rng.chance(p)).collect()
    }
}

/// Replaces each codon with probability `1 / len` by a uniform value in
/// `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerListMutation {
    pub min: i64,
    pub max: i64,
}

impl IntegerListMutation {
    #[must_use]
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn apply(&self, codons: &[i64], rng: &mut Randomness) -> Vec<i64> {
        let p = per_locus(codons.len());
        codons
            .iter()
            .map(|&codon| {
                if rng.chance(p) {
                    rng.next_int(self.min, self.max)
                } else {
                    codon
                }
            })
            .collect()
    }
}

/// Insert, delete and change mutation for variable-length codon lists.
///
/// Each of the three operations fires with probability 1/3; if none does,
/// a change is forced so the offspring always differs in intent from its
/// parent. Changes perturb a codon by Gaussian noise half of the time and
/// replace it uniformly otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableLengthMutation {
    pub min: i64,
    pub max: i64,
    /// Upper bound on the codon list length.
    pub max_length: usize,
    /// Standard deviation of the Gaussian codon perturbation.
    pub gaussian_power: f64,
    /// Decay of the repeated-insertion probability (`alpha^k` for the k-th insert).
    pub insertion_decay: f64,
}

impl VariableLengthMutation {
    #[must_use]
    pub fn new(min: i64, max: i64, max_length: usize, gaussian_power: f64) -> Self {
        Self {
            min,
            max,
            max_length,
            gaussian_power,
            insertion_decay: 0.5,
        }
    }

    #[must_use]
    pub fn apply(&self, codons: &[i64], rng: &mut Randomness) -> Vec<i64> {
        let mut result = codons.to_vec();
        let third = 1.0 / 3.0;
        let mut changed = false;

        if rng.chance(third) {
            self.delete(&mut result, rng);
            changed = true;
        }
        if rng.chance(third) {
            self.change(&mut result, rng);
            changed = true;
        }
        if rng.chance(third) {
            self.insert(&mut result, rng);
            changed = true;
        }
        if !changed {
            self.change(&mut result, rng);
        }

        result.truncate(self.max_length);
        result
    }

    fn delete(&self, codons: &mut Vec<i64>, rng: &mut Randomness) {
        let p = per_locus(codons.len());
        let mut index = 0;
        while index < codons.len() {
            if codons.len() > 1 && rng.chance(p) {
                codons.remove(index);
            } else {
                index += 1;
            }
        }
    }

    fn change(&self, codons: &mut [i64], rng: &mut Randomness) {
        let p = per_locus(codons.len());
        for codon in codons.iter_mut() {
            if rng.chance(p) {
                *codon = if rng.coin() {
                    let noise = (rng.next_gaussian() * self.gaussian_power).round() as i64;
                    (*codon + noise).clamp(self.min, (self.max - 1).max(self.min))
                } else {
                    rng.next_int(self.min, self.max)
                };
            }
        }
    }

    fn insert(&self, codons: &mut Vec<i64>, rng: &mut Randomness) {
        let mut probability = self.insertion_decay;
        while codons.len() < self.max_length && rng.chance(probability) {
            let position = rng.next_index(codons.len() + 1);
            codons.insert(position, rng.next_int(self.min, self.max));
            probability *= self.insertion_decay;
        }
    }
}

fn per_locus(len: usize) -> f64 {
    1.0 / len.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitflip_keeps_length() {
        let mut rng = Randomness::new(42);
        let bits = vec![false; 16];
        let mutated = BitflipMutation.apply(&bits, &mut rng);
        assert_eq!(mutated.len(), 16);
    }

    #[test]
    fn test_integer_mutation_stays_in_range() {
        let mut rng = Randomness::new(42);
        let mutation = IntegerListMutation::new(0, 5);
        let mut codons = vec![0; 10];
        for _ in 0..100 {
            codons = mutation.apply(&codons, &mut rng);
        }
        assert!(codons.iter().all(|c| (0..5).contains(c)));
    }

    #[test]
    fn test_variable_length_respects_bounds() {
        let mut rng = Randomness::new(42);
        let mutation = VariableLengthMutation::new(0, 20, 12, 3.0);
        let mut codons = vec![1, 2, 3];
        for _ in 0..200 {
            codons = mutation.apply(&codons, &mut rng);
            assert!(!codons.is_empty());
            assert!(codons.len() <= 12);
            assert!(codons.iter().all(|c| (0..20).contains(c)));
        }
    }
}
