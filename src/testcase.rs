//! Variable-length test chromosomes.
//!
//! A test is a list of integer codons. An executor decodes it against the
//! events available at each step: one codon selects the event, the
//! following codons supply its parameters.

use serde::{Deserialize, Serialize};

use crate::chromosome::{Chromosome, ChromosomeGenerator, ChromosomeId, Evaluation, Evolvable};
use crate::operators::crossover::ListCrossover;
use crate::operators::mutation::VariableLengthMutation;
use crate::randomness::Randomness;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestChromosome {
    #[serde(skip)]
    id: ChromosomeId,
    codons: Vec<i64>,
    mutation: VariableLengthMutation,
    crossover: ListCrossover,
    #[serde(skip)]
    evaluation: Evaluation,
}

impl TestChromosome {
    #[must_use]
    pub fn new(codons: Vec<i64>, mutation: VariableLengthMutation, crossover: ListCrossover) -> Self {
        Self {
            id: ChromosomeId::fresh(),
            codons,
            mutation,
            crossover,
            evaluation: Evaluation::default(),
        }
    }

    #[must_use]
    pub fn codons(&self) -> &[i64] {
        &self.codons
    }

    /// Upper bound on the codon list length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.mutation.max_length
    }

    /// A new, unevaluated test with the same operators.
    #[must_use]
    pub fn clone_with(&self, codons: Vec<i64>) -> Self {
        Self::new(codons, self.mutation, self.crossover)
    }
}

impl Chromosome for TestChromosome {
    fn id(&self) -> ChromosomeId {
        self.id
    }

    fn length(&self) -> usize {
        self.codons.len()
    }

    fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    fn evaluation_mut(&mut self) -> &mut Evaluation {
        &mut self.evaluation
    }
}

impl Evolvable for TestChromosome {
    fn mutate(&self, rng: &mut Randomness) -> Self {
        self.clone_with(self.mutation.apply(&self.codons, rng))
    }

    fn crossover(&self, other: &Self, rng: &mut Randomness) -> (Self, Self) {
        let (mut a, mut b) = self.crossover.apply(&self.codons, &other.codons, rng);
        a.truncate(self.max_length());
        b.truncate(other.max_length());
        (self.clone_with(a), other.clone_with(b))
    }
}

/// Random tests with a length drawn uniformly from `[min_length, max_length]`.
#[derive(Debug, Clone)]
pub struct TestChromosomeGenerator {
    pub min_length: usize,
    pub mutation: VariableLengthMutation,
    pub crossover: ListCrossover,
}

impl TestChromosomeGenerator {
    #[must_use]
    pub fn new(
        min_length: usize,
        mutation: VariableLengthMutation,
        crossover: ListCrossover,
    ) -> Self {
        Self {
            min_length: min_length.clamp(1, mutation.max_length.max(1)),
            mutation,
            crossover,
        }
    }
}

impl ChromosomeGenerator<TestChromosome> for TestChromosomeGenerator {
    fn generate(&mut self, rng: &mut Randomness) -> TestChromosome {
        let max_length = self.mutation.max_length.max(self.min_length);
        let length = rng.next_int(self.min_length as i64, max_length as i64 + 1) as usize;
        let codons = (0..length)
            .map(|_| rng.next_int(self.mutation.min, self.mutation.max))
            .collect();
        TestChromosome::new(codons, self.mutation, self.crossover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(max_length: usize) -> TestChromosomeGenerator {
        TestChromosomeGenerator::new(
            2,
            VariableLengthMutation::new(0, 50, max_length, 5.0),
            ListCrossover::SinglePointRelative,
        )
    }

    #[test]
    fn test_generated_length_is_bounded() {
        let mut rng = Randomness::new(42);
        let mut generator = generator(8);
        for _ in 0..50 {
            let test = generator.generate(&mut rng);
            assert!((2..=8).contains(&test.length()));
        }
    }

    #[test]
    fn test_crossover_respects_max_length() {
        let mut rng = Randomness::new(42);
        let mut generator = generator(8);
        for _ in 0..50 {
            let a = generator.generate(&mut rng);
            let b = generator.generate(&mut rng);
            let (c, d) = a.crossover(&b, &mut rng);
            assert!(c.length() <= 8);
            assert!(d.length() <= 8);
        }
    }
}
