//! Fixed-length bitstring chromosomes, used for benchmarking the search
//! algorithms on synthetic objectives.

use serde::{Deserialize, Serialize};

use crate::chromosome::{Chromosome, ChromosomeGenerator, ChromosomeId, Evaluation, Evolvable};
use crate::operators::crossover::ListCrossover;
use crate::operators::mutation::BitflipMutation;
use crate::randomness::Randomness;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitstringChromosome {
    #[serde(skip)]
    id: ChromosomeId,
    bits: Vec<bool>,
    mutation: BitflipMutation,
    crossover: ListCrossover,
    #[serde(skip)]
    evaluation: Evaluation,
}

impl BitstringChromosome {
    #[must_use]
    pub fn new(bits: Vec<bool>, mutation: BitflipMutation, crossover: ListCrossover) -> Self {
        Self {
            id: ChromosomeId::fresh(),
            bits,
            mutation,
            crossover,
            evaluation: Evaluation::default(),
        }
    }

    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// A new, unevaluated chromosome with the same operators.
    #[must_use]
    pub fn clone_with(&self, bits: Vec<bool>) -> Self {
        Self::new(bits, self.mutation, self.crossover)
    }
}

impl Chromosome for BitstringChromosome {
    fn id(&self) -> ChromosomeId {
        self.id
    }

    fn length(&self) -> usize {
        self.bits.len()
    }

    fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    fn evaluation_mut(&mut self) -> &mut Evaluation {
        &mut self.evaluation
    }
}

impl Evolvable for BitstringChromosome {
    fn mutate(&self, rng: &mut Randomness) -> Self {
        self.clone_with(self.mutation.apply(&self.bits, rng))
    }

    fn crossover(&self, other: &Self, rng: &mut Randomness) -> (Self, Self) {
        let (a, b) = self.crossover.apply(&self.bits, &other.bits, rng);
        (self.clone_with(a), other.clone_with(b))
    }
}

/// Uniformly random bitstrings of a fixed length.
#[derive(Debug, Clone)]
pub struct BitstringChromosomeGenerator {
    pub length: usize,
    pub mutation: BitflipMutation,
    pub crossover: ListCrossover,
}

impl BitstringChromosomeGenerator {
    #[must_use]
    pub fn new(length: usize, crossover: ListCrossover) -> Self {
        Self {
            length,
            mutation: BitflipMutation,
            crossover,
        }
    }
}

impl ChromosomeGenerator<BitstringChromosome> for BitstringChromosomeGenerator {
    fn generate(&mut self, rng: &mut Randomness) -> BitstringChromosome {
        let bits = (0..self.length).map(|_| rng.coin()).collect();
        BitstringChromosome::new(bits, self.mutation, self.crossover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_length() {
        let mut rng = Randomness::new(42);
        let mut generator = BitstringChromosomeGenerator::new(10, ListCrossover::SinglePoint);
        let chromosome = generator.generate(&mut rng);
        assert_eq!(chromosome.length(), 10);
    }

    #[test]
    fn test_operators_produce_new_identities() {
        let mut rng = Randomness::new(42);
        let mut generator = BitstringChromosomeGenerator::new(10, ListCrossover::SinglePoint);
        let a = generator.generate(&mut rng);
        let b = generator.generate(&mut rng);

        let mutant = a.mutate(&mut rng);
        let (c, d) = a.crossover(&b, &mut rng);
        assert_ne!(mutant.id(), a.id());
        assert_ne!(c.id(), a.id());
        assert_ne!(d.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
