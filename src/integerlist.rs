//! Fixed-length integer-list chromosomes.

use serde::{Deserialize, Serialize};

use crate::chromosome::{Chromosome, ChromosomeGenerator, ChromosomeId, Evaluation, Evolvable};
use crate::operators::crossover::ListCrossover;
use crate::operators::mutation::IntegerListMutation;
use crate::randomness::Randomness;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegerListChromosome {
    #[serde(skip)]
    id: ChromosomeId,
    codons: Vec<i64>,
    mutation: IntegerListMutation,
    crossover: ListCrossover,
    #[serde(skip)]
    evaluation: Evaluation,
}

impl IntegerListChromosome {
    #[must_use]
    pub fn new(codons: Vec<i64>, mutation: IntegerListMutation, crossover: ListCrossover) -> Self {
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

    #[must_use]
    pub fn clone_with(&self, codons: Vec<i64>) -> Self {
        Self::new(codons, self.mutation, self.crossover)
    }
}

impl Chromosome for IntegerListChromosome {
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

impl Evolvable for IntegerListChromosome {
    fn mutate(&self, rng: &mut Randomness) -> Self {
        self.clone_with(self.mutation.apply(&self.codons, rng))
    }

    fn crossover(&self, other: &Self, rng: &mut Randomness) -> (Self, Self) {
        let (a, b) = self.crossover.apply(&self.codons, &other.codons, rng);
        (self.clone_with(a), other.clone_with(b))
    }
}

#[derive(Debug, Clone)]
pub struct IntegerListChromosomeGenerator {
    pub length: usize,
    pub mutation: IntegerListMutation,
    pub crossover: ListCrossover,
}

impl IntegerListChromosomeGenerator {
    #[must_use]
    pub fn new(length: usize, min: i64, max: i64, crossover: ListCrossover) -> Self {
        Self {
            length,
            mutation: IntegerListMutation::new(min, max),
            crossover,
        }
    }
}

impl ChromosomeGenerator<IntegerListChromosome> for IntegerListChromosomeGenerator {
    fn generate(&mut self, rng: &mut Randomness) -> IntegerListChromosome {
        let codons = (0..self.length)
            .map(|_| rng.next_int(self.mutation.min, self.mutation.max))
            .collect();
        IntegerListChromosome::new(codons, self.mutation, self.crossover)
    }
}
