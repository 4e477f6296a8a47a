//! Seeded randomness shared by every stochastic operator of a search run.
//!
//! A single [`Randomness`] instance is owned by the search algorithm and lent
//! to operators, extractors and executors through `&mut` borrows. Reseeding it
//! restores bit-identical behaviour for a given configuration.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Seeded pseudo-random generator with the convenience draws used throughout
/// the search.
#[derive(Debug, Clone)]
pub struct Randomness {
    seed: u64,
    rng: ChaCha8Rng,
}

impl Randomness {
    /// Create a generator from an explicit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The seed this generator was last (re)seeded with.
    #[must_use]
    pub fn initial_seed(&self) -> u64 {
        self.seed
    }

    /// Restart the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Uniform integer in `[min, max)`. Returns `min` for an empty range.
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Uniform index in `[0, len)`. `len` must be non-zero.
    pub fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "cannot draw an index from an empty range");
        self.rng.random_range(0..len)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_double(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform float in `[min, max)`.
    pub fn next_double_between(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_double() * (max - min)
    }

    /// Standard normal sample.
    pub fn next_gaussian(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    /// `true` with probability `p`. Values outside `[0, 1]` are clamped.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    /// Fair coin flip.
    pub fn coin(&mut self) -> bool {
        self.rng.random::<bool>()
    }

    /// Pick a uniformly random element, or `None` for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let idx = self.next_index(items.len());
            items.get(idx)
        }
    }
}

impl Default for Randomness {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RngCore for Randomness {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst);
    }
}
