use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MULTIPLIER_A: i64 = 1103515245;
const INCREMENT_C: i64 = 12345;
const DEFAULT_SEED: i64 = 3819201;

/// Source of randomness for a search engine.
///
/// Every random decision the engine makes (tie-breaking noise, centroid initialisation,
/// rollout actions, sampler draws) goes through one instance of this trait, so a search is
/// reproducible given the same generator state.
pub trait RandomGenerator: Default {
    /// Uniform value in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform integer in `[from, to)`. Returns `from` when the range is empty.
    fn next_range(&mut self, from: usize, to: usize) -> usize;

    fn get_random_from_slice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_range(0, items.len()))
    }
}

/// Generator backed by `rand`'s [`StdRng`].
pub struct StandardRandomGenerator {
    rng: StdRng,
}

impl Default for StandardRandomGenerator {
    fn default() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl StandardRandomGenerator {
    /// Creates a generator with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomGenerator for StandardRandomGenerator {
    fn next_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn next_range(&mut self, from: usize, to: usize) -> usize {
        if to <= from {
            return from;
        }
        self.rng.random_range(from..to)
    }
}

/// Linear congruential generator with a fixed default seed.
pub struct CustomNumberGenerator {
    seed: i64,
}

impl Default for CustomNumberGenerator {
    fn default() -> Self {
        CustomNumberGenerator::new(DEFAULT_SEED)
    }
}

impl CustomNumberGenerator {
    pub const fn new(seed: i64) -> Self {
        Self { seed }
    }

    fn next(&mut self) -> i64 {
        self.seed = (self.seed * MULTIPLIER_A + INCREMENT_C).rem_euclid(i32::MAX as i64);
        self.seed
    }
}

impl RandomGenerator for CustomNumberGenerator {
    fn next_f64(&mut self) -> f64 {
        self.next() as f64 / i32::MAX as f64
    }

    fn next_range(&mut self, from: usize, to: usize) -> usize {
        if to <= from {
            return from;
        }
        (self.next() as usize % (to - from)) + from
    }
}
