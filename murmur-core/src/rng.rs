//! Seeded random number generation for reproducible experiments.

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic random number generator owned by a mechanism.
///
/// Uses ChaCha8 for fast, high-quality pseudorandom numbers with
/// seed-based reproduction. Every mechanism that draws randomness owns its
/// own `SimRng`, so identical seeds reproduce identical runs regardless of
/// how work is scheduled.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl SimRng {
    /// Creates a generator from a seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Returns the seed this generator was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives an independently seeded child generator.
    ///
    /// Forking with distinct salts yields uncorrelated streams, which keeps
    /// per-user work units reproducible under any parallel schedule.
    pub fn fork(&self, salt: u64) -> Self {
        Self::from_seed(self.seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ salt)
    }

    /// Generates a random number in `[0, 1)`.
    pub fn random_f64(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generates a random boolean that is true with `probability`.
    pub fn random_bool(&mut self, probability: f64) -> bool {
        self.random_f64() < probability
    }

    /// Generates a random number in `[min, max)`; returns `min` when the
    /// range is empty.
    pub fn random_range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        min + (self.rng.next_u64() % (max - min))
    }

    /// Selects a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let index = self.random_range(0, slice.len() as u64) as usize;
            Some(&slice[index])
        }
    }

    /// Shuffles a mutable slice in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        slice.shuffle(&mut self.rng);
    }

    /// Draws `count` distinct elements uniformly without replacement,
    /// or everything when `count` exceeds the slice length.
    pub fn sample_distinct<T: Clone>(&mut self, slice: &[T], count: usize) -> Vec<T> {
        if count >= slice.len() {
            return slice.to_vec();
        }
        // Partial Fisher-Yates: only the prefix we return gets shuffled.
        let mut pool: Vec<T> = slice.to_vec();
        for i in 0..count {
            let j = self.random_range(i as u64, pool.len() as u64) as usize;
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SimRng::from_seed(12345);
        let mut b = SimRng::from_seed(12345);

        let xs: Vec<u64> = (0..10).map(|_| a.random_range(0, 100)).collect();
        let ys: Vec<u64> = (0..10).map(|_| b.random_range(0, 100)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_fork_streams_are_independent_and_reproducible() {
        let root = SimRng::from_seed(7);
        let mut a1 = root.fork(1);
        let mut a2 = root.fork(1);
        let mut b = root.fork(2);

        assert_eq!(a1.random_range(0, 1000), a2.random_range(0, 1000));
        // Streams with different salts should diverge somewhere early.
        let same = (0..8).all(|_| a1.random_range(0, 1000) == b.random_range(0, 1000));
        assert!(!same);
    }

    #[test]
    fn test_sample_distinct_bounds() {
        let mut rng = SimRng::from_seed(3);
        let items = vec![1, 2, 3, 4, 5];

        let all = rng.sample_distinct(&items, 10);
        assert_eq!(all, items);

        let three = rng.sample_distinct(&items, 3);
        assert_eq!(three.len(), 3);
        let mut sorted = three.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
    }

    #[test]
    fn test_random_bool_extremes() {
        let mut rng = SimRng::from_seed(9);
        assert!((0..100).all(|_| rng.random_bool(1.1)));
        assert!((0..100).all(|_| !rng.random_bool(0.0)));
    }
}
