//! Sources of uniform randomness used by the explorers.
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A source of uniform draws in `[0, 1)`.
///
/// Explorers never own a hidden global generator. The caller passes a source into every
/// [`ExplorerPolicy::map_context`](crate::ExplorerPolicy::map_context) call, so tests can supply
/// a deterministic one.
pub trait RandomSource {
    /// Draw a number uniformly from `[0, 1)`.
    fn uniform_unit_interval(&mut self) -> f64;
}

/// Seeded pseudo-random generator. The same seed always produces the same draws.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> SeededRandom {
        SeededRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed the generator from an experimental unit key, salted with `salt` (usually the
    /// application id). Decisions for the same key are then reproducible across processes.
    pub fn from_key(salt: &str, key: &str) -> SeededRandom {
        let hash = md5::compute(format!("{salt}-{key}"));
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&hash[0..8]);
        SeededRandom::new(u64::from_be_bytes(seed))
    }
}

impl RandomSource for SeededRandom {
    fn uniform_unit_interval(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}
