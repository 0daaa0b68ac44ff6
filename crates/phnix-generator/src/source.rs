use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{rng, Rng, SeedableRng};

/// A source of uniformly distributed indices.
///
/// This abstraction allows plugging in the entropy-seeded thread RNG in
/// production and a seeded or scripted source in tests.
pub trait RandSource: Send + Sync + 'static {
    /// Returns an index drawn uniformly from `0..upper`. `upper` is never 0.
    fn index(&self, upper: usize) -> usize;
}

/// A `RandSource` backed by the thread-local RNG (`rand::rng()`).
///
/// The thread RNG is seeded from the operating system and reseeded
/// periodically. This type stores nothing, so it is `Send + Sync` even though
/// the RNG it reaches is not.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn index(&self, upper: usize) -> usize {
        rng().random_range(0..upper)
    }
}

/// A reproducible `RandSource` for tests and replays.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandSource for SeededRandom {
    fn index(&self, upper: usize) -> usize {
        self.rng.lock().random_range(0..upper)
    }
}
