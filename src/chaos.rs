//! Failure and latency injection for the `/fail` and `/delayed` routes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Status codes `/fail` may answer with: 402-417 and 500-504.
pub const FAILURE_CODES: [u16; 21] = [
    402, 403, 404, 405, 406, 407, 408, 409, 410, 411, 412, 413, 414, 415, 416, 417,
    500, 501, 502, 503, 504,
];

pub const MIN_DELAY_MILLIS: u64 = 1000;
pub const MAX_DELAY_MILLIS: u64 = 9999;

pub trait ChaosPolicy: Send + Sync {
    /// A status code drawn from [`FAILURE_CODES`].
    fn failure_code(&self) -> u16;

    /// A delay between 1.000s and 9.999s in whole milliseconds.
    fn delay(&self) -> Duration;
}

/// Uniform random choices. Seed it for reproducible sequences.
#[derive(Debug)]
pub struct RandomChaos {
    rng: Mutex<StdRng>,
}

impl RandomChaos {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl Default for RandomChaos {
    fn default() -> Self {
        Self::new()
    }
}

impl ChaosPolicy for RandomChaos {
    fn failure_code(&self) -> u16 {
        let index = self.with_rng(|rng| rng.gen_range(0..FAILURE_CODES.len()));
        FAILURE_CODES[index]
    }

    fn delay(&self) -> Duration {
        let millis = self.with_rng(|rng| rng.gen_range(MIN_DELAY_MILLIS..=MAX_DELAY_MILLIS));
        Duration::from_millis(millis)
    }
}

/// Always returns the same code and delay.
#[derive(Debug, Clone)]
pub struct FixedChaos {
    pub code: u16,
    pub delay: Duration,
}

impl FixedChaos {
    pub fn new(code: u16, delay: Duration) -> Self {
        Self { code, delay }
    }
}

impl ChaosPolicy for FixedChaos {
    fn failure_code(&self) -> u16 {
        self.code
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}
