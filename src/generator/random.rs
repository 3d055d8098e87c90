//! Process-wide random source.
//!
//! Seeded once at startup from the configured seed, or from the nanosecond
//! clock when no seed is given. Seeded runs make generation deterministic
//! for tests and repeatable capacity experiments.

use std::sync::{Mutex, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

static RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn clock_seed() -> u64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}

/// Initialize the global random source. Later calls are ignored; the first
/// seed wins for the lifetime of the process.
pub fn init_random(seed: Option<i64>) {
    let seed = seed.map(|s| s as u64).unwrap_or_else(clock_seed);
    let _ = RNG.set(Mutex::new(StdRng::seed_from_u64(seed)));
}

fn rng() -> &'static Mutex<StdRng> {
    RNG.get_or_init(|| Mutex::new(StdRng::seed_from_u64(clock_seed())))
}

/// Uniform value in `[low, high]`.
pub fn random_range(low: usize, high: usize) -> usize {
    rng().lock().expect("rng lock poisoned").gen_range(low..=high)
}

pub fn random_index(len: usize) -> usize {
    rng().lock().expect("rng lock poisoned").gen_range(0..len)
}

pub fn flip_coin() -> bool {
    rng().lock().expect("rng lock poisoned").gen_bool(0.5)
}
