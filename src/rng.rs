//! Seeded PRNG injection.
//!
//! Every stochastic draw inside [`aco`](crate::aco) and [`ga`](crate::ga)
//! flows through an `rng::Rng` passed in by the caller (ultimately the
//! orchestrator), never a thread-local or global generator. This is what
//! makes a run reproducible given a seed, candidates, constraints and
//! distance matrix, per the determinism requirement in the component design.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub type Rng = ChaCha8Rng;

/// Build the root RNG for one optimization run.
pub fn from_seed(seed: u64) -> Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Derive an independent child stream for one ant/individual within a
/// parallel batch, so concurrent rayon workers don't contend on a shared
/// generator. Two distinct `(seed, iteration, index)` triples never collide.
pub fn child_rng(seed: u64, iteration: u64, index: u64) -> Rng {
    ChaCha8Rng::seed_from_u64(
        seed ^ iteration.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index.wrapping_mul(0xBF58_476D_1CE4_E5B9),
    )
}
