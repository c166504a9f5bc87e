//! Run-scoped randomness and operator probabilities.

use rand::prelude::*;

use crate::schema::OperatorRates;

/// Seeded random source plus the operator-probability table, threaded
/// through every stage of a run.
pub struct RunContext {
    rng: StdRng,
    seed: u64,
    rates: OperatorRates,
}

impl RunContext {
    /// Create from seed.
    pub fn new(seed: u64, rates: OperatorRates) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            rates,
        }
    }

    /// Create with a random seed.
    pub fn random(rates: OperatorRates) -> Self {
        Self::new(rand::random(), rates)
    }

    /// Seed the random source was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rates(&self) -> &OperatorRates {
        &self.rates
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Bernoulli trial against `probability`.
    pub fn trial(&mut self, probability: f64) -> bool {
        self.rng.r#gen::<f64>() < probability
    }

    /// Uniform index in `0..len`, `None` when `len` is zero.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    /// Uniform choice from a slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}
