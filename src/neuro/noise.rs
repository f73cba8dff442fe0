//! Random streams feeding the membrane noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Source of standard normal samples.
pub trait NoiseSource {
    fn sample(&mut self) -> f64;
}

/// Seedable standard normal stream.
#[derive(Clone, Debug)]
pub struct NormalStream {
    rng: StdRng,
}

impl NormalStream {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Independent streams derived from one master seed, in channel order.
    pub fn family<const N: usize>(seed: u64) -> [Self; N] {
        let mut master = StdRng::seed_from_u64(seed);
        std::array::from_fn(|_| Self {
            rng: StdRng::from_rng(&mut master),
        })
    }
}

impl NoiseSource for NormalStream {
    fn sample(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

/// Replays a fixed sequence, wrapping around at the end.
#[derive(Clone, Debug, Default)]
pub struct FixedSequence {
    values: Vec<f64>,
    cursor: usize,
    pub draws: usize,
}

impl FixedSequence {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            cursor: 0,
            draws: 0,
        }
    }

    /// A silent source, still counting how often it is drawn from.
    pub fn zeros() -> Self {
        Self::new(vec![0.0])
    }
}

impl NoiseSource for FixedSequence {
    fn sample(&mut self) -> f64 {
        self.draws += 1;
        let Some(&value) = self.values.get(self.cursor) else {
            return 0.0;
        };
        self.cursor = (self.cursor + 1) % self.values.len();
        value
    }
}
