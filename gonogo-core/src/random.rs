use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Randomness injected into a responder for one session.
///
/// Draws are sequential, so a source must not be shared across sessions.
pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn uniform(&mut self) -> f64;
    /// Normal draw. A degenerate `sd` yields `mean`.
    fn normal(&mut self, mean: f64, sd: f64) -> f64;
}

/// `RandomSource` backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng + Send> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        if !(mean.is_finite() && sd.is_finite() && sd > 0.0) {
            return mean;
        }
        match Normal::new(mean, sd) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_replays_the_same_stream() {
        let mut a = RngSource::seeded(7);
        let mut b = RngSource::seeded(7);
        for _ in 0..32 {
            assert_eq!(a.uniform(), b.uniform());
            assert_eq!(a.normal(0.3, 0.05), b.normal(0.3, 0.05));
        }
    }

    #[test]
    fn uniform_stays_in_unit_interval() {
        let mut source = RngSource::seeded(11);
        for _ in 0..1000 {
            let u = source.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn invalid_sd_falls_back_to_mean() {
        let mut source = RngSource::seeded(3);
        assert_eq!(source.normal(0.31, f64::NAN), 0.31);
        assert_eq!(source.normal(0.31, -1.0), 0.31);
        assert_eq!(source.normal(0.31, 0.0), 0.31);
        assert_eq!(source.normal(0.31, f64::INFINITY), 0.31);
    }
}
