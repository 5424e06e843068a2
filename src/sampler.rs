use crate::config::{clamp_sim_count, RunConfig, WeightScheme};
use crate::data::AssetUniverse;
use crate::portfolio::{normalize_weights, PortfolioPoint};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;
use tracing::info;

/// Draws random long-only portfolios to approximate the feasible set.
///
/// The cloud only ever approximates the feasible set: more samples tighten the
/// envelope but never recover the analytic frontier.
pub struct MonteCarloSampler<R: Rng> {
    rng: R,
    scheme: WeightScheme,
}

impl MonteCarloSampler<StdRng> {
    /// Seeded when `seed` is given (deterministic clouds), otherwise from OS entropy.
    pub fn from_seed(seed: Option<u64>, scheme: WeightScheme) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self::new(rng, scheme)
    }
}

impl<R: Rng> MonteCarloSampler<R> {
    pub fn new(rng: R, scheme: WeightScheme) -> Self {
        Self { rng, scheme }
    }

    /// One weight vector of length `n` summing to 1. Empty when `n == 0`.
    pub fn draw_weights(&mut self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        let unit = Uniform::new(0.0, 1.0);
        loop {
            let raw: Vec<f64> = match self.scheme {
                WeightScheme::Uniform => (0..n).map(|_| unit.sample(&mut self.rng)).collect(),
                WeightScheme::Dirichlet => (0..n).map(|_| Exp1.sample(&mut self.rng)).collect(),
            };
            // An all-zero draw is possible in principle; redraw instead of failing.
            if let Ok(weights) = normalize_weights(&raw) {
                return weights;
            }
        }
    }

    /// Evaluates `sim_count` (clamped) random portfolios against the universe.
    pub fn sample(
        &mut self,
        universe: &AssetUniverse,
        sim_count: usize,
        risk_free_rate: f64,
    ) -> Vec<PortfolioPoint> {
        let sim_count = clamp_sim_count(sim_count);
        let n = universe.len();
        if n == 0 {
            return Vec::new();
        }

        let means = universe.mean_returns();
        let cov = universe.covariance();

        let mut cloud = Vec::with_capacity(sim_count);
        for _ in 0..sim_count {
            let weights = self.draw_weights(n);
            cloud.push(PortfolioPoint::evaluate(weights, &means, cov, risk_free_rate));
        }
        cloud
    }
}

/// Samples a fresh cloud for `config`, seeding the generator from `config.seed`.
pub fn sample_cloud(universe: &AssetUniverse, config: &RunConfig) -> Vec<PortfolioPoint> {
    info!(
        "Sampling {} random portfolios over {} assets ({:?} weights, seed={:?})",
        config.sim_count,
        universe.len(),
        config.weight_scheme,
        config.seed
    );
    let mut sampler = MonteCarloSampler::from_seed(config.seed, config.weight_scheme);
    sampler.sample(universe, config.sim_count, config.risk_free_rate)
}
