use serde::Serialize;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Lower bound on the number of Monte Carlo portfolios per run.
pub const MIN_SIM_COUNT: usize = 1_000;
/// Upper bound on the number of Monte Carlo portfolios per run.
pub const MAX_SIM_COUNT: usize = 200_000;
pub const DEFAULT_SIM_COUNT: usize = 20_000;

/// Risk-free rate in percent (0–100).
pub const DEFAULT_RISK_FREE_PCT: f64 = 2.0;
pub const MAX_RISK_FREE_PCT: f64 = 100.0;

/// Number of equal-width volatility bins used to extract the frontier envelope.
pub const FRONTIER_BINS: usize = 120;
pub const MIN_FRONTIER_BINS: usize = 10;
pub const MAX_FRONTIER_BINS: usize = 1_000;

/// How far (in percentage points) user weights may stray from 100%.
pub const WEIGHT_SUM_TOLERANCE_PCT: f64 = 0.01;

/// Volatilities below this are treated as riskless when computing Sharpe ratios.
pub const VOL_EPSILON: f64 = 1e-12;

/// How random weight vectors are drawn before normalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScheme {
    /// n independent U(0,1) draws, normalized to sum to 1.
    #[default]
    Uniform,
    /// n independent Exp(1) draws, normalized: a flat Dirichlet, uniform over the simplex.
    Dirichlet,
}

/// Inputs for one sampling run. Every constructor clamps to the supported ranges.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunConfig {
    /// Risk-free rate as a decimal (0.02 for 2%).
    pub risk_free_rate: f64,
    pub sim_count: usize,
    pub bins: usize,
    pub seed: Option<u64>,
    pub weight_scheme: WeightScheme,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_FREE_PCT, DEFAULT_SIM_COUNT)
    }
}

impl RunConfig {
    pub fn new(risk_free_pct: f64, sim_count: usize) -> Self {
        Self {
            risk_free_rate: clamp_risk_free_pct(risk_free_pct) / 100.0,
            sim_count: clamp_sim_count(sim_count),
            bins: FRONTIER_BINS,
            seed: None,
            weight_scheme: WeightScheme::Uniform,
        }
    }

    /// Defaults overridden by `FRONTIER_RISK_FREE_PCT` / `FRONTIER_SIM_COUNT` when set.
    /// The environment is read once per process.
    pub fn from_env() -> Self {
        let env = env_overrides();
        Self::new(
            env.risk_free_pct.unwrap_or(DEFAULT_RISK_FREE_PCT),
            env.sim_count.unwrap_or(DEFAULT_SIM_COUNT),
        )
    }

    pub fn with_risk_free_pct(mut self, pct: f64) -> Self {
        self.risk_free_rate = clamp_risk_free_pct(pct) / 100.0;
        self
    }

    pub fn with_sim_count(mut self, sim_count: usize) -> Self {
        self.sim_count = clamp_sim_count(sim_count);
        self
    }

    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = clamp_bins(bins);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_weight_scheme(mut self, scheme: WeightScheme) -> Self {
        self.weight_scheme = scheme;
        self
    }

    pub fn risk_free_pct(&self) -> f64 {
        self.risk_free_rate * 100.0
    }
}

pub fn clamp_sim_count(requested: usize) -> usize {
    let clamped = requested.clamp(MIN_SIM_COUNT, MAX_SIM_COUNT);
    if clamped != requested {
        info!(
            "Simulation count {} outside [{}, {}], using {}",
            requested, MIN_SIM_COUNT, MAX_SIM_COUNT, clamped
        );
    }
    clamped
}

pub fn clamp_risk_free_pct(pct: f64) -> f64 {
    if !pct.is_finite() {
        warn!(
            "Risk-free rate {} is not a finite number, using default {}%",
            pct, DEFAULT_RISK_FREE_PCT
        );
        return DEFAULT_RISK_FREE_PCT;
    }
    let clamped = pct.clamp(0.0, MAX_RISK_FREE_PCT);
    if clamped != pct {
        info!("Risk-free rate {}% outside [0, 100], using {}%", pct, clamped);
    }
    clamped
}

pub fn clamp_bins(requested: usize) -> usize {
    let clamped = requested.clamp(MIN_FRONTIER_BINS, MAX_FRONTIER_BINS);
    if clamped != requested {
        info!(
            "Frontier bin count {} outside [{}, {}], using {}",
            requested, MIN_FRONTIER_BINS, MAX_FRONTIER_BINS, clamped
        );
    }
    clamped
}

struct EnvOverrides {
    sim_count: Option<usize>,
    risk_free_pct: Option<f64>,
}

static ENV_OVERRIDES: OnceLock<EnvOverrides> = OnceLock::new();

fn env_overrides() -> &'static EnvOverrides {
    ENV_OVERRIDES.get_or_init(|| EnvOverrides {
        sim_count: env_sim_count(),
        risk_free_pct: env_risk_free_pct(),
    })
}

fn env_sim_count() -> Option<usize> {
    let raw = std::env::var("FRONTIER_SIM_COUNT").ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring FRONTIER_SIM_COUNT={} ; expected a positive integer", raw);
            None
        }
    }
}

fn env_risk_free_pct() -> Option<f64> {
    let raw = std::env::var("FRONTIER_RISK_FREE_PCT").ok()?;
    match raw.trim().trim_end_matches('%').parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            warn!("Ignoring FRONTIER_RISK_FREE_PCT={} ; expected a percentage", raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_count_is_clamped() {
        assert_eq!(clamp_sim_count(5), 1_000);
        assert_eq!(clamp_sim_count(1_000_000), 200_000);
        assert_eq!(clamp_sim_count(50_000), 50_000);
        assert_eq!(RunConfig::new(2.0, 5).sim_count, 1_000);
    }

    #[test]
    fn test_risk_free_is_clamped_and_converted() {
        let cfg = RunConfig::new(3.5, 10_000);
        assert!((cfg.risk_free_rate - 0.035).abs() < 1e-12);
        assert!((cfg.risk_free_pct() - 3.5).abs() < 1e-9);

        assert_eq!(RunConfig::new(-4.0, 10_000).risk_free_rate, 0.0);
        assert_eq!(RunConfig::new(250.0, 10_000).risk_free_rate, 1.0);
        assert!((RunConfig::new(f64::NAN, 10_000).risk_free_pct() - DEFAULT_RISK_FREE_PCT).abs() < 1e-9);
    }

    #[test]
    fn test_env_is_read_once() {
        let first = env_overrides();
        assert!(std::ptr::eq(first, env_overrides()));
        assert_eq!(RunConfig::from_env(), RunConfig::from_env());
        let cfg = RunConfig::from_env();
        assert_eq!(cfg.sim_count, clamp_sim_count(first.sim_count.unwrap_or(DEFAULT_SIM_COUNT)));
    }

    #[test]
    fn test_builder_clamps_bins() {
        let cfg = RunConfig::default().with_bins(2).with_seed(Some(7));
        assert_eq!(cfg.bins, MIN_FRONTIER_BINS);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(RunConfig::default().bins, FRONTIER_BINS);
        assert_eq!(RunConfig::default().weight_scheme, WeightScheme::Uniform);
    }
}
