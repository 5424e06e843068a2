use crate::config::{RunConfig, WEIGHT_SUM_TOLERANCE_PCT};
use crate::data::AssetUniverse;
use crate::error::{FrontierError, Result};
use crate::frontier::{self, FrontierEstimate};
use crate::portfolio::{normalize_weights, sharpe_ratio, PortfolioPoint};
use crate::sampler;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

// ──────────────────────────────────────────────────────────────────────────────
// User points
// ──────────────────────────────────────────────────────────────────────────────

/// A return/volatility pair entered directly, with no weights behind it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ManualPoint {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

impl ManualPoint {
    fn new(expected_return: f64, volatility: f64, risk_free_rate: f64) -> Self {
        Self {
            expected_return,
            volatility,
            sharpe: sharpe_ratio(expected_return, volatility, risk_free_rate),
        }
    }
}

/// Splits a form field such as `"60, 40"` or `"60 40"` into numbers.
pub fn parse_weight_list(text: &str) -> Result<Vec<f64>> {
    text.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('%')
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| FrontierError::validation(format!("weight {:?} is not a number", s)))
        })
        .collect()
}

/// Checks long-only percentage weights against the asset count and the 100%
/// budget, returning decimals rescaled to sum to exactly 1.
pub fn validate_weight_percents(percents: &[f64], asset_count: usize) -> Result<Vec<f64>> {
    if percents.len() != asset_count {
        return Err(FrontierError::validation(format!(
            "expected {} weights, got {}",
            asset_count,
            percents.len()
        )));
    }
    if percents.iter().any(|w| !w.is_finite()) {
        return Err(FrontierError::validation("weights must be numbers"));
    }
    if percents.iter().any(|&w| w < 0.0) {
        return Err(FrontierError::validation("weights must not be negative"));
    }
    let total: f64 = percents.iter().sum();
    if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE_PCT {
        return Err(FrontierError::validation("weights must sum to 100%"));
    }
    normalize_weights(percents)
}

/// Parses a percentage entry field (`"7.5"` or `"7.5%"`) into a decimal.
pub fn parse_percent_field(label: &str, text: &str) -> Result<f64> {
    text.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
        .ok_or_else(|| FrontierError::validation(format!("{} must be a number, got {:?}", label, text)))
}

// ──────────────────────────────────────────────────────────────────────────────
// Session
// ──────────────────────────────────────────────────────────────────────────────

/// Everything one run produced, as an immutable value.
///
/// Every operation returns a new `Session`; a failed operation returns an
/// error and leaves the current value untouched. Large parts are shared via
/// `Arc`, so deriving a session with one more user point is cheap.
#[derive(Clone, Debug)]
pub struct Session {
    universe: Arc<AssetUniverse>,
    config: RunConfig,
    cloud: Arc<Vec<PortfolioPoint>>,
    frontier: Arc<FrontierEstimate>,
    weight_points: Vec<PortfolioPoint>,
    manual_points: Vec<ManualPoint>,
    generated_at: Option<String>,
}

impl Session {
    /// A freshly loaded session with no cloud yet.
    pub fn new(universe: AssetUniverse, config: RunConfig) -> Self {
        Self {
            universe: Arc::new(universe),
            config,
            cloud: Arc::new(Vec::new()),
            frontier: Arc::new(FrontierEstimate::default()),
            weight_points: Vec::new(),
            manual_points: Vec::new(),
            generated_at: None,
        }
    }

    /// Samples a new cloud and frontier under `config`. User points carry over,
    /// with Sharpe ratios re-derived for the new risk-free rate.
    pub fn run(&self, config: RunConfig) -> Self {
        let cloud = sampler::sample_cloud(&self.universe, &config);
        let estimate = frontier::estimate(&cloud, config.bins);

        match (&estimate.min_variance, &estimate.max_sharpe) {
            (Some(mvp), Some(tangency)) => info!(
                "Run complete: {} portfolios, {} frontier points, MVP σ={:.4} E[r]={:.4}, max Sharpe={:.3}",
                cloud.len(),
                estimate.points.len(),
                mvp.volatility,
                mvp.expected_return,
                tangency.sharpe
            ),
            _ => warn!("Run produced no frontier ({} portfolios sampled)", cloud.len()),
        }

        let rf = config.risk_free_rate;
        Self {
            universe: Arc::clone(&self.universe),
            cloud: Arc::new(cloud),
            frontier: Arc::new(estimate),
            weight_points: self.weight_points.iter().map(|p| p.with_risk_free(rf)).collect(),
            manual_points: self
                .manual_points
                .iter()
                .map(|p| ManualPoint::new(p.expected_return, p.volatility, rf))
                .collect(),
            generated_at: Some(chrono::Local::now().to_rfc3339()),
            config,
        }
    }

    /// Adds a portfolio from percentage weights (must total 100%).
    pub fn with_weight_point(&self, percents: &[f64]) -> Result<Self> {
        let weights = validate_weight_percents(percents, self.universe.len())?;
        let point = PortfolioPoint::evaluate(
            weights,
            &self.universe.mean_returns(),
            self.universe.covariance(),
            self.config.risk_free_rate,
        );
        let mut next = self.clone();
        next.weight_points.push(point);
        Ok(next)
    }

    /// Adds a point from percentage return/volatility text, bypassing portfolio math.
    pub fn with_manual_point(&self, return_text: &str, volatility_text: &str) -> Result<Self> {
        let ret = parse_percent_field("return", return_text)?;
        let vol = parse_percent_field("volatility", volatility_text)?;
        let mut next = self.clone();
        next.manual_points
            .push(ManualPoint::new(ret, vol, self.config.risk_free_rate));
        Ok(next)
    }

    pub fn clear_weight_points(&self) -> Self {
        Self {
            weight_points: Vec::new(),
            ..self.clone()
        }
    }

    pub fn clear_manual_points(&self) -> Self {
        Self {
            manual_points: Vec::new(),
            ..self.clone()
        }
    }

    pub fn universe(&self) -> &AssetUniverse {
        &self.universe
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn cloud(&self) -> &[PortfolioPoint] {
        &self.cloud
    }

    pub fn frontier(&self) -> &FrontierEstimate {
        &self.frontier
    }

    pub fn weight_points(&self) -> &[PortfolioPoint] {
        &self.weight_points
    }

    pub fn manual_points(&self) -> &[ManualPoint] {
        &self.manual_points
    }

    /// One 100%-single-asset portfolio per asset, for plotting the assets themselves.
    pub fn asset_markers(&self) -> Vec<AssetMarker> {
        let rf = self.config.risk_free_rate;
        self.universe
            .assets()
            .iter()
            .map(|a| AssetMarker {
                name: a.name.clone(),
                expected_return: a.mean_return,
                volatility: a.volatility,
                sharpe: sharpe_ratio(a.mean_return, a.volatility, rf),
            })
            .collect()
    }

    pub fn snapshot(&self) -> FrontierSnapshot {
        FrontierSnapshot {
            assets: self.asset_markers(),
            risk_free_rate: self.config.risk_free_rate,
            sim_count: self.config.sim_count,
            seed: self.config.seed,
            cloud: self.cloud.to_vec(),
            frontier: self.frontier.points.clone(),
            min_variance: self.frontier.min_variance.clone(),
            max_sharpe: self.frontier.max_sharpe.clone(),
            weight_points: self.weight_points.clone(),
            manual_points: self.manual_points.clone(),
            generated_at: self.generated_at.clone(),
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Snapshot
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetMarker {
    pub name: String,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

/// Plain-data view of one session for a rendering layer.
#[derive(Clone, Debug, Serialize)]
pub struct FrontierSnapshot {
    pub assets: Vec<AssetMarker>,
    pub risk_free_rate: f64,
    pub sim_count: usize,
    pub seed: Option<u64>,
    pub cloud: Vec<PortfolioPoint>,
    pub frontier: Vec<PortfolioPoint>,
    pub min_variance: Option<PortfolioPoint>,
    pub max_sharpe: Option<PortfolioPoint>,
    pub weight_points: Vec<PortfolioPoint>,
    pub manual_points: Vec<ManualPoint>,
    pub generated_at: Option<String>,
}

// ──────────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────────
