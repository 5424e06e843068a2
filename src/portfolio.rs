use crate::config::VOL_EPSILON;
use crate::error::{FrontierError, Result};
use serde::Serialize;

// ──────────────────────────────────────────────────────────────────────────────
// Matrices
// ──────────────────────────────────────────────────────────────────────────────

/// Pairwise correlations, square and indexed in asset order.
///
/// Symmetry and the unit diagonal are assumed from the input, not enforced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationMatrix(Vec<Vec<f64>>);

impl CorrelationMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(FrontierError::configuration(format!(
                "correlation matrix is not square: row {} has {} values, expected {}",
                i,
                row.len(),
                n
            )));
        }
        Ok(Self(rows))
    }

    pub fn identity(n: usize) -> Self {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self(rows)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.0[i][j]
    }
}

/// `cov[i][j] = vol[i] * vol[j] * corr[i][j]`. Replaced wholesale, never patched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CovarianceMatrix(Vec<Vec<f64>>);

impl CovarianceMatrix {
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.0[i][j]
    }
}

/// Combines per-asset volatilities and the correlation matrix into a covariance matrix.
pub fn build_covariance(vols: &[f64], corr: &CorrelationMatrix) -> Result<CovarianceMatrix> {
    let n = vols.len();
    if corr.dim() != n {
        return Err(FrontierError::configuration(format!(
            "{} volatilities but a {}x{} correlation matrix",
            n,
            corr.dim(),
            corr.dim()
        )));
    }

    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            cov[i][j] = vols[i] * vols[j] * corr.get(i, j);
        }
    }
    Ok(CovarianceMatrix(cov))
}

// ──────────────────────────────────────────────────────────────────────────────
// Portfolio Math
// ──────────────────────────────────────────────────────────────────────────────

/// Plain dot product; linear in `weights`, no sum-to-one requirement.
pub fn expected_return(weights: &[f64], means: &[f64]) -> f64 {
    debug_assert_eq!(weights.len(), means.len());
    weights.iter().zip(means.iter()).map(|(w, r)| w * r).sum()
}

pub fn portfolio_variance(weights: &[f64], cov: &CovarianceMatrix) -> f64 {
    let n = weights.len();
    debug_assert_eq!(n, cov.dim());
    let mut var = 0.0;
    for i in 0..n {
        for j in 0..n {
            var += weights[i] * cov.get(i, j) * weights[j];
        }
    }
    var
}

/// Square root of the quadratic form. A covariance matrix that is not positive
/// semi-definite can produce NaN here; that is an input-quality problem.
pub fn volatility(weights: &[f64], cov: &CovarianceMatrix) -> f64 {
    portfolio_variance(weights, cov).sqrt()
}

/// Rescales `weights` to sum to 1.
pub fn normalize_weights(weights: &[f64]) -> Result<Vec<f64>> {
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return Err(FrontierError::InvalidWeights);
    }
    Ok(weights.iter().map(|w| w / sum).collect())
}

/// Excess return per unit of volatility. Riskless (zero-vol) points score 0.
pub fn sharpe_ratio(ret: f64, vol: f64, risk_free_rate: f64) -> f64 {
    if vol > VOL_EPSILON {
        (ret - risk_free_rate) / vol
    } else {
        0.0
    }
}

/// A fully-evaluated portfolio: weights summing to 1 plus the derived statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioPoint {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

impl PortfolioPoint {
    pub fn evaluate(
        weights: Vec<f64>,
        means: &[f64],
        cov: &CovarianceMatrix,
        risk_free_rate: f64,
    ) -> Self {
        let expected_return = expected_return(&weights, means);
        let volatility = volatility(&weights, cov);
        Self {
            weights,
            expected_return,
            volatility,
            sharpe: sharpe_ratio(expected_return, volatility, risk_free_rate),
        }
    }

    /// Same point, Sharpe ratio re-derived for another risk-free rate.
    pub fn with_risk_free(&self, risk_free_rate: f64) -> Self {
        Self {
            sharpe: sharpe_ratio(self.expected_return, self.volatility, risk_free_rate),
            ..self.clone()
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn two_asset_cov() -> CovarianceMatrix {
        build_covariance(&[0.20, 0.10], &CorrelationMatrix::identity(2)).unwrap()
    }

    fn three_asset_corr() -> CorrelationMatrix {
        CorrelationMatrix::from_rows(vec![
            vec![1.0, 0.3, -0.2],
            vec![0.3, 1.0, 0.5],
            vec![-0.2, 0.5, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_two_asset_scenario() {
        let cov = two_asset_cov();
        let w = [0.5, 0.5];
        let ret = expected_return(&w, &[0.10, 0.05]);
        let vol = volatility(&w, &cov);
        assert!((ret - 0.075).abs() < 1e-12);
        assert!((vol - 0.0125_f64.sqrt()).abs() < 1e-12);
        assert!((vol - 0.1118).abs() < 1e-4);
    }

    #[test]
    fn test_covariance_matrix_symmetry() {
        let cov = build_covariance(&[0.15, 0.25, 0.30], &three_asset_corr()).unwrap();
        assert_eq!(cov.dim(), 3);
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (cov.get(i, j) - cov.get(j, i)).abs() < 1e-15,
                    "Covariance matrix should be symmetric"
                );
            }
        }
        assert!((cov.get(0, 0) - 0.0225).abs() < 1e-12);
        assert!((cov.get(0, 2) - 0.15 * 0.30 * -0.2).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch_is_configuration_error() {
        let err = build_covariance(&[0.1, 0.2], &three_asset_corr()).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));

        let err = CorrelationMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0]]).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));
    }

    #[test]
    fn test_volatility_non_negative() {
        let cov = build_covariance(&[0.15, 0.25, 0.30], &three_asset_corr()).unwrap();
        let candidates = [
            [1.0, 0.0, 0.0],
            [0.2, 0.3, 0.5],
            [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
            [0.6, 0.0, 0.4],
        ];
        for w in candidates {
            assert!(volatility(&w, &cov) >= 0.0, "Portfolio volatility should be non-negative");
        }
    }

    #[test]
    fn test_expected_return_is_linear() {
        let means = [0.08, 0.03, 0.12];
        let w1 = [0.2, 0.5, 0.3];
        let w2 = [1.5, -0.5, 2.0];
        let (a, b) = (0.7, -1.3);
        let combined: Vec<f64> = w1.iter().zip(w2.iter()).map(|(x, y)| a * x + b * y).collect();
        let lhs = expected_return(&combined, &means);
        let rhs = a * expected_return(&w1, &means) + b * expected_return(&w2, &means);
        assert!((lhs - rhs).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_weights() {
        for raw in [vec![1.0, 2.0, 3.0], vec![0.001, 0.0, 5.0], vec![60.0, 40.0]] {
            let w = normalize_weights(&raw).unwrap();
            let sum: f64 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "Weights should sum to 1.0, got {}", sum);
        }
        assert!(matches!(
            normalize_weights(&[0.0, 0.0, 0.0]),
            Err(FrontierError::InvalidWeights)
        ));
    }

    #[test]
    fn test_sharpe_ratio() {
        assert!((sharpe_ratio(0.10, 0.20, 0.02) - 0.4).abs() < 1e-12);
        assert_eq!(sharpe_ratio(0.05, 0.0, 0.02), 0.0);
    }

    #[test]
    fn test_point_rederives_sharpe() {
        let cov = two_asset_cov();
        let p = PortfolioPoint::evaluate(vec![1.0, 0.0], &[0.10, 0.05], &cov, 0.0);
        assert!((p.sharpe - 0.5).abs() < 1e-12);
        let q = p.with_risk_free(0.02);
        assert!((q.sharpe - 0.4).abs() < 1e-12);
        assert_eq!(q.weights, p.weights);
    }
}
