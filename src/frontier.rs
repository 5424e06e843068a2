//! Approximate efficient frontier from a Monte Carlo cloud.
//!
//! This is a binned upper-envelope heuristic, not a mean-variance optimizer:
//! the result can only be as good as the sampled cloud, bins without samples
//! leave gaps, and nothing is interpolated.

use crate::portfolio::PortfolioPoint;
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrontierEstimate {
    /// Per-bin maximum-return points, sorted by ascending volatility.
    pub points: Vec<PortfolioPoint>,
    pub min_variance: Option<PortfolioPoint>,
    pub max_sharpe: Option<PortfolioPoint>,
}

/// Upper envelope of `cloud` over `bins` equal-width volatility bins.
///
/// Bin edges come from the observed min/max volatility. Each non-empty bin
/// `[start, end)` contributes its highest-return point (first one wins a tie);
/// the maximum-volatility point falls in the last bin. Points with a
/// non-finite volatility or return are ignored.
pub fn estimate_frontier(cloud: &[PortfolioPoint], bins: usize) -> Vec<PortfolioPoint> {
    let bins = bins.max(1);
    let usable = |p: &PortfolioPoint| p.volatility.is_finite() && p.expected_return.is_finite();

    let (min_vol, max_vol) = cloud
        .iter()
        .filter(|p| usable(*p))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.volatility), hi.max(p.volatility))
        });
    if min_vol > max_vol {
        return Vec::new();
    }

    let width = (max_vol - min_vol) / bins as f64;
    let mut best: Vec<Option<usize>> = vec![None; bins];

    for (idx, p) in cloud.iter().enumerate() {
        if !usable(p) {
            continue;
        }
        let bin = if width > 0.0 {
            (((p.volatility - min_vol) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        match best[bin] {
            Some(cur) if cloud[cur].expected_return >= p.expected_return => {}
            _ => best[bin] = Some(idx),
        }
    }

    let mut frontier: Vec<PortfolioPoint> =
        best.into_iter().flatten().map(|idx| cloud[idx].clone()).collect();
    frontier.sort_by(|a, b| a.volatility.total_cmp(&b.volatility));
    debug!("Frontier estimate: {} of {} bins populated", frontier.len(), bins);
    frontier
}

/// Lowest-volatility frontier point; ties go to the first encountered.
pub fn min_variance_point(frontier: &[PortfolioPoint]) -> Option<&PortfolioPoint> {
    let mut best: Option<&PortfolioPoint> = None;
    for p in frontier {
        if p.volatility.is_nan() {
            continue;
        }
        match best {
            Some(b) if b.volatility <= p.volatility => {}
            _ => best = Some(p),
        }
    }
    best
}

/// Highest-Sharpe point over the whole cloud, not just the frontier; ties go to the first encountered.
pub fn max_sharpe_point(cloud: &[PortfolioPoint]) -> Option<&PortfolioPoint> {
    let mut best: Option<&PortfolioPoint> = None;
    for p in cloud {
        if p.sharpe.is_nan() {
            continue;
        }
        match best {
            Some(b) if b.sharpe >= p.sharpe => {}
            _ => best = Some(p),
        }
    }
    best
}

/// Frontier polyline plus both optima.
pub fn estimate(cloud: &[PortfolioPoint], bins: usize) -> FrontierEstimate {
    let points = estimate_frontier(cloud, bins);
    let min_variance = min_variance_point(&points).cloned();
    let max_sharpe = max_sharpe_point(cloud).cloned();
    FrontierEstimate {
        points,
        min_variance,
        max_sharpe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::data::test_universe;
    use crate::sampler::sample_cloud;

    fn point(ret: f64, vol: f64) -> PortfolioPoint {
        PortfolioPoint {
            weights: vec![1.0],
            expected_return: ret,
            volatility: vol,
            sharpe: if vol > 0.0 { ret / vol } else { 0.0 },
        }
    }

    fn sampled() -> Vec<PortfolioPoint> {
        let cfg = RunConfig::new(2.0, 5_000).with_seed(Some(2024));
        sample_cloud(&test_universe(), &cfg)
    }

    #[test]
    fn test_frontier_is_sorted_subset_of_cloud() {
        let cloud = sampled();
        let frontier = estimate_frontier(&cloud, 120);
        assert!(!frontier.is_empty());
        assert!(frontier.len() <= 120);
        for p in &frontier {
            assert!(cloud.contains(p), "Frontier point should come from the cloud");
        }
        for pair in frontier.windows(2) {
            assert!(pair[0].volatility <= pair[1].volatility);
        }
    }

    #[test]
    fn test_min_variance_is_lowest_on_frontier() {
        let cloud = sampled();
        let est = estimate(&cloud, 120);
        let mvp = est.min_variance.as_ref().unwrap();
        for p in &est.points {
            assert!(mvp.volatility <= p.volatility);
        }
        assert_eq!(Some(mvp), est.points.first());
    }

    #[test]
    fn test_max_sharpe_dominates_cloud() {
        let cloud = sampled();
        let est = estimate(&cloud, 120);
        let best = est.max_sharpe.as_ref().unwrap();
        for p in &cloud {
            assert!(best.sharpe >= p.sharpe);
        }
    }

    #[test]
    fn test_bin_keeps_highest_return() {
        // vol range [0.10, 0.20] over 2 bins: [0.10, 0.15) and [0.15, 0.20]
        let cloud = vec![
            point(0.04, 0.10),
            point(0.06, 0.12),
            point(0.05, 0.14),
            point(0.03, 0.16),
            point(0.07, 0.20),
        ];
        let frontier = estimate_frontier(&cloud, 2);
        assert_eq!(frontier, vec![cloud[1].clone(), cloud[4].clone()]);
    }

    #[test]
    fn test_empty_bins_leave_gaps() {
        let cloud = vec![point(0.02, 0.05), point(0.09, 0.30)];
        let frontier = estimate_frontier(&cloud, 120);
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn test_ties_go_to_first_encountered() {
        let a = PortfolioPoint { weights: vec![1.0, 0.0], ..point(0.05, 0.10) };
        let b = PortfolioPoint { weights: vec![0.0, 1.0], ..point(0.05, 0.10) };
        let cloud = vec![a.clone(), b];
        assert_eq!(estimate_frontier(&cloud, 10), vec![a.clone()]);
        assert_eq!(max_sharpe_point(&cloud), Some(&a));
        assert_eq!(min_variance_point(&cloud), Some(&a));
    }

    #[test]
    fn test_degenerate_and_empty_clouds() {
        let flat = vec![point(0.03, 0.1), point(0.08, 0.1), point(0.05, 0.1)];
        assert_eq!(estimate_frontier(&flat, 120), vec![flat[1].clone()]);

        let est = estimate(&[], 120);
        assert!(est.points.is_empty());
        assert!(est.min_variance.is_none());
        assert!(est.max_sharpe.is_none());
    }
}
