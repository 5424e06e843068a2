use crate::portfolio::PortfolioPoint;
use crate::session::FrontierSnapshot;

const TOP: &str = "╔════════════════════════════════════════════════════════════╗";
const RULE: &str = "╠════════════════════════════════════════════════════════════╣";
const BOTTOM: &str = "╚════════════════════════════════════════════════════════════╝";

fn weights_line(names: &[&str], weights: &[f64]) -> String {
    names
        .iter()
        .zip(weights)
        .map(|(n, w)| format!("{} {:.1}%", n, w * 100.0))
        .collect::<Vec<_>>()
        .join("  ")
}

fn stats_line(expected_return: f64, volatility: f64, sharpe: f64) -> String {
    format!(
        "║    E[r] {:>+7.2}%   σ {:>6.2}%   Sharpe {:>6.3}",
        expected_return * 100.0,
        volatility * 100.0,
        sharpe
    )
}

fn point_block(lines: &mut Vec<String>, title: &str, point: Option<&PortfolioPoint>, names: &[&str]) {
    lines.push(format!("║  {}", title));
    match point {
        Some(p) => {
            lines.push(stats_line(p.expected_return, p.volatility, p.sharpe));
            lines.push(format!("║    {}", weights_line(names, &p.weights)));
        }
        None => lines.push("║    (no samples)".to_string()),
    }
}

/// Boxed text summary of a snapshot.
pub fn render_summary(snap: &FrontierSnapshot) -> String {
    let names: Vec<&str> = snap.assets.iter().map(|a| a.name.as_str()).collect();
    let mut lines = vec![
        TOP.to_string(),
        "║           Efficient Frontier (Monte Carlo estimate)        ║".to_string(),
        RULE.to_string(),
        format!(
            "║  Portfolios sampled : {:>8}   Frontier points : {:>5}",
            snap.cloud.len(),
            snap.frontier.len()
        ),
        format!("║  Risk-free rate     : {:>7.2}%", snap.risk_free_rate * 100.0),
        RULE.to_string(),
        "║  Asset       E[r]       σ      Sharpe".to_string(),
    ];
    for a in &snap.assets {
        lines.push(format!(
            "║  {:<8} {:>+7.2}%  {:>6.2}%  {:>7.3}",
            a.name,
            a.expected_return * 100.0,
            a.volatility * 100.0,
            a.sharpe
        ));
    }
    lines.push(RULE.to_string());
    point_block(&mut lines, "Minimum variance", snap.min_variance.as_ref(), &names);
    point_block(&mut lines, "Maximum Sharpe", snap.max_sharpe.as_ref(), &names);

    if !snap.weight_points.is_empty() {
        lines.push(RULE.to_string());
        for (i, p) in snap.weight_points.iter().enumerate() {
            point_block(&mut lines, &format!("Custom weights #{}", i + 1), Some(p), &names);
        }
    }
    if !snap.manual_points.is_empty() {
        lines.push(RULE.to_string());
        lines.push("║  Manual points".to_string());
        lines.extend(
            snap.manual_points
                .iter()
                .map(|p| stats_line(p.expected_return, p.volatility, p.sharpe)),
        );
    }
    lines.push(BOTTOM.to_string());
    lines.push("Frontier is a binned envelope of random samples, not an optimizer result.".to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn print_summary(snap: &FrontierSnapshot) {
    print!("{}", render_summary(snap));
}
