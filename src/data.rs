use crate::error::{FrontierError, Result};
use crate::portfolio::{build_covariance, CorrelationMatrix, CovarianceMatrix};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

// ──────────────────────────────────────────────────────────────────────────────
// Assets
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Asset {
    pub name: String,
    /// Mean return as a decimal (0.08 for 8%).
    pub mean_return: f64,
    /// Volatility as a decimal standard deviation.
    pub volatility: f64,
}

/// Validated result of one load: assets in returns-dataset order, correlations
/// re-ordered to match, and the covariance matrix built from both.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetUniverse {
    assets: Vec<Asset>,
    correlations: CorrelationMatrix,
    covariance: CovarianceMatrix,
}

impl AssetUniverse {
    pub fn new(assets: Vec<Asset>, correlations: CorrelationMatrix) -> Result<Self> {
        let vols: Vec<f64> = assets.iter().map(|a| a.volatility).collect();
        let covariance = build_covariance(&vols, &correlations)?;
        Ok(Self {
            assets,
            correlations,
            covariance,
        })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn names(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn mean_returns(&self) -> Vec<f64> {
        self.assets.iter().map(|a| a.mean_return).collect()
    }

    pub fn volatilities(&self) -> Vec<f64> {
        self.assets.iter().map(|a| a.volatility).collect()
    }

    pub fn correlations(&self) -> &CorrelationMatrix {
        &self.correlations
    }

    pub fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Sources
// ──────────────────────────────────────────────────────────────────────────────

/// Where a dataset lives: an `http(s)://` URL or a local file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetSource {
    Url(String),
    Path(PathBuf),
}

impl DatasetSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatasetSources {
    pub returns: DatasetSource,
    pub volatilities: DatasetSource,
    pub correlations: DatasetSource,
}

impl DatasetSources {
    pub fn parse(returns: &str, volatilities: &str, correlations: &str) -> Self {
        Self {
            returns: DatasetSource::parse(returns),
            volatilities: DatasetSource::parse(volatilities),
            correlations: DatasetSource::parse(correlations),
        }
    }
}

fn load_error(dataset: &str, source: &DatasetSource, reason: impl fmt::Display) -> FrontierError {
    FrontierError::DataLoad {
        dataset: dataset.to_string(),
        source_label: source.to_string(),
        reason: reason.to_string(),
    }
}

/// Reads one dataset's raw text. Non-success HTTP statuses are load failures.
pub async fn fetch_text(dataset: &str, source: &DatasetSource) -> Result<String> {
    match source {
        DatasetSource::Url(url) => {
            let resp = reqwest::Client::new()
                .get(url)
                .send()
                .await
                .map_err(|e| load_error(dataset, source, e))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(load_error(dataset, source, format!("HTTP {}", status)));
            }
            resp.text().await.map_err(|e| load_error(dataset, source, e))
        }
        DatasetSource::Path(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_error(dataset, source, e)),
    }
}

/// Fetches the three datasets concurrently and builds the universe.
///
/// All three must succeed; the first failure aborts the load and nothing is
/// returned, so a caller's previous universe stays in place.
pub async fn load_universe(sources: &DatasetSources) -> Result<AssetUniverse> {
    info!(
        "Loading datasets: returns={}, volatilities={}, correlations={}",
        sources.returns, sources.volatilities, sources.correlations
    );

    let fetched = tokio::try_join!(
        fetch_text("returns", &sources.returns),
        fetch_text("volatilities", &sources.volatilities),
        fetch_text("correlations", &sources.correlations)
    );
    let (returns, vols, corr) = match fetched {
        Ok(texts) => texts,
        Err(e) => {
            warn!("Dataset load aborted: {}", e);
            return Err(e);
        }
    };

    let universe = build_universe(&returns, &vols, &corr)?;
    info!("Loaded {} assets: {:?}", universe.len(), universe.names());
    Ok(universe)
}

// ──────────────────────────────────────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────────────────────────────────────

/// Header row plus labelled data rows, cells still as text.
#[derive(Clone, Debug)]
struct Table {
    header: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
}

fn detect_delimiter(line: &str) -> char {
    [',', ';', '\t']
        .into_iter()
        .max_by_key(|d| line.matches(*d).count())
        .filter(|d| line.contains(*d))
        .unwrap_or(',')
}

fn split_cells(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter)
        .map(|c| c.trim().trim_matches('"').trim().to_string())
        .collect()
}

fn parse_table(dataset: &str, text: &str) -> Result<Table> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .filter(|l| !l.trim().is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| FrontierError::configuration(format!("{} dataset is empty", dataset)))?;
    let delimiter = detect_delimiter(header_line);
    let header = split_cells(header_line, delimiter);

    let mut rows = Vec::new();
    for line in lines {
        let mut cells = split_cells(line, delimiter);
        let label = cells.remove(0);
        if label.is_empty() {
            return Err(FrontierError::configuration(format!(
                "{} dataset has a row without an asset identifier",
                dataset
            )));
        }
        rows.push((label, cells));
    }

    if rows.is_empty() {
        return Err(FrontierError::configuration(format!(
            "{} dataset has a header but no rows",
            dataset
        )));
    }
    Ok(Table { header, rows })
}

/// Parses a numeric cell; a trailing `%` divides by 100.
fn parse_number(dataset: &str, label: &str, cell: &str) -> Result<f64> {
    let (body, divisor) = match cell.strip_suffix('%') {
        Some(stripped) => (stripped.trim(), 100.0),
        None => (cell, 1.0),
    };
    body.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / divisor)
        .ok_or_else(|| {
            FrontierError::configuration(format!(
                "{} dataset: value {:?} for {} is not a number",
                dataset, cell, label
            ))
        })
}

/// First numeric column per asset, keyed by name, keeping file order.
fn parse_series(dataset: &str, text: &str) -> Result<Vec<(String, f64)>> {
    let table = parse_table(dataset, text)?;
    let mut out: Vec<(String, f64)> = Vec::with_capacity(table.rows.len());
    for (label, cells) in &table.rows {
        let cell = cells.first().ok_or_else(|| {
            FrontierError::configuration(format!("{} dataset: no value for {}", dataset, label))
        })?;
        if out.iter().any(|(name, _)| name == label) {
            return Err(FrontierError::configuration(format!(
                "{} dataset lists {} more than once",
                dataset, label
            )));
        }
        out.push((label.clone(), parse_number(dataset, label, cell)?));
    }
    Ok(out)
}

/// Square correlation table re-ordered to `names`.
fn parse_correlations(text: &str, names: &[String]) -> Result<CorrelationMatrix> {
    const DATASET: &str = "correlations";
    let table = parse_table(DATASET, text)?;
    let columns = &table.header[1.min(table.header.len())..];

    if columns.len() != table.rows.len() {
        return Err(FrontierError::configuration(format!(
            "correlation matrix has {} columns but {} rows",
            columns.len(),
            table.rows.len()
        )));
    }
    if table.rows.len() != names.len() {
        return Err(FrontierError::configuration(format!(
            "correlation matrix covers {} assets, returns dataset has {}",
            table.rows.len(),
            names.len()
        )));
    }

    let col_index: HashMap<&str, usize> =
        columns.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
    let row_index: HashMap<&str, usize> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, (label, _))| (label.as_str(), i))
        .collect();

    let mut positions = Vec::with_capacity(names.len());
    for name in names {
        let row = row_index.get(name.as_str()).copied();
        let col = col_index.get(name.as_str()).copied();
        match (row, col) {
            (Some(r), Some(c)) => positions.push((r, c)),
            _ => {
                return Err(FrontierError::configuration(format!(
                    "correlation matrix has no row/column for {}",
                    name
                )));
            }
        }
    }

    let mut rows = vec![vec![0.0; names.len()]; names.len()];
    for (i, &(r, _)) in positions.iter().enumerate() {
        let (label, cells) = &table.rows[r];
        if cells.len() != columns.len() {
            return Err(FrontierError::configuration(format!(
                "correlation row {} has {} values, expected {}",
                label,
                cells.len(),
                columns.len()
            )));
        }
        for (j, &(_, c)) in positions.iter().enumerate() {
            rows[i][j] = parse_number(DATASET, label, &cells[c])?;
        }
    }

    CorrelationMatrix::from_rows(rows)
}

/// Joins the three parsed datasets by asset name. Returns order defines asset order.
pub fn build_universe(returns_text: &str, vols_text: &str, corr_text: &str) -> Result<AssetUniverse> {
    let returns = parse_series("returns", returns_text)?;
    let vols: HashMap<String, f64> = parse_series("volatilities", vols_text)?.into_iter().collect();

    if vols.len() != returns.len() {
        return Err(FrontierError::configuration(format!(
            "returns dataset has {} assets, volatilities dataset has {}",
            returns.len(),
            vols.len()
        )));
    }

    let mut assets = Vec::with_capacity(returns.len());
    for (name, mean_return) in returns {
        let volatility = *vols.get(&name).ok_or_else(|| {
            FrontierError::configuration(format!("no volatility for {}", name))
        })?;
        if volatility < 0.0 {
            warn!("{} has a negative volatility ({}); results will be meaningless", name, volatility);
        }
        assets.push(Asset {
            name,
            mean_return,
            volatility,
        });
    }

    let names: Vec<String> = assets.iter().map(|a| a.name.clone()).collect();
    let correlations = parse_correlations(corr_text, &names)?;
    AssetUniverse::new(assets, correlations)
}

#[cfg(test)]
pub(crate) const TEST_RETURNS: &str = "asset,mean_return\nEQ,0.08\nBOND,0.03\nGOLD,0.05\n";
#[cfg(test)]
pub(crate) const TEST_VOLS: &str = "asset,volatility\nEQ,0.18\nBOND,0.06\nGOLD,0.15\n";
#[cfg(test)]
pub(crate) const TEST_CORR: &str =
    "asset,EQ,BOND,GOLD\nEQ,1,-0.2,0.1\nBOND,-0.2,1,0.3\nGOLD,0.1,0.3,1\n";

/// Three-asset fixture shared by the module tests.
#[cfg(test)]
pub(crate) fn test_universe() -> AssetUniverse {
    build_universe(TEST_RETURNS, TEST_VOLS, TEST_CORR).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_build_universe() {
        let universe = test_universe();
        assert_eq!(universe.names(), vec!["EQ", "BOND", "GOLD"]);
        assert_eq!(universe.mean_returns(), vec![0.08, 0.03, 0.05]);
        assert_eq!(universe.volatilities(), vec![0.18, 0.06, 0.15]);
        assert!((universe.covariance().get(0, 1) - 0.18 * 0.06 * -0.2).abs() < 1e-12);
    }

    #[test]
    fn test_datasets_are_joined_by_name() {
        let vols = "name;vol\nGOLD;15%\nEQ;18%\nBOND;6%\n";
        let corr = "asset,GOLD,BOND,EQ\nBOND,0.3,1,-0.2\nGOLD,1,0.3,0.1\nEQ,0.1,-0.2,1\n";
        let universe = build_universe(TEST_RETURNS, vols, corr).unwrap();
        assert_eq!(universe, test_universe());
        let c = universe.correlations();
        assert_eq!(c.dim(), 3);
        assert_eq!((c.get(0, 1), c.get(1, 2), c.get(2, 0)), (-0.2, 0.3, 0.1));
    }

    #[test]
    fn test_parse_tolerates_quotes_blank_lines_and_tabs() {
        let returns = "\u{feff}\"asset\"\t\"ret\"\n\n\"EQ\"\t0.08\nBOND\t0.03\n\nGOLD\t0.05\n";
        let universe = build_universe(returns, TEST_VOLS, TEST_CORR).unwrap();
        assert_eq!(universe.names(), vec!["EQ", "BOND", "GOLD"]);
    }

    #[test]
    fn test_mismatched_datasets_are_configuration_errors() {
        let short_vols = "asset,volatility\nEQ,0.18\nBOND,0.06\n";
        let err = build_universe(TEST_RETURNS, short_vols, TEST_CORR).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));

        let wrong_name = "asset,volatility\nEQ,0.18\nBOND,0.06\nOIL,0.3\n";
        let err = build_universe(TEST_RETURNS, wrong_name, TEST_CORR).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));

        let not_square = "asset,EQ,BOND\nEQ,1,0\nBOND,0,1\nGOLD,0,0\n";
        let err = build_universe(TEST_RETURNS, TEST_VOLS, not_square).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));

        let bad_cell = "asset,mean_return\nEQ,abc\nBOND,0.03\nGOLD,0.05\n";
        let err = build_universe(bad_cell, TEST_VOLS, TEST_CORR).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));

        let err = build_universe("asset,mean_return\n", TEST_VOLS, TEST_CORR).unwrap_err();
        assert!(matches!(err, FrontierError::Configuration(_)));
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            DatasetSource::parse(" https://example.com/r.csv "),
            DatasetSource::Url("https://example.com/r.csv".to_string())
        );
        assert_eq!(
            DatasetSource::parse("data/r.csv"),
            DatasetSource::Path(PathBuf::from("data/r.csv"))
        );
    }

    #[tokio::test]
    async fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path.to_string_lossy().into_owned()
        };
        let sources = DatasetSources::parse(
            &write("returns.csv", TEST_RETURNS),
            &write("vols.csv", TEST_VOLS),
            &write("corr.csv", TEST_CORR),
        );
        let universe = load_universe(&sources).await.unwrap();
        assert_eq!(universe, test_universe());

        let missing = DatasetSources {
            correlations: DatasetSource::Path(dir.path().join("nope.csv")),
            ..sources
        };
        let err = load_universe(&missing).await.unwrap_err();
        assert!(matches!(err, FrontierError::DataLoad { ref dataset, .. } if dataset == "correlations"));
    }

    #[tokio::test]
    async fn test_load_over_http() {
        let app = Router::new()
            .route("/returns.csv", get(|| async { TEST_RETURNS }))
            .route("/vols.csv", get(|| async { TEST_VOLS }))
            .route("/corr.csv", get(|| async { TEST_CORR }));
        let base = serve(app).await;
        let sources = DatasetSources::parse(
            &format!("{}/returns.csv", base),
            &format!("{}/vols.csv", base),
            &format!("{}/corr.csv", base),
        );
        let universe = load_universe(&sources).await.unwrap();
        assert_eq!(universe, test_universe());
    }

    #[tokio::test]
    async fn test_single_404_aborts_whole_load() {
        let app = Router::new()
            .route("/returns.csv", get(|| async { TEST_RETURNS }))
            .route("/vols.csv", get(|| async { (StatusCode::NOT_FOUND, "missing") }))
            .route("/corr.csv", get(|| async { TEST_CORR }));
        let base = serve(app).await;
        let sources = DatasetSources::parse(
            &format!("{}/returns.csv", base),
            &format!("{}/vols.csv", base),
            &format!("{}/corr.csv", base),
        );
        let err = load_universe(&sources).await.unwrap_err();
        match err {
            FrontierError::DataLoad { dataset, reason, .. } => {
                assert_eq!(dataset, "volatilities");
                assert!(reason.contains("404"), "unexpected reason: {}", reason);
            }
            other => panic!("expected DataLoad, got {:?}", other),
        }
    }
}
