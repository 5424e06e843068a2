use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use frontier_scope::session::parse_weight_list;
use frontier_scope::{data, report, DatasetSources, RunConfig, Session, WeightScheme};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum SchemeChoice {
    Uniform,
    Dirichlet,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Monte Carlo efficient-frontier estimate from return, volatility and correlation tables",
    after_help = "EXAMPLES:
    # Local CSV files, 50k portfolios, 3% risk-free rate
    cargo run --release -- returns.csv vols.csv corr.csv --simulations 50000 --risk-free 3

    # Overlay a 60/40 portfolio and a manual point, emit JSON for a chart
    cargo run --release -- returns.csv vols.csv corr.csv --weights 60,40 --point 7,12 --json"
)]
struct Args {
    /// Mean returns table (path or http(s) URL)
    returns: String,

    /// Volatilities table (path or http(s) URL)
    volatilities: String,

    /// Correlation matrix table (path or http(s) URL)
    correlations: String,

    /// Risk-free rate in percent (0-100). Defaults to FRONTIER_RISK_FREE_PCT or 2.
    #[arg(long)]
    risk_free: Option<f64>,

    /// Number of random portfolios (clamped to 1000-200000). Defaults to FRONTIER_SIM_COUNT or 20000.
    #[arg(long)]
    simulations: Option<usize>,

    /// Volatility bins used for the frontier envelope
    #[arg(long, default_value_t = frontier_scope::config::FRONTIER_BINS)]
    bins: usize,

    /// Seed for reproducible clouds
    #[arg(long)]
    seed: Option<u64>,

    /// How random weights are drawn
    #[arg(long, value_enum, default_value_t = SchemeChoice::Uniform)]
    scheme: SchemeChoice,

    /// Custom portfolio as percentage weights in asset order, e.g. 60,40 (repeatable)
    #[arg(long = "weights", value_name = "W1,W2,...")]
    weights: Vec<String>,

    /// Manual point as return%,volatility%, e.g. 7,12 (repeatable)
    #[arg(long = "point", value_name = "RET,VOL")]
    points: Vec<String>,

    /// Print the full snapshot as JSON instead of the summary
    #[arg(long)]
    json: bool,
}

fn run_config(args: &Args) -> RunConfig {
    let mut cfg = RunConfig::from_env();
    if let Some(pct) = args.risk_free {
        cfg = cfg.with_risk_free_pct(pct);
    }
    if let Some(n) = args.simulations {
        cfg = cfg.with_sim_count(n);
    }
    let scheme = match args.scheme {
        SchemeChoice::Uniform => WeightScheme::Uniform,
        SchemeChoice::Dirichlet => WeightScheme::Dirichlet,
    };
    cfg.with_bins(args.bins)
        .with_seed(args.seed)
        .with_weight_scheme(scheme)
}

async fn run(args: Args) -> Result<()> {
    let cfg = run_config(&args);
    let sources = DatasetSources::parse(&args.returns, &args.volatilities, &args.correlations);
    let universe = data::load_universe(&sources)
        .await
        .context("Loading datasets failed")?;

    let mut session = Session::new(universe, cfg.clone()).run(cfg);

    for raw in &args.weights {
        let percents = parse_weight_list(raw)?;
        session = session
            .with_weight_point(&percents)
            .with_context(|| format!("Rejected --weights {}", raw))?;
    }
    for raw in &args.points {
        let (ret, vol) = raw
            .split_once(',')
            .with_context(|| format!("--point {} should look like RET,VOL", raw))?;
        session = session
            .with_manual_point(ret, vol)
            .with_context(|| format!("Rejected --point {}", raw))?;
    }

    let snapshot = session.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        report::print_summary(&snapshot);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("frontier_scope=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => {
            info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
