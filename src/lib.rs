//! Efficient-frontier kernel: loads per-asset return/volatility/correlation
//! data, samples random portfolios, estimates the frontier envelope and marks
//! the minimum-variance and maximum-Sharpe portfolios.

pub mod config;
pub mod data;
pub mod error;
pub mod frontier;
pub mod portfolio;
pub mod report;
pub mod sampler;
pub mod session;

pub use config::{RunConfig, WeightScheme};
pub use data::{load_universe, Asset, AssetUniverse, DatasetSource, DatasetSources};
pub use error::{FrontierError, Result};
pub use frontier::FrontierEstimate;
pub use portfolio::PortfolioPoint;
pub use session::{FrontierSnapshot, ManualPoint, Session};
