//! SectorLab Runner: configuration, data loading, orchestration, statistics.
//!
//! This crate builds on `sectorlab-core` to provide:
//! - TOML run configuration with load-time validation
//! - CSV panel loading (forward-filled daily calendar) with a synthetic fallback
//! - The backtest orchestrator and its keyed results collection
//! - Per-series statistics and Markdown/CSV/Parquet/JSON reporting

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod report;
pub mod statistics;

pub use backtest::{Backtest, BacktestError, ResultEntry, ResultsCollection, SeriesKey};
pub use config::{BacktestConfig, BenchmarkConfig, ConfigLoadError, StrategyConfig, StrategyKind};
pub use data_loader::{generate_synthetic_panels, load_panels, LoadError, LoadedPanels};
pub use report::{
    cumulative_returns, export_json, export_returns_csv, save_artifacts, statistics_table,
    write_returns_parquet,
};
pub use statistics::{compute_all, periods_per_year_for, ActivityMask, StrategyStatistics};
