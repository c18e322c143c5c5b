//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [data]
//! dir = "data"
//!
//! [benchmark]
//! frequency = "M"
//! start_date = "1980-01-01"
//! # transaction_cost_bps defaults to the first strategy's cost
//!
//! [[strategies]]
//! name = "Momentum Sector Long-Short Strategy"
//! type = "momentum_sector_ls"
//! num_sectors = 5
//! legs = "ALL"
//! transaction_cost_bps = 5.0
//! ```
//!
//! Everything is validated at load time, before any panel is touched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sectorlab_core::{Benchmark, ConfigError, Frequency, SectorMomentum, Strategy, StrategyParams};

/// Errors from reading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),

    #[error("duplicate strategy name '{0}'")]
    DuplicateStrategy(String),

    #[error("strategy name must not be empty")]
    EmptyStrategyName,
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the price, presence, and sector map CSVs.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Unset: the first strategy's cost, or zero without strategies.
    pub transaction_cost_bps: Option<f64>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let params = StrategyParams::default();
        Self {
            frequency: params.frequency,
            start_date: params.start_date,
            end_date: params.end_date,
            transaction_cost_bps: None,
        }
    }
}

/// Strategy variants a config can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MomentumSectorLs,
}

/// One `[[strategies]]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    #[serde(flatten)]
    pub params: StrategyParams,
}

impl BacktestConfig {
    /// Read and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.build_benchmark()?;
        let mut seen = HashSet::new();
        for strategy in &self.strategies {
            if strategy.name.trim().is_empty() {
                return Err(ConfigLoadError::EmptyStrategyName);
            }
            if !seen.insert(strategy.name.as_str()) {
                return Err(ConfigLoadError::DuplicateStrategy(strategy.name.clone()));
            }
            strategy.params.validate()?;
        }
        Ok(())
    }

    /// Data directory, `./data` when unset.
    pub fn data_dir(&self) -> PathBuf {
        self.data.dir.clone().unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn build_benchmark(&self) -> Result<Benchmark, ConfigError> {
        let b = &self.benchmark;
        Benchmark::new(
            b.frequency,
            b.start_date,
            b.end_date,
            self.benchmark_cost_bps(),
        )
    }

    /// Benchmark drag, shared with the first strategy unless set explicitly.
    pub fn benchmark_cost_bps(&self) -> f64 {
        self.benchmark.transaction_cost_bps.unwrap_or_else(|| {
            self.strategies
                .first()
                .map_or(0.0, |s| s.params.transaction_cost_bps)
        })
    }

    /// Configured strategies in file order.
    pub fn build_strategies(&self) -> Result<Vec<Box<dyn Strategy>>, ConfigError> {
        self.strategies
            .iter()
            .map(|s| -> Result<Box<dyn Strategy>, ConfigError> {
                match s.kind {
                    StrategyKind::MomentumSectorLs => Ok(Box::new(SectorMomentum::with_params(
                        s.name.clone(),
                        s.params.clone(),
                    )?)),
                }
            })
            .collect()
    }
}
