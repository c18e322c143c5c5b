//! Configuration and signal-generation errors.

use chrono::NaiveDate;
use thiserror::Error;

use crate::panel::PanelError;

/// Invalid strategy or run configuration. Raised before any computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid trading frequency '{0}' (expected one of D, W, 2W, M)")]
    InvalidFrequency(String),

    #[error("invalid legs parameter '{0}' (expected one of L, S, LS, ALL)")]
    InvalidLegs(String),

    #[error("invalid date range: end date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("number of sectors must be at least 1")]
    InvalidSectorCount,
}

/// Errors from a signal generator run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("panel error: {0}")]
    Panel(#[from] PanelError),
}
