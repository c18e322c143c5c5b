//! Strategy capability trait and the signals a strategy emits.
//!
//! A strategy is configured once, then asked for signals against a panel
//! provider. Signals are returned by value: position matrices per leg, the
//! return panel that values them, and the selection mask used to decide
//! which periods the leg was active.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::PanelDataProvider;
use crate::error::{ConfigError, SignalError};
use crate::frequency::{Frequency, Leg, LegMode};
use crate::panel::Panel;

/// Trait for signal generators (sector momentum, benchmark, ...).
pub trait Strategy: Send + Sync {
    /// Unique display name; result keys are built from it.
    fn name(&self) -> &str;

    /// Replace the strategy's parameters. Validates before applying.
    fn configure(&mut self, params: &StrategyParams) -> Result<(), ConfigError>;

    /// Run the generator against the provider's panels.
    fn generate_signals(&self, data: &dyn PanelDataProvider) -> Result<Signals, SignalError>;

    /// Transaction cost charged per unit of turnover, in basis points.
    fn transaction_cost_bps(&self) -> f64;
}

/// Parameters shared by the strategy variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Sectors to select per side.
    pub num_sectors: usize,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub legs: LegMode,
    pub invert_long: bool,
    pub invert_short: bool,
    pub transaction_cost_bps: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            num_sectors: 5,
            frequency: Frequency::Monthly,
            start_date: default_start_date(),
            end_date: None,
            legs: LegMode::All,
            invert_long: false,
            invert_short: false,
            transaction_cost_bps: 0.0,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_sectors == 0 {
            return Err(ConfigError::InvalidSectorCount);
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ConfigError::InvalidDateRange {
                    start: self.start_date,
                    end,
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default()
}

/// Positions for one leg.
#[derive(Debug, Clone)]
pub struct LegSignal {
    pub leg: Leg,
    pub positions: Panel,
    /// 0/1 selection mask; `None` when every period counts as active.
    pub activity: Option<Panel>,
}

/// Output of one `generate_signals` call.
#[derive(Debug, Clone)]
pub struct Signals {
    pub frequency: Frequency,
    /// Returns the positions are valued against (same columns as positions).
    pub asset_returns: Panel,
    legs: Vec<LegSignal>,
}

impl Signals {
    pub fn new(frequency: Frequency, asset_returns: Panel, legs: Vec<LegSignal>) -> Self {
        Self {
            frequency,
            asset_returns,
            legs,
        }
    }

    pub fn asset_returns(&self) -> &Panel {
        &self.asset_returns
    }

    /// Legs in output order.
    pub fn legs(&self) -> &[LegSignal] {
        &self.legs
    }

    pub fn positions(&self, leg: Leg) -> Option<&Panel> {
        self.leg(leg).map(|l| &l.positions)
    }

    pub fn activity(&self, leg: Leg) -> Option<&Panel> {
        self.leg(leg).and_then(|l| l.activity.as_ref())
    }

    fn leg(&self, leg: Leg) -> Option<&LegSignal> {
        self.legs.iter().find(|l| l.leg == leg)
    }
}
