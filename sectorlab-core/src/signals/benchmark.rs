//! Equal-weighted, long-only benchmark over the member universe.
//!
//! Each period holds every asset that was a member at the end of the previous
//! period, at weight 1 / member count. A period with no members has NaN
//! weights, which contribute nothing to returns or turnover.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::PanelDataProvider;
use crate::error::{ConfigError, SignalError};
use crate::frequency::{Frequency, Leg};
use crate::lag::lag_one_period;
use crate::panel::{Panel, TimeSeries};
use crate::strategy::{default_start_date, LegSignal, Signals, Strategy, StrategyParams};
use crate::turnover::evaluate_leg;

/// Net returns and turnover of the benchmark, computed ahead of a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReturns {
    pub returns: TimeSeries,
    pub turnover: TimeSeries,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Benchmark {
    frequency: Frequency,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    transaction_cost_bps: f64,
}

impl Default for Benchmark {
    fn default() -> Self {
        Self {
            frequency: Frequency::Monthly,
            start_date: default_start_date(),
            end_date: None,
            transaction_cost_bps: 0.0,
        }
    }
}

impl Benchmark {
    pub const NAME: &'static str = "Benchmark";

    pub fn new(
        frequency: Frequency,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        transaction_cost_bps: f64,
    ) -> Result<Self, ConfigError> {
        if let Some(end) = end_date {
            if end < start_date {
                return Err(ConfigError::InvalidDateRange {
                    start: start_date,
                    end,
                });
            }
        }
        Ok(Self {
            frequency,
            start_date,
            end_date,
            transaction_cost_bps,
        })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Value the benchmark book: the pre-step every backtest is seeded with.
    pub fn calculate_returns(
        &self,
        data: &dyn PanelDataProvider,
    ) -> Result<BenchmarkReturns, SignalError> {
        let (member_returns, weights) = self.member_book(data)?;
        let leg = evaluate_leg(&member_returns, &weights, self.transaction_cost_bps)?;
        tracing::debug!(
            frequency = %self.frequency,
            periods = leg.returns.len(),
            "benchmark returns calculated"
        );
        Ok(BenchmarkReturns {
            returns: leg.returns,
            turnover: leg.turnover,
            frequency: self.frequency,
        })
    }

    /// Member-gated asset returns and the equal weights that hold them.
    fn member_book(&self, data: &dyn PanelDataProvider) -> Result<(Panel, Panel), SignalError> {
        let prices = data
            .price_panel()
            .resample(self.frequency)
            .between(self.start_date, self.end_date);
        let presence = data
            .presence_panel()
            .resample(self.frequency)
            .between(self.start_date, self.end_date);

        let members = lag_one_period(&presence);
        let member_returns = prices.pct_change().zip_with(&members, |r, m| r * m)?;

        let counts = members.row_sums();
        let weights = members.map_indexed(|r, _, m| m / counts[r]);
        Ok((member_returns, weights))
    }
}

impl Strategy for Benchmark {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// Takes frequency, date window, and cost; sector and leg settings do not apply.
    fn configure(&mut self, params: &StrategyParams) -> Result<(), ConfigError> {
        *self = Self::new(
            params.frequency,
            params.start_date,
            params.end_date,
            params.transaction_cost_bps,
        )?;
        Ok(())
    }

    fn generate_signals(&self, data: &dyn PanelDataProvider) -> Result<Signals, SignalError> {
        let (member_returns, weights) = self.member_book(data)?;
        Ok(Signals::new(
            self.frequency,
            member_returns,
            vec![LegSignal {
                leg: Leg::Long,
                positions: weights,
                activity: None,
            }],
        ))
    }

    fn transaction_cost_bps(&self) -> f64 {
        self.transaction_cost_bps
    }
}
