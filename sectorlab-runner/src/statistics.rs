//! Strategy statistics: pure functions over a return series.
//!
//! All values are fractions. When an activity mask is supplied, returns and
//! turnover are first restricted to periods where at least one position or
//! membership was active; periods the mask does not cover count as inactive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sectorlab_core::{nan_sum, ConfigError, Frequency, Panel, TimeSeries};

use crate::backtest::ResultsCollection;

/// Statistics for one return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatistics {
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub skewness: f64,
    pub max_drawdown: f64,
    pub average_turnover: f64,
}

/// Which periods count when computing statistics.
#[derive(Debug, Clone, Copy)]
pub enum ActivityMask<'a> {
    /// Active when the NaN-skipping row sum is positive.
    Panel(&'a Panel),
    /// Active when the value is positive.
    Series(&'a TimeSeries),
}

impl ActivityMask<'_> {
    /// Whether `date` is an active period.
    pub fn is_active(&self, date: NaiveDate) -> bool {
        match self {
            Self::Panel(panel) => panel
                .dates()
                .binary_search(&date)
                .map(|r| nan_sum(panel.row(r).iter().copied()) > 0.0)
                .unwrap_or(false),
            Self::Series(series) => series.value_at(date).is_some_and(|v| v > 0.0),
        }
    }

    /// Restrict `series` to active periods.
    pub fn apply(&self, series: &TimeSeries) -> TimeSeries {
        let keep: Vec<bool> = series.dates.iter().map(|&d| self.is_active(d)).collect();
        series.filter_by(&keep)
    }
}

impl StrategyStatistics {
    /// Compute the full statistics set.
    pub fn compute(
        returns: &TimeSeries,
        turnover: Option<&TimeSeries>,
        frequency: Frequency,
        activity: Option<ActivityMask<'_>>,
    ) -> Self {
        let (returns, turnover) = match activity {
            Some(mask) => (mask.apply(returns), turnover.map(|t| mask.apply(t))),
            None => (returns.clone(), turnover.cloned()),
        };
        let ppy = f64::from(frequency.periods_per_year());
        let r = &returns.values;

        let annualized_return = annualized_return(r, ppy);
        let annualized_volatility = sample_std(r) * ppy.sqrt();
        let sharpe_ratio = if annualized_volatility == 0.0 {
            f64::NAN
        } else {
            annualized_return / annualized_volatility
        };

        Self {
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            skewness: skewness(r),
            max_drawdown: max_drawdown(r),
            average_turnover: turnover.map_or(f64::NAN, |t| mean(&t.values)),
        }
    }
}

/// Statistics for every entry of a results collection, in collection order.
///
/// Each entry is filtered by its own activity mask, if any.
pub fn compute_all(results: &ResultsCollection) -> Vec<(String, StrategyStatistics)> {
    results
        .iter()
        .map(|entry| {
            let stats = StrategyStatistics::compute(
                &entry.returns,
                Some(&entry.turnover),
                entry.frequency,
                entry.activity.as_ref().map(ActivityMask::Panel),
            );
            (entry.label(), stats)
        })
        .collect()
}

/// Periods per year for a frequency code (`D`, `W`, `2W`, `M`).
pub fn periods_per_year_for(code: &str) -> Result<u32, ConfigError> {
    code.parse::<Frequency>().map(Frequency::periods_per_year)
}

// ─── Individual statistics ──────────────────────────────────────────

/// Geometric annualized return; 0 for an empty series.
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    let years = returns.len() as f64 / periods_per_year;
    growth.powf(1.0 / years) - 1.0
}

/// Sample standard deviation (n − 1); NaN below two observations.
pub fn sample_std(returns: &[f64]) -> f64 {
    let n = returns.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(returns);
    let ss: f64 = returns.iter().map(|r| (r - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Population skewness m3 / m2^1.5; NaN for an empty or constant series.
pub fn skewness(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let n = returns.len() as f64;
    let m = mean(returns);
    let m2 = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / n;
    let m3 = returns.iter().map(|r| (r - m).powi(3)).sum::<f64>() / n;
    // Constant within float resolution
    if m2 <= (1e-15 * m).powi(2) {
        return f64::NAN;
    }
    m3 / m2.powf(1.5)
}

/// Worst peak-to-trough decline of the compounded path, as a negative fraction.
///
/// NaN for an empty series.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let mut cumulative = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = f64::INFINITY;
    for r in returns {
        cumulative *= 1.0 + r;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative / peak - 1.0);
    }
    worst
}

/// Arithmetic mean; NaN for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
