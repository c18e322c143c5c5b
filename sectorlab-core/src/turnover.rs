//! Turnover and transaction-cost accounting, as pure functions.
//!
//! The same three steps value every leg and the benchmark:
//! 1. `weighted_returns`: per-period sum of asset return × position
//! 2. `turnover`: sum of absolute position changes, from a flat book at t = 0
//! 3. `cost_adjusted_returns`: returns − turnover × cost_bps / 10 000

use serde::{Deserialize, Serialize};

use crate::panel::{nan_sum, Panel, PanelError, TimeSeries};

/// Period-over-period turnover of a position matrix.
///
/// Row 0 is the gross size of the initial book. NaN cells contribute nothing.
pub fn turnover(positions: &Panel) -> TimeSeries {
    let values = (0..positions.n_rows())
        .map(|t| {
            let row = positions.row(t);
            if t == 0 {
                nan_sum(row.iter().map(|w| w.abs()))
            } else {
                let prev = positions.row(t - 1);
                nan_sum(row.iter().zip(prev).map(|(w, p)| (w - p).abs()))
            }
        })
        .collect();
    TimeSeries {
        dates: positions.dates().to_vec(),
        values,
    }
}

/// Portfolio return per period: Σ asset_return × position over shared columns.
///
/// Columns present only in `positions` and NaN products are skipped, so a
/// flat or fully-NaN period returns exactly 0.
pub fn weighted_returns(asset_returns: &Panel, positions: &Panel) -> Result<TimeSeries, PanelError> {
    if asset_returns.dates() != positions.dates() {
        return Err(PanelError::IndexMismatch);
    }
    let pairs: Vec<(usize, usize)> = positions
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(pc, name)| asset_returns.column_index(name).map(|ac| (ac, pc)))
        .collect();

    let values = (0..positions.n_rows())
        .map(|t| {
            let returns = asset_returns.row(t);
            let weights = positions.row(t);
            nan_sum(pairs.iter().map(|&(ac, pc)| returns[ac] * weights[pc]))
        })
        .collect();
    Ok(TimeSeries {
        dates: positions.dates().to_vec(),
        values,
    })
}

/// Subtract the transaction-cost drag implied by `turnover`.
pub fn cost_adjusted_returns(
    returns: &TimeSeries,
    turnover: &TimeSeries,
    cost_bps: f64,
) -> Result<TimeSeries, PanelError> {
    if returns.dates != turnover.dates {
        return Err(PanelError::IndexMismatch);
    }
    let cost_rate = cost_bps / 10_000.0;
    let values = returns
        .values
        .iter()
        .zip(&turnover.values)
        .map(|(r, t)| r - t * cost_rate)
        .collect();
    Ok(TimeSeries {
        dates: returns.dates.clone(),
        values,
    })
}

/// Net returns and turnover of one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSeries {
    pub returns: TimeSeries,
    pub turnover: TimeSeries,
}

/// Value a position matrix: gross returns, turnover, then cost drag.
pub fn evaluate_leg(
    asset_returns: &Panel,
    positions: &Panel,
    cost_bps: f64,
) -> Result<LegSeries, PanelError> {
    let gross = weighted_returns(asset_returns, positions)?;
    let turnover = turnover(positions);
    let returns = cost_adjusted_returns(&gross, &turnover, cost_bps)?;
    Ok(LegSeries { returns, turnover })
}
