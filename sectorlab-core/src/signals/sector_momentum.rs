//! Sector momentum long/short.
//!
//! Per rebalance period:
//! 1. Asset returns are gated by last period's membership and averaged by sector
//! 2. Each sector is scored by its trailing mean return, excluding the current period
//! 3. The top `min(k, available / 2)` sectors go long, the bottom ones short,
//!    equal-weighted within each side
//!
//! Positions are sector-keyed and valued against sector-average returns.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::data::{PanelDataProvider, Sector, SectorMap};
use crate::error::{ConfigError, SignalError};
use crate::frequency::{Frequency, Leg};
use crate::lag::lag_one_period;
use crate::panel::{nan_mean, Panel, PanelError};
use crate::strategy::{LegSignal, Signals, Strategy, StrategyParams};

/// Trailing window of the momentum score: eleven months' worth of periods,
/// less one, never below one.
pub fn momentum_window(frequency: Frequency) -> usize {
    let periods = (11.0 / 12.0 * f64::from(frequency.periods_per_year())).round() as usize;
    periods.saturating_sub(1).max(1)
}

#[derive(Debug, Clone)]
pub struct SectorMomentum {
    name: String,
    params: StrategyParams,
}

impl SectorMomentum {
    pub const DEFAULT_NAME: &'static str = "Momentum Sector Long-Short Strategy";

    /// A strategy with default parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: StrategyParams::default(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: StrategyParams) -> Result<Self, ConfigError> {
        let mut strategy = Self::new(name);
        strategy.configure(&params)?;
        Ok(strategy)
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }
}

impl Default for SectorMomentum {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

impl Strategy for SectorMomentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, params: &StrategyParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params.clone();
        Ok(())
    }

    fn generate_signals(&self, data: &dyn PanelDataProvider) -> Result<Signals, SignalError> {
        let p = &self.params;
        p.validate()?;
        let frequency = p.frequency;

        let returns = data
            .price_panel()
            .resample(frequency)
            .pct_change()
            .between(p.start_date, p.end_date);
        let presence = data
            .presence_panel()
            .resample(frequency)
            .between(p.start_date, p.end_date);

        let member_returns = returns
            .zip_with(&lag_one_period(&presence), |r, m| r * m)?
            .drop_all_nan_columns();
        let sector_returns = sector_average_returns(&member_returns, data.asset_to_sector_map())?;

        let window = momentum_window(frequency);
        let momentum = lag_one_period(&sector_returns).rolling_mean(window);
        let (top, bottom) = select_sectors(&momentum, p.num_sectors);

        let mut long = equal_weights(&top, 1.0);
        let mut short = equal_weights(&bottom, -1.0);
        if p.invert_long {
            long = long.map(|w| -w);
        }
        if p.invert_short {
            short = short.map(|w| -w);
        }
        let combined = long.zip_with(&short, |l, s| l + s)?;
        let either = top.zip_with(&bottom, |a, b| (a + b).min(1.0))?;

        let legs = p
            .legs
            .legs()
            .iter()
            .map(|&leg| {
                let (positions, activity) = match leg {
                    Leg::Long => (&long, &top),
                    Leg::Short => (&short, &bottom),
                    Leg::Combined => (&combined, &either),
                };
                LegSignal {
                    leg,
                    positions: positions.clone(),
                    activity: Some(activity.clone()),
                }
            })
            .collect();

        let active_periods = top.row_sums().iter().filter(|&&n| n > 0.0).count();
        tracing::debug!(
            strategy = %self.name,
            frequency = %frequency,
            window,
            periods = momentum.n_rows(),
            sectors = momentum.n_cols(),
            active_periods,
            "sector momentum signals generated"
        );

        Ok(Signals::new(frequency, sector_returns, legs))
    }

    fn transaction_cost_bps(&self) -> f64 {
        self.params.transaction_cost_bps
    }
}

/// Mean member-gated return per sector and period.
///
/// Columns are sector ids, in numeric order when every id is a finite
/// number and lexical order otherwise. Assets without a
/// sector are left out.
pub fn sector_average_returns(returns: &Panel, sectors: &SectorMap) -> Result<Panel, PanelError> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut unmapped = 0usize;
    for (c, asset) in returns.columns().iter().enumerate() {
        match sectors.sector_of(asset) {
            Sector::Known(id) => groups.entry(id).or_default().push(c),
            Sector::Unknown => unmapped += 1,
        }
    }
    if unmapped > 0 {
        tracing::warn!(unmapped, "assets without a sector excluded from sector returns");
    }

    let mut groups: Vec<(String, Vec<usize>)> = groups.into_iter().collect();
    sort_sector_ids(&mut groups);

    let mut values = Vec::with_capacity(returns.n_rows() * groups.len());
    for r in 0..returns.n_rows() {
        let row = returns.row(r);
        values.extend(groups.iter().map(|(_, cols)| nan_mean(cols.iter().map(|&c| row[c]))));
    }
    Panel::new(
        returns.dates().to_vec(),
        groups.into_iter().map(|(id, _)| id).collect(),
        values,
    )
}

/// Numeric order when every id is a finite number, lexical order otherwise.
///
/// Groups arrive from a `BTreeMap`, so they are already lexical.
fn sort_sector_ids(groups: &mut Vec<(String, Vec<usize>)>) {
    let keys: Option<Vec<f64>> = groups
        .iter()
        .map(|(id, _)| id.trim().parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect();
    let Some(keys) = keys else {
        return;
    };
    let mut keyed: Vec<(f64, (String, Vec<usize>))> =
        keys.into_iter().zip(groups.drain(..)).collect();
    keyed.sort_by(|(x, a), (y, b)| x.total_cmp(y).then_with(|| a.0.cmp(&b.0)));
    groups.extend(keyed.into_iter().map(|(_, group)| group));
}

/// Pick the strongest and weakest sectors per period.
///
/// Returns two 0/1 masks on the momentum panel's axes. Sectors without a
/// score are unavailable. Both sides take `min(k, available / 2)` sectors, so
/// they are always the same size; ties go to the earlier column.
pub fn select_sectors(momentum: &Panel, k: usize) -> (Panel, Panel) {
    let mut top = momentum.full_like(0.0);
    let mut bottom = momentum.full_like(0.0);

    for r in 0..momentum.n_rows() {
        let mut scored: Vec<(usize, f64)> = momentum
            .row(r)
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .map(|(c, &s)| (c, s))
            .collect();
        let n = k.min(scored.len() / 2);
        if n == 0 {
            continue;
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        for &(c, _) in scored.iter().take(n) {
            top.set(r, c, 1.0);
        }
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        for &(c, _) in scored.iter().take(n) {
            bottom.set(r, c, 1.0);
        }
    }
    (top, bottom)
}

/// `sign / count` on every selected cell; all-zero rows stay zero.
pub fn equal_weights(selection: &Panel, sign: f64) -> Panel {
    let counts = selection.row_sums();
    selection.map_indexed(|r, _, selected| {
        if selected > 0.0 && counts[r] > 0.0 {
            sign / counts[r]
        } else {
            0.0
        }
    })
}

/// Spread sector weights over each sector's assets.
///
/// Each asset receives its sector's weight divided by the number of `assets`
/// in that sector, which values identically against sector-average returns.
pub fn expand_to_assets(
    sector_positions: &Panel,
    assets: &[String],
    sectors: &SectorMap,
) -> Result<Panel, PanelError> {
    let asset_sectors: Vec<Option<usize>> = assets
        .iter()
        .map(|a| match sectors.sector_of(a) {
            Sector::Known(id) => sector_positions.column_index(&id),
            Sector::Unknown => None,
        })
        .collect();
    let mut counts = vec![0usize; sector_positions.n_cols()];
    for s in asset_sectors.iter().flatten() {
        counts[*s] += 1;
    }

    let mut values = Vec::with_capacity(sector_positions.n_rows() * assets.len());
    for r in 0..sector_positions.n_rows() {
        let row = sector_positions.row(r);
        values.extend(
            asset_sectors
                .iter()
                .map(|s| s.map_or(0.0, |s| row[s] / counts[s] as f64)),
        );
    }
    Panel::new(sector_positions.dates().to_vec(), assets.to_vec(), values)
}
