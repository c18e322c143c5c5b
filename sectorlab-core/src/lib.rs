//! SectorLab Core: panel data, signal generators, turnover and cost accounting.
//!
//! This crate contains the signal-to-return pipeline:
//! - Time × asset panels with NaN-aware reductions and calendar resampling
//! - The one-period look-ahead lag applied by every generator
//! - Sector-momentum long/short and equal-weight benchmark generators
//! - Turnover, weighted returns, and transaction-cost adjustment
//!
//! Orchestration, statistics, and I/O live in `sectorlab-runner`.

pub mod data;
pub mod error;
pub mod frequency;
pub mod lag;
pub mod panel;
pub mod signals;
pub mod strategy;
pub mod turnover;

pub use data::{PanelData, PanelDataProvider, Sector, SectorMap};
pub use error::{ConfigError, SignalError};
pub use frequency::{Frequency, Leg, LegMode};
pub use lag::lag_one_period;
pub use panel::{nan_mean, nan_sum, Panel, PanelError, TimeSeries};
pub use signals::{Benchmark, BenchmarkReturns, SectorMomentum};
pub use strategy::{LegSignal, Signals, Strategy, StrategyParams};
pub use turnover::{cost_adjusted_returns, evaluate_leg, turnover, weighted_returns, LegSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the runner shares across rayon workers
    /// is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Panel>();
        require_sync::<Panel>();
        require_send::<TimeSeries>();
        require_sync::<TimeSeries>();
        require_send::<PanelData>();
        require_sync::<PanelData>();
        require_send::<Signals>();
        require_sync::<Signals>();
        require_send::<SectorMomentum>();
        require_sync::<SectorMomentum>();
        require_send::<Benchmark>();
        require_sync::<Benchmark>();
        require_send::<StrategyParams>();
        require_sync::<StrategyParams>();
    }

    /// Architecture contract: strategies read panels through the provider
    /// trait and return their signals by value, so a boxed strategy can be
    /// evaluated from any thread without shared mutable state.
    #[test]
    fn strategy_trait_is_object_safe() {
        fn _check_trait_object_builds(
            strategy: &dyn Strategy,
            data: &dyn PanelDataProvider,
        ) -> Result<Signals, SignalError> {
            strategy.generate_signals(data)
        }
    }
}
