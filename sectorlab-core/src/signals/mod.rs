//! Signal generator implementations.
//!
//! - `SectorMomentum`: long the strongest sectors, short the weakest
//! - `Benchmark`: equal-weighted, long-only over current members

pub mod benchmark;
pub mod sector_momentum;

pub use benchmark::{Benchmark, BenchmarkReturns};
pub use sector_momentum::{
    equal_weights, expand_to_assets, momentum_window, sector_average_returns, select_sectors,
    SectorMomentum,
};
