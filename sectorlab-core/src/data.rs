//! Panel data provider contract and the aligned in-memory panel set.
//!
//! The provider owns I/O. By the time panels reach a generator they share one
//! date index and one sorted asset axis, and every asset resolves to a sector
//! (possibly `Sector::Unknown`).

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::panel::{Panel, PanelError};

/// Sector of an asset. Unmapped assets resolve to `Unknown` and are kept in
/// the universe but excluded from sector aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    Known(String),
    Unknown,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(id) => f.write_str(id),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Asset identifier → sector identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorMap {
    sectors: HashMap<String, String>,
}

impl SectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: impl Into<String>, sector: impl Into<String>) {
        self.sectors.insert(asset.into(), sector.into());
    }

    pub fn sector_of(&self, asset: &str) -> Sector {
        self.sectors
            .get(asset)
            .map_or(Sector::Unknown, |s| Sector::Known(s.clone()))
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

impl<A: Into<String>, S: Into<String>> FromIterator<(A, S)> for SectorMap {
    fn from_iter<I: IntoIterator<Item = (A, S)>>(iter: I) -> Self {
        Self {
            sectors: iter
                .into_iter()
                .map(|(a, s)| (a.into(), s.into()))
                .collect(),
        }
    }
}

/// What generators consume from the data layer.
pub trait PanelDataProvider: Send + Sync {
    /// Daily, forward-filled price panel.
    fn price_panel(&self) -> &Panel;

    /// Membership indicators on the same axes as the price panel.
    fn presence_panel(&self) -> &Panel;

    fn asset_to_sector_map(&self) -> &SectorMap;
}

/// Price and presence panels aligned on both axes, plus the sector map.
#[derive(Debug, Clone)]
pub struct PanelData {
    prices: Panel,
    presence: Panel,
    sectors: SectorMap,
}

impl PanelData {
    /// Align the two panels.
    ///
    /// The date indexes must already be identical (the provider forward-fills
    /// both onto one daily calendar). Assets are intersected and sorted;
    /// assets present in only one panel are dropped.
    pub fn new(prices: Panel, presence: Panel, sectors: SectorMap) -> Result<Self, PanelError> {
        if prices.dates() != presence.dates() {
            return Err(PanelError::IndexMismatch);
        }

        let presence_cols: BTreeSet<&String> = presence.columns().iter().collect();
        let common: Vec<String> = prices
            .columns()
            .iter()
            .filter(|c| presence_cols.contains(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        if common.is_empty() {
            return Err(PanelError::NoCommonAssets);
        }

        let dropped = prices.n_cols() + presence.n_cols() - 2 * common.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = common.len(), "assets outside the common universe dropped");
        }

        let unmapped = common
            .iter()
            .filter(|a| sectors.sector_of(a) == Sector::Unknown)
            .count();
        if unmapped > 0 {
            tracing::warn!(unmapped, "assets without a sector mapping; excluded from sector aggregation");
        }

        Ok(Self {
            prices: prices.select_columns(&common),
            presence: presence.select_columns(&common),
            sectors,
        })
    }

    pub fn prices(&self) -> &Panel {
        &self.prices
    }

    pub fn presence(&self) -> &Panel {
        &self.presence
    }

    pub fn sectors(&self) -> &SectorMap {
        &self.sectors
    }
}

impl PanelDataProvider for PanelData {
    fn price_panel(&self) -> &Panel {
        &self.prices
    }

    fn presence_panel(&self) -> &Panel {
        &self.presence
    }

    fn asset_to_sector_map(&self) -> &SectorMap {
        &self.sectors
    }
}
