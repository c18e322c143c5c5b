//! Panel loading for the runner.
//!
//! A data directory holds three CSV files:
//! - `prices.csv`: first column a `YYYY-MM-DD` date, one column per asset id
//! - `presence.csv`: same layout, 0/1 membership indicators
//! - `sector_map.csv`: `permno,hsiccd` rows mapping asset id to sector id
//!
//! The S&P extract names (`spx_prices.csv`, `spx_presence.csv`,
//! `permno_industry_map.csv`) are accepted when the short names are absent.
//!
//! Both panels are forward-filled onto a continuous daily calendar spanning
//! the price range, then aligned on their common, sorted asset set. Empty
//! cells read as missing.
//!
//! `generate_synthetic_panels` is a developer-only stand-in for real data;
//! results built on it are tagged as synthetic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use sectorlab_core::{Panel, PanelData, PanelError, Sector, SectorMap};

pub const PRICES_FILE: &str = "prices.csv";
pub const PRESENCE_FILE: &str = "presence.csv";
pub const SECTOR_MAP_FILE: &str = "sector_map.csv";

pub const SPX_PRICES_FILE: &str = "spx_prices.csv";
pub const SPX_PRESENCE_FILE: &str = "spx_presence.csv";
pub const SPX_SECTOR_MAP_FILE: &str = "permno_industry_map.csv";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data directory '{0}' not found (use --synthetic for synthetic data)")]
    MissingDir(PathBuf),

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path} line {line}: invalid date '{value}'")]
    InvalidDate {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path} line {line}: invalid number '{value}'")]
    InvalidValue {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{0}: no data rows")]
    Empty(PathBuf),

    #[error("panel error: {0}")]
    Panel(#[from] PanelError),
}

/// Aligned panels plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedPanels {
    pub data: PanelData,
    /// BLAKE3 over dates, assets, values, and sector ids.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

/// Load and align the three CSV files under `dir`.
pub fn load_panels(dir: &Path) -> Result<LoadedPanels, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDir(dir.to_path_buf()));
    }
    let prices_path = locate(dir, &[PRICES_FILE, SPX_PRICES_FILE]);
    let prices = read_panel_csv(&prices_path)?;
    let presence = read_panel_csv(&locate(dir, &[PRESENCE_FILE, SPX_PRESENCE_FILE]))?;
    let sectors = read_sector_map_csv(&locate(dir, &[SECTOR_MAP_FILE, SPX_SECTOR_MAP_FILE]))?;

    let (Some(&start), Some(&end)) = (prices.dates().first(), prices.dates().last()) else {
        return Err(LoadError::Empty(prices_path));
    };
    let data = PanelData::new(
        reindex_daily(&prices, start, end)?,
        reindex_daily(&presence, start, end)?,
        sectors,
    )?;

    let dataset_hash = compute_dataset_hash(&data);
    tracing::info!(
        dir = %dir.display(),
        days = data.prices().n_rows(),
        assets = data.prices().n_cols(),
        %start,
        %end,
        hash = &dataset_hash[..12],
        "panels loaded"
    );
    Ok(LoadedPanels {
        data,
        dataset_hash,
        has_synthetic: false,
    })
}

/// First candidate present under `dir`; the first name when none is, so
/// the read error names the preferred file.
fn locate(dir: &Path, names: &[&str]) -> PathBuf {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| dir.join(names[0]))
}

/// Read a date-indexed wide CSV into a panel, rows sorted by date.
pub fn read_panel_csv(path: &Path) -> Result<Panel, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let columns: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut rows: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let raw_date = record.get(0).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            LoadError::InvalidDate {
                path: path.to_path_buf(),
                line,
                value: raw_date.to_string(),
            }
        })?;

        let mut values = Vec::with_capacity(columns.len());
        for c in 0..columns.len() {
            let field = record.get(c + 1).unwrap_or("").trim();
            let value = if field.is_empty() {
                f64::NAN
            } else {
                field.parse::<f64>().map_err(|_| LoadError::InvalidValue {
                    path: path.to_path_buf(),
                    line,
                    value: field.to_string(),
                })?
            };
            values.push(value);
        }
        // A repeated date keeps the later row
        rows.insert(date, values);
    }

    if rows.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    let dates: Vec<NaiveDate> = rows.keys().copied().collect();
    Ok(Panel::new(dates, columns, rows.into_values().flatten().collect())?)
}

/// Read `permno,hsiccd` rows. Rows with an empty sector are skipped.
pub fn read_sector_map_csv(path: &Path) -> Result<SectorMap, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let asset_col = find("permno")?;
    let sector_col = find("hsiccd")?;

    let mut sectors = SectorMap::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let asset = record.get(asset_col).unwrap_or("").trim();
        let sector = normalize_sector_id(record.get(sector_col).unwrap_or(""));
        if !asset.is_empty() && !sector.is_empty() {
            sectors.insert(asset, sector);
        }
    }
    Ok(sectors)
}

/// `"2834.0"` and `"2834"` name the same sector.
fn normalize_sector_id(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.bytes().all(|b| b.is_ascii_digit()) => int.to_string(),
        _ => raw.to_string(),
    }
}

/// Forward-fill a panel onto every calendar day in `[start, end]`.
///
/// Each day takes the latest source row on or before it; days before the
/// first source row are all-NaN.
pub fn reindex_daily(panel: &Panel, start: NaiveDate, end: NaiveDate) -> Result<Panel, PanelError> {
    let n_cols = panel.n_cols();
    let mut dates = Vec::new();
    let mut values = Vec::new();
    let mut src = 0usize;
    let mut current = start;
    while current <= end {
        while src < panel.n_rows() && panel.dates()[src] <= current {
            src += 1;
        }
        if src == 0 {
            values.extend(std::iter::repeat(f64::NAN).take(n_cols));
        } else {
            values.extend_from_slice(panel.row(src - 1));
        }
        dates.push(current);
        current += Duration::days(1);
    }
    Panel::new(dates, panel.columns().to_vec(), values)
}

/// Deterministic BLAKE3 hash over both panels and the sector ids.
pub fn compute_dataset_hash(data: &PanelData) -> String {
    let mut hasher = blake3::Hasher::new();
    for panel in [data.prices(), data.presence()] {
        for date in panel.dates() {
            hasher.update(date.to_string().as_bytes());
        }
        for column in panel.columns() {
            hasher.update(column.as_bytes());
            if let Sector::Known(id) = data.sectors().sector_of(column) {
                hasher.update(id.as_bytes());
            }
        }
        for value in panel.values() {
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate a seeded random-walk universe.
///
/// `assets` assets are spread round-robin over `sectors` sectors (ids
/// `1000`, `1100`, ...). Each sector gets its own drift. Membership is
/// staggered: every asset joins somewhere in the first quarter of the calendar
/// and roughly one in five leaves in the last quarter.
pub fn generate_synthetic_panels(
    assets: usize,
    sectors: usize,
    start: NaiveDate,
    end: NaiveDate,
    seed: u64,
) -> Result<LoadedPanels, LoadError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sectors = sectors.max(1);
    let n_days = usize::try_from((end - start).num_days() + 1).unwrap_or(0);
    let dates: Vec<NaiveDate> = (0..n_days)
        .map(|i| start + Duration::days(i as i64))
        .collect();

    let columns: Vec<String> = (0..assets).map(|a| (10_001 + a).to_string()).collect();
    let drifts: Vec<f64> = (0..sectors).map(|_| rng.gen_range(-0.0004..0.0006)).collect();
    let mut map = SectorMap::new();
    for (a, asset) in columns.iter().enumerate() {
        map.insert(asset.clone(), (1000 + 100 * (a % sectors)).to_string());
    }

    let mut prices = vec![f64::NAN; n_days * assets];
    let mut presence = vec![0.0; n_days * assets];
    for a in 0..assets {
        let drift = drifts[a % sectors];
        let join = rng.gen_range(0..(n_days / 4).max(1));
        let leave = if rng.gen_bool(0.2) {
            n_days - rng.gen_range(0..(n_days / 4).max(1))
        } else {
            n_days
        };
        let mut price = rng.gen_range(20.0..200.0);
        for t in 0..n_days {
            price *= 1.0 + drift + rng.gen_range(-0.02..0.02);
            prices[t * assets + a] = price;
            if t >= join && t < leave {
                presence[t * assets + a] = 1.0;
            }
        }
    }

    let data = PanelData::new(
        Panel::new(dates.clone(), columns.clone(), prices)?,
        Panel::new(dates, columns, presence)?,
        map,
    )?;
    let dataset_hash = compute_dataset_hash(&data);
    tracing::warn!(assets, sectors, seed, "using synthetic panels; results are tagged as synthetic");
    Ok(LoadedPanels {
        data,
        dataset_hash,
        has_synthetic: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn write_fixture(dir: &Path) {
        write_fixture_as(dir, [PRICES_FILE, PRESENCE_FILE, SECTOR_MAP_FILE]);
    }

    fn write_fixture_as(dir: &Path, [prices, presence, sectors]: [&str; 3]) {
        std::fs::write(
            dir.join(prices),
            "date,10002,10001,10003\n\
             2024-01-01,10,20,30\n\
             2024-01-03,11,,31\n\
             2024-01-04,12,22,32\n",
        )
        .unwrap();
        std::fs::write(
            dir.join(presence),
            "date,10001,10002\n\
             2024-01-02,1,0\n\
             2024-01-04,1,1\n",
        )
        .unwrap();
        std::fs::write(
            dir.join(sectors),
            "permno,hsiccd\n10001,2834.0\n10002,3571\n10003,\n",
        )
        .unwrap();
    }

    #[test]
    fn loads_and_aligns_fixture() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let loaded = load_panels(dir.path()).unwrap();
        let prices = loaded.data.prices();
        let presence = loaded.data.presence();

        // Intersection, sorted; 10003 has no presence column
        assert_eq!(prices.columns(), &["10001".to_string(), "10002".to_string()][..]);
        // Continuous calendar over the price range
        assert_eq!(prices.n_rows(), 4);
        assert_eq!(prices.dates()[1], d("2024-01-02"));
        // Jan 2 carries Jan 1 forward; Jan 3 keeps its own missing cell
        assert_eq!(prices.row(1), &[20.0, 10.0]);
        assert!(prices.get(2, 0).is_nan());
        // Presence starts on Jan 2
        assert!(presence.get(0, 0).is_nan());
        assert_eq!(presence.row(2), &[1.0, 0.0]);
        assert_eq!(presence.row(3), &[1.0, 1.0]);
        assert!(!loaded.has_synthetic);
    }

    #[test]
    fn spx_file_names_load_like_the_short_ones() {
        let short = tempfile::tempdir().unwrap();
        let spx = tempfile::tempdir().unwrap();
        write_fixture(short.path());
        write_fixture_as(
            spx.path(),
            [SPX_PRICES_FILE, SPX_PRESENCE_FILE, SPX_SECTOR_MAP_FILE],
        );
        let a = load_panels(short.path()).unwrap();
        let b = load_panels(spx.path()).unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.data.prices().columns(), b.data.prices().columns());
        assert_eq!(a.data.sectors(), b.data.sectors());
    }

    #[test]
    fn missing_prices_names_the_short_file() {
        let dir = tempfile::tempdir().unwrap();
        match load_panels(dir.path()) {
            Err(LoadError::Csv { path, .. }) => assert_eq!(path, dir.path().join(PRICES_FILE)),
            other => panic!("expected Csv error, got {other:?}"),
        }
    }

    #[test]
    fn sector_ids_normalized() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let map = read_sector_map_csv(&dir.path().join(SECTOR_MAP_FILE)).unwrap();
        assert_eq!(map.sector_of("10001"), Sector::Known("2834".into()));
        assert_eq!(map.sector_of("10003"), Sector::Unknown);
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let a = load_panels(dir.path()).unwrap();
        let b = load_panels(dir.path()).unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.dataset_hash.len(), 64);
    }

    #[test]
    fn missing_dir_fails() {
        let err = load_panels(Path::new("/nonexistent/sectorlab-data")).unwrap_err();
        assert!(matches!(err, LoadError::MissingDir(_)));
    }

    #[test]
    fn bad_number_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRICES_FILE);
        std::fs::write(&path, "date,1\n2024-01-01,1.0\n2024-01-02,abc\n").unwrap();
        let err = read_panel_csv(&path).unwrap_err();
        assert!(matches!(err, LoadError::InvalidValue { line: 3, .. }));
    }

    #[test]
    fn bad_date_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRICES_FILE);
        std::fs::write(&path, "date,1\n01/02/2024,1.0\n").unwrap();
        assert!(matches!(read_panel_csv(&path), Err(LoadError::InvalidDate { .. })));
    }

    #[test]
    fn synthetic_panels_are_seeded() {
        let a = generate_synthetic_panels(12, 4, d("2020-01-01"), d("2020-12-31"), 7).unwrap();
        let b = generate_synthetic_panels(12, 4, d("2020-01-01"), d("2020-12-31"), 7).unwrap();
        let c = generate_synthetic_panels(12, 4, d("2020-01-01"), d("2020-12-31"), 8).unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_ne!(a.dataset_hash, c.dataset_hash);
        assert!(a.has_synthetic);
        assert_eq!(a.data.prices().n_rows(), 366);
        assert_eq!(a.data.prices().n_cols(), 12);
    }

    #[test]
    fn synthetic_membership_is_staggered() {
        let loaded = generate_synthetic_panels(20, 4, d("2020-01-01"), d("2021-12-31"), 1).unwrap();
        let presence = loaded.data.presence();
        let last = presence.n_rows() - 1;
        let first_members = presence.row_sums()[0];
        let mid_members = presence.row_sums()[last / 2];
        assert!(first_members <= mid_members);
        assert_eq!(mid_members, 20.0);
    }
}
