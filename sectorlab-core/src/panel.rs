//! Time × asset panels and scalar time series.
//!
//! A `Panel` is a dense row-major matrix of `f64` with a strictly increasing
//! date index and unique column keys. Missing observations are NaN, and the
//! reductions here follow the usual dataframe conventions: sums skip NaN
//! (an all-NaN row sums to 0), means skip NaN (an all-NaN row is NaN).

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frequency::{week_ending, Frequency};

/// Structural errors in panel construction or alignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("panel shape mismatch: {rows} rows x {cols} columns but {len} values")]
    ShapeMismatch { rows: usize, cols: usize, len: usize },

    #[error("series length mismatch: {dates} dates but {values} values")]
    LengthMismatch { dates: usize, values: usize },

    #[error("date index is not strictly increasing at position {position} ({date})")]
    NonMonotonicIndex { position: usize, date: NaiveDate },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("date indexes of the two operands differ")]
    IndexMismatch,

    #[error("column sets of the two operands differ")]
    ColumnMismatch,

    #[error("price and presence panels share no assets")]
    NoCommonAssets,
}

/// Dense time × column matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<f64>,
}

impl Panel {
    /// Build a panel from row-major values, validating shape and index.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<f64>,
    ) -> Result<Self, PanelError> {
        if dates.len() * columns.len() != values.len() {
            return Err(PanelError::ShapeMismatch {
                rows: dates.len(),
                cols: columns.len(),
                len: values.len(),
            });
        }
        check_monotonic(&dates)?;
        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.as_str()) {
                return Err(PanelError::DuplicateColumn(col.clone()));
            }
        }
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    /// Build a panel from one `Vec` per row.
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, PanelError> {
        let cols = columns.len();
        if rows.len() != dates.len() || rows.iter().any(|r| r.len() != cols) {
            return Err(PanelError::ShapeMismatch {
                rows: dates.len(),
                cols,
                len: rows.iter().map(Vec::len).sum(),
            });
        }
        Self::new(dates, columns, rows.into_iter().flatten().collect())
    }

    /// A panel on the same axes as `self` with every cell set to `value`.
    pub fn full_like(&self, value: f64) -> Self {
        Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: vec![value; self.values.len()],
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.columns.len() + col]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        let n_cols = self.columns.len();
        self.values[row * n_cols + col] = value;
    }

    /// Value at (`date`, `column`), if both exist.
    pub fn value_at(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        let col = self.column_index(column)?;
        Some(self.get(row, col))
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let n_cols = self.columns.len();
        &self.values[row * n_cols..(row + 1) * n_cols]
    }

    pub fn column_values(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|r| self.get(r, col)).collect()
    }

    /// Apply `f` to every cell.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Apply `f(row, col, value)` to every cell.
    pub fn map_indexed(&self, f: impl Fn(usize, usize, f64) -> f64) -> Self {
        let n_cols = self.n_cols().max(1);
        Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .enumerate()
                .map(|(i, &v)| f(i / n_cols, i % n_cols, v))
                .collect(),
        }
    }

    /// Combine two panels on identical axes cell by cell.
    pub fn zip_with(&self, other: &Panel, f: impl Fn(f64, f64) -> f64) -> Result<Self, PanelError> {
        if self.dates != other.dates {
            return Err(PanelError::IndexMismatch);
        }
        if self.columns != other.columns {
            return Err(PanelError::ColumnMismatch);
        }
        Ok(Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// NaN-skipping sum of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows()).map(|r| nan_sum(self.row(r).iter().copied())).collect()
    }

    /// NaN-skipping sum of each row as a series.
    pub fn row_sum_series(&self) -> TimeSeries {
        TimeSeries {
            dates: self.dates.clone(),
            values: self.row_sums(),
        }
    }

    /// Keep the named columns, in the given order.
    ///
    /// Names absent from the panel are skipped.
    pub fn select_columns(&self, names: &[String]) -> Self {
        let idx: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        self.select_column_indices(&idx)
    }

    fn select_column_indices(&self, idx: &[usize]) -> Self {
        let mut values = Vec::with_capacity(self.n_rows() * idx.len());
        for r in 0..self.n_rows() {
            let row = self.row(r);
            values.extend(idx.iter().map(|&c| row[c]));
        }
        Self {
            dates: self.dates.clone(),
            columns: idx.iter().map(|&c| self.columns[c].clone()).collect(),
            values,
        }
    }

    /// Drop columns with no observation in any row.
    pub fn drop_all_nan_columns(&self) -> Self {
        let keep: Vec<usize> = (0..self.n_cols())
            .filter(|&c| (0..self.n_rows()).any(|r| !self.get(r, c).is_nan()))
            .collect();
        self.select_column_indices(&keep)
    }

    /// Keep rows whose date satisfies `keep`.
    pub fn filter_rows(&self, keep: impl Fn(NaiveDate) -> bool) -> Self {
        let rows: Vec<usize> = (0..self.n_rows()).filter(|&r| keep(self.dates[r])).collect();
        let mut values = Vec::with_capacity(rows.len() * self.n_cols());
        for &r in &rows {
            values.extend_from_slice(self.row(r));
        }
        Self {
            dates: rows.iter().map(|&r| self.dates[r]).collect(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Inclusive date window; no upper bound when `end` is `None`.
    pub fn between(&self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.filter_rows(|d| d >= start && end.map_or(true, |e| d <= e))
    }

    /// Carry the last observation forward into NaN cells, per column.
    pub fn forward_fill(&self) -> Self {
        let mut out = self.clone();
        for c in 0..self.n_cols() {
            let mut last = f64::NAN;
            for r in 0..self.n_rows() {
                let v = out.get(r, c);
                if v.is_nan() {
                    out.set(r, c, last);
                } else {
                    last = v;
                }
            }
        }
        out
    }

    /// Simple period-over-period returns after forward-filling gaps.
    ///
    /// The first row is NaN, as is any cell before a column's first observation.
    pub fn pct_change(&self) -> Self {
        let filled = self.forward_fill();
        let mut out = self.full_like(f64::NAN);
        for r in 1..self.n_rows() {
            for c in 0..self.n_cols() {
                let prev = filled.get(r - 1, c);
                let cur = filled.get(r, c);
                out.set(r, c, cur / prev - 1.0);
            }
        }
        out
    }

    /// Resample rows onto period labels, keeping the last non-NaN value per
    /// column in each period.
    ///
    /// Every label between the first and last period is emitted; periods with
    /// no source rows are all-NaN.
    pub fn resample(&self, frequency: Frequency) -> Self {
        let Some(&first) = self.dates.first() else {
            return self.clone();
        };
        let anchor = week_ending(first);
        let labels: Vec<NaiveDate> = self
            .dates
            .iter()
            .map(|&d| frequency.period_label(d, anchor))
            .collect();

        let n_cols = self.n_cols();
        let mut dates = Vec::new();
        let mut values = Vec::new();
        let mut r = 0;
        while r < self.n_rows() {
            let label = labels[r];
            // Empty bins between the previous period and this one
            if let Some(&prev) = dates.last() {
                let mut next = frequency.next_label(prev);
                while next < label {
                    dates.push(next);
                    values.extend(std::iter::repeat(f64::NAN).take(n_cols));
                    next = frequency.next_label(next);
                }
            }
            let mut last = vec![f64::NAN; n_cols];
            while r < self.n_rows() && labels[r] == label {
                for (slot, &v) in last.iter_mut().zip(self.row(r)) {
                    if !v.is_nan() {
                        *slot = v;
                    }
                }
                r += 1;
            }
            dates.push(label);
            values.extend(last);
        }

        Self {
            dates,
            columns: self.columns.clone(),
            values,
        }
    }

    /// Trailing NaN-skipping mean over `window` rows, requiring one observation.
    pub fn rolling_mean(&self, window: usize) -> Self {
        let window = window.max(1);
        let mut out = self.full_like(f64::NAN);
        for c in 0..self.n_cols() {
            let mut sum = 0.0;
            let mut count = 0usize;
            for r in 0..self.n_rows() {
                let entering = self.get(r, c);
                if !entering.is_nan() {
                    sum += entering;
                    count += 1;
                }
                if r >= window {
                    let leaving = self.get(r - window, c);
                    if !leaving.is_nan() {
                        sum -= leaving;
                        count -= 1;
                    }
                }
                if count == 0 {
                    // no residue from subtraction once the window empties
                    sum = 0.0;
                } else {
                    out.set(r, c, sum / count as f64);
                }
            }
        }
        out
    }
}

/// A time-indexed scalar series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, PanelError> {
        if dates.len() != values.len() {
            return Err(PanelError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        check_monotonic(&dates)?;
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `date`, if present.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    /// Keep entries whose position is flagged in `mask` (same length).
    pub fn filter_by(&self, mask: &[bool]) -> Self {
        let (dates, values) = self
            .dates
            .iter()
            .zip(&self.values)
            .zip(mask)
            .filter(|&(_, &keep)| keep)
            .map(|((&d, &v), _)| (d, v))
            .unzip();
        Self { dates, values }
    }
}

/// Sum of the non-NaN values; 0 when there are none.
pub fn nan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

/// Mean of the non-NaN values; NaN when there are none.
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn check_monotonic(dates: &[NaiveDate]) -> Result<(), PanelError> {
    for (i, w) in dates.windows(2).enumerate() {
        if w[1] <= w[0] {
            return Err(PanelError::NonMonotonicIndex {
                position: i + 1,
                date: w[1],
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn daily(start: &str, n: usize) -> Vec<NaiveDate> {
        (0..n).map(|i| d(start) + Duration::days(i as i64)).collect()
    }

    #[test]
    fn rejects_shape_mismatch() {
        let err = Panel::new(daily("2024-01-01", 2), cols(&["a"]), vec![1.0]).unwrap_err();
        assert!(matches!(err, PanelError::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_non_monotonic_index() {
        let dates = vec![d("2024-01-02"), d("2024-01-01")];
        let err = Panel::new(dates, cols(&["a"]), vec![1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            PanelError::NonMonotonicIndex {
                position: 1,
                date: d("2024-01-01")
            }
        );
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Panel::new(daily("2024-01-01", 1), cols(&["a", "a"]), vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, PanelError::DuplicateColumn("a".into()));
    }

    #[test]
    fn row_sums_skip_nan() {
        let p = Panel::from_rows(
            daily("2024-01-01", 2),
            cols(&["a", "b"]),
            vec![vec![1.0, f64::NAN], vec![f64::NAN, f64::NAN]],
        )
        .unwrap();
        assert_eq!(p.row_sums(), vec![1.0, 0.0]);
    }

    #[test]
    fn pct_change_pads_gaps() {
        let p = Panel::from_rows(
            daily("2024-01-01", 4),
            cols(&["a"]),
            vec![vec![100.0], vec![110.0], vec![f64::NAN], vec![121.0]],
        )
        .unwrap();
        let r = p.pct_change();
        assert!(r.get(0, 0).is_nan());
        assert!((r.get(1, 0) - 0.1).abs() < 1e-12);
        assert_eq!(r.get(2, 0), 0.0);
        assert!((r.get(3, 0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn resample_monthly_keeps_last_observation() {
        // 2024-01-30 .. 2024-02-02
        let p = Panel::from_rows(
            daily("2024-01-30", 4),
            cols(&["a", "b"]),
            vec![
                vec![1.0, 10.0],
                vec![2.0, f64::NAN],
                vec![3.0, 30.0],
                vec![4.0, f64::NAN],
            ],
        )
        .unwrap();
        let m = p.resample(Frequency::Monthly);
        assert_eq!(m.dates(), &[d("2024-01-31"), d("2024-02-29")]);
        assert_eq!(m.row(0), &[2.0, 10.0]);
        assert_eq!(m.row(1), &[4.0, 30.0]);
    }

    #[test]
    fn resample_daily_is_identity_on_a_daily_panel() {
        let p = Panel::new(
            daily("2024-02-27", 5),
            cols(&["a", "b"]),
            vec![1.0, 2.0, 1.5, 2.5, 1.25, 3.0, 1.75, 2.0, 2.0, 2.25],
        )
        .unwrap();
        assert_eq!(p.resample(Frequency::Daily), p);
    }

    #[test]
    fn resample_emits_empty_bins() {
        let dates = vec![d("2024-01-15"), d("2024-03-15")];
        let p = Panel::new(dates, cols(&["a"]), vec![1.0, 3.0]).unwrap();
        let m = p.resample(Frequency::Monthly);
        assert_eq!(m.dates(), &[d("2024-01-31"), d("2024-02-29"), d("2024-03-31")]);
        assert!(m.get(1, 0).is_nan());
    }

    #[test]
    fn resample_weekly_labels_sundays() {
        // 2024-01-01 is a Monday; 14 days span two weeks
        let p = Panel::new(
            daily("2024-01-01", 14),
            cols(&["a"]),
            (0..14).map(|i| i as f64).collect(),
        )
        .unwrap();
        let w = p.resample(Frequency::Weekly);
        assert_eq!(w.dates(), &[d("2024-01-07"), d("2024-01-14")]);
        assert_eq!(w.column_values(0), vec![6.0, 13.0]);
    }

    #[test]
    fn between_is_inclusive() {
        let p = Panel::new(daily("2024-01-01", 5), cols(&["a"]), vec![1.0; 5]).unwrap();
        let w = p.between(d("2024-01-02"), Some(d("2024-01-04")));
        assert_eq!(w.dates(), &[d("2024-01-02"), d("2024-01-03"), d("2024-01-04")]);
        assert_eq!(p.between(d("2024-01-04"), None).n_rows(), 2);
    }

    #[test]
    fn rolling_mean_min_one_observation() {
        let p = Panel::new(
            daily("2024-01-01", 4),
            cols(&["a"]),
            vec![f64::NAN, 1.0, 3.0, 5.0],
        )
        .unwrap();
        let m = p.rolling_mean(2);
        assert!(m.get(0, 0).is_nan());
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(2, 0), 2.0);
        assert_eq!(m.get(3, 0), 4.0);
    }

    #[test]
    fn rolling_mean_matches_full_window_recompute() {
        let a = [1.0, f64::NAN, 2.5, -4.0, f64::NAN, f64::NAN, f64::NAN, 8.0, 0.5, 3.0];
        let b = [f64::NAN, f64::NAN, 0.25, 0.75, 1.5, -2.0, 6.0, f64::NAN, 1.0, 2.0];
        let rows: Vec<Vec<f64>> = a.iter().zip(&b).map(|(&x, &y)| vec![x, y]).collect();
        let p = Panel::from_rows(daily("2024-01-01", rows.len()), cols(&["a", "b"]), rows).unwrap();

        for window in [1, 3, 4, 25] {
            let m = p.rolling_mean(window);
            for c in 0..2 {
                for r in 0..p.n_rows() {
                    let start = (r + 1).saturating_sub(window);
                    let expected = nan_mean((start..=r).map(|i| p.get(i, c)));
                    let got = m.get(r, c);
                    if expected.is_nan() {
                        assert!(got.is_nan(), "window {window} row {r} col {c}: {got}");
                    } else {
                        assert!(
                            (got - expected).abs() < 1e-12,
                            "window {window} row {r} col {c}: {got} vs {expected}"
                        );
                    }
                }
            }
        }
        // Three NaNs in a row empty a window of 3
        assert!(p.rolling_mean(3).get(6, 0).is_nan());
    }

    #[test]
    fn drop_all_nan_columns_keeps_partial() {
        let p = Panel::from_rows(
            daily("2024-01-01", 2),
            cols(&["a", "b", "c"]),
            vec![vec![f64::NAN, 1.0, f64::NAN], vec![f64::NAN, f64::NAN, 2.0]],
        )
        .unwrap();
        assert_eq!(p.drop_all_nan_columns().columns(), &cols(&["b", "c"])[..]);
    }

    #[test]
    fn zip_with_requires_same_axes() {
        let a = Panel::new(daily("2024-01-01", 1), cols(&["a"]), vec![1.0]).unwrap();
        let b = Panel::new(daily("2024-01-02", 1), cols(&["a"]), vec![1.0]).unwrap();
        assert_eq!(a.zip_with(&b, |x, y| x * y).unwrap_err(), PanelError::IndexMismatch);
    }

    #[test]
    fn series_filter_by_mask() {
        let s = TimeSeries::new(daily("2024-01-01", 3), vec![1.0, 2.0, 3.0]).unwrap();
        let f = s.filter_by(&[true, false, true]);
        assert_eq!(f.values, vec![1.0, 3.0]);
        assert_eq!(f.dates, vec![d("2024-01-01"), d("2024-01-03")]);
    }

    #[test]
    fn nan_mean_empty_is_nan() {
        assert!(nan_mean([f64::NAN]).is_nan());
        assert_eq!(nan_mean([1.0, f64::NAN, 3.0]), 2.0);
    }
}
