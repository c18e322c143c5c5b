//! Reporting and export: Markdown tables, CSV, Parquet, and JSON artifacts.
//!
//! Statistics are kept as fractions everywhere else; this module is the only
//! place they are scaled to percent and rounded for display.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, DataType, ParquetWriter};
use serde::{Deserialize, Serialize};

use sectorlab_core::TimeSeries;

use crate::backtest::ResultsCollection;
use crate::statistics::StrategyStatistics;

/// One labelled row of the statistics table, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub label: String,
    #[serde(flatten)]
    pub statistics: StrategyStatistics,
}

// ─── Markdown ───────────────────────────────────────────────────────

/// Markdown statistics table, one row per series, values to `sig_figs`
/// significant figures.
pub fn statistics_table(rows: &[(String, StrategyStatistics)], sig_figs: usize) -> String {
    let mut md = String::with_capacity(256 + rows.len() * 128);
    md.push_str(
        "| Strategy | Annualized Return (%) | Annualized Volatility (%) | Sharpe Ratio \
         | Skewness | Max Drawdown (%) | Average Turnover (%) |\n",
    );
    md.push_str("|---|---:|---:|---:|---:|---:|---:|\n");
    for (label, s) in rows {
        let cells = [
            s.annualized_return * 100.0,
            s.annualized_volatility * 100.0,
            s.sharpe_ratio,
            s.skewness,
            s.max_drawdown * 100.0,
            s.average_turnover * 100.0,
        ]
        .map(|v| format_sig_figs(v, sig_figs));
        md.push_str(&format!("| {label} | {} |\n", cells.join(" | ")));
    }
    md
}

/// `%g`-style formatting to `sig_figs` significant figures.
///
/// Zero and non-finite values render as `0`.
pub fn format_sig_figs(value: f64, sig_figs: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }
    let precision = sig_figs.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

// ─── Series transforms ──────────────────────────────────────────────

/// Compounded growth of 1, normalized so the first period reads exactly 1.
pub fn cumulative_returns(returns: &TimeSeries) -> TimeSeries {
    let mut growth = 1.0;
    let mut values: Vec<f64> = returns
        .values
        .iter()
        .map(|r| {
            growth *= 1.0 + r;
            growth
        })
        .collect();
    if let Some(&first) = values.first() {
        for v in &mut values {
            *v /= first;
        }
    }
    TimeSeries {
        dates: returns.dates.clone(),
        values,
    }
}

// ─── CSV / JSON ─────────────────────────────────────────────────────

/// Long-format CSV of every series: `series,date,return,turnover,cumulative`.
pub fn export_returns_csv(results: &ResultsCollection) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["series", "date", "return", "turnover", "cumulative"])?;
    for entry in results {
        let label = entry.label();
        let cumulative = cumulative_returns(&entry.returns);
        for (i, date) in entry.returns.dates.iter().enumerate() {
            let turnover = entry.turnover.value_at(*date).unwrap_or(f64::NAN);
            wtr.write_record([
                label.as_str(),
                &date.to_string(),
                &format!("{:.10}", entry.returns.values[i]),
                &format!("{turnover:.10}"),
                &format!("{:.10}", cumulative.values[i]),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Statistics as pretty JSON; non-finite values serialize as `null`.
pub fn export_json(rows: &[(String, StrategyStatistics)]) -> Result<String> {
    let records: Vec<StatisticsRecord> = rows
        .iter()
        .map(|(label, statistics)| StatisticsRecord {
            label: label.clone(),
            statistics: *statistics,
        })
        .collect();
    serde_json::to_string_pretty(&records).context("failed to serialize statistics to JSON")
}

// ─── Parquet ────────────────────────────────────────────────────────

/// Write every series to one long-format Parquet file.
pub fn write_returns_parquet(path: &Path, results: &ResultsCollection) -> Result<()> {
    let mut series = Vec::new();
    let mut dates = Vec::new();
    let mut returns = Vec::new();
    let mut turnover = Vec::new();
    let mut cumulative = Vec::new();
    for entry in results {
        let label = entry.label();
        let cum = cumulative_returns(&entry.returns);
        for (i, date) in entry.returns.dates.iter().enumerate() {
            series.push(label.clone());
            // Days since 1970-01-01, the Date physical type
            dates.push((*date - NaiveDate::default()).num_days() as i32);
            returns.push(entry.returns.values[i]);
            turnover.push(entry.turnover.value_at(*date).unwrap_or(f64::NAN));
            cumulative.push(cum.values[i]);
        }
    }

    let mut df = DataFrame::new(vec![
        Column::new("series".into(), series),
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .context("failed to cast dates")?,
        Column::new("return".into(), returns),
        Column::new("turnover".into(), turnover),
        Column::new("cumulative".into(), cumulative),
    ])
    .context("failed to build returns dataframe")?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create returns parquet {}", path.display()))?;
    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .context("failed to write returns parquet")?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a run.
///
/// Creates `run_<timestamp>/` under `output_dir` containing:
/// - `statistics.md` and `statistics.json`
/// - `returns.csv` and `returns.parquet`
///
/// Returns the path to the created directory.
pub fn save_artifacts(
    results: &ResultsCollection,
    statistics: &[(String, StrategyStatistics)],
    sig_figs: usize,
    output_dir: &Path,
) -> Result<PathBuf> {
    let run_dir = output_dir.join(format!(
        "run_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("statistics.md"), statistics_table(statistics, sig_figs))?;
    std::fs::write(run_dir.join("statistics.json"), export_json(statistics)?)?;
    std::fs::write(run_dir.join("returns.csv"), export_returns_csv(results)?)?;
    write_returns_parquet(&run_dir.join("returns.parquet"), results)?;

    tracing::info!(dir = %run_dir.display(), series = results.len(), "artifacts saved");
    Ok(run_dir)
}
