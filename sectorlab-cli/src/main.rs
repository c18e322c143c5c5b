//! SectorLab CLI: run sector-momentum backtests and report statistics.
//!
//! Commands:
//! - `run`: evaluate every configured strategy, print the statistics table,
//!   and save the artifact set
//! - `stats`: same evaluation, statistics only (Markdown or JSON on stdout)

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use sectorlab_core::{SectorMomentum, StrategyParams};
use sectorlab_runner::{
    compute_all, export_json, generate_synthetic_panels, load_panels, save_artifacts,
    statistics_table, Backtest, BacktestConfig, LoadedPanels, ResultsCollection, StrategyConfig,
    StrategyKind, StrategyStatistics,
};

#[derive(Parser)]
#[command(
    name = "sectorlab",
    about = "SectorLab CLI: sector-momentum long/short backtests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest, print statistics, and save artifacts.
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Significant figures in the printed table.
        #[arg(long, default_value_t = 4)]
        sig_figs: usize,
    },
    /// Run a backtest and print statistics only.
    Stats {
        #[command(flatten)]
        input: InputArgs,

        /// Print JSON instead of a Markdown table.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Significant figures in the Markdown table.
        #[arg(long, default_value_t = 4)]
        sig_figs: usize,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to a TOML config file. Without one, the default strategy runs alone.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Panel directory; overrides `[data] dir` from the config.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Use a seeded synthetic universe instead of CSV panels.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Synthetic calendar start (YYYY-MM-DD).
    #[arg(long, default_value = "2000-01-01")]
    synthetic_start: String,

    /// Synthetic calendar end (YYYY-MM-DD).
    #[arg(long, default_value = "2019-12-31")]
    synthetic_end: String,

    /// Synthetic universe size.
    #[arg(long, default_value_t = 200)]
    synthetic_assets: usize,

    /// Synthetic sector count.
    #[arg(long, default_value_t = 20)]
    synthetic_sectors: usize,

    /// Synthetic RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Evaluate strategies in parallel.
    #[arg(long, default_value_t = false)]
    parallel: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sectorlab=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output_dir,
            sig_figs,
        } => run_cmd(&input, &output_dir, sig_figs),
        Commands::Stats {
            input,
            json,
            sig_figs,
        } => stats_cmd(&input, json, sig_figs),
    }
}

fn run_cmd(input: &InputArgs, output_dir: &Path, sig_figs: usize) -> Result<()> {
    let (loaded, results) = evaluate(input)?;
    let stats = compute_all(&results);

    print_summary(&loaded, &stats, sig_figs);

    let run_dir = save_artifacts(&results, &stats, sig_figs, output_dir)?;
    tracing::info!(dir = %run_dir.display(), series = results.len(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn stats_cmd(input: &InputArgs, json: bool, sig_figs: usize) -> Result<()> {
    let (loaded, results) = evaluate(input)?;
    let stats = compute_all(&results);

    if json {
        println!("{}", export_json(&stats)?);
    } else {
        print_summary(&loaded, &stats, sig_figs);
    }
    Ok(())
}

/// Config, panels, benchmark, then every strategy.
fn evaluate(input: &InputArgs) -> Result<(LoadedPanels, ResultsCollection)> {
    let config = load_config(input.config.as_deref())?;
    if config.strategies.is_empty() {
        bail!("config defines no strategies");
    }

    let loaded = if input.synthetic {
        let start = parse_date(&input.synthetic_start)?;
        let end = parse_date(&input.synthetic_end)?;
        if end < start {
            bail!("--synthetic-end {end} is before --synthetic-start {start}");
        }
        generate_synthetic_panels(
            input.synthetic_assets,
            input.synthetic_sectors,
            start,
            end,
            input.seed,
        )?
    } else {
        let dir = input.data_dir.clone().unwrap_or_else(|| config.data_dir());
        load_panels(&dir).with_context(|| {
            format!(
                "failed to load panels from {} (pass --synthetic to run without data)",
                dir.display()
            )
        })?
    };

    tracing::info!(
        assets = loaded.data.prices().n_cols(),
        days = loaded.data.prices().n_rows(),
        strategies = config.strategies.len(),
        synthetic = loaded.has_synthetic,
        "evaluating strategies"
    );

    let benchmark = config
        .build_benchmark()?
        .calculate_returns(&loaded.data)
        .context("benchmark calculation failed")?;
    let strategies = config.build_strategies()?;
    let results = Backtest::new(benchmark, strategies)
        .with_parallelism(input.parallel)
        .run(&loaded.data)?;
    Ok((loaded, results))
}

fn load_config(path: Option<&Path>) -> Result<BacktestConfig> {
    match path {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BacktestConfig {
            strategies: vec![StrategyConfig {
                name: SectorMomentum::DEFAULT_NAME.to_string(),
                kind: StrategyKind::MomentumSectorLs,
                params: StrategyParams::default(),
            }],
            ..BacktestConfig::default()
        }),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn print_summary(loaded: &LoadedPanels, stats: &[(String, StrategyStatistics)], sig_figs: usize) {
    let prices = loaded.data.prices();
    println!("=== Backtest Summary ===");
    if let (Some(first), Some(last)) = (prices.dates().first(), prices.dates().last()) {
        println!("Panels:    {first} to {last}");
    }
    println!("Assets:    {}", prices.n_cols());
    println!("Sectors:   {}", loaded.data.sectors().len());
    println!("Dataset:   {}", &loaded.dataset_hash[..16]);
    if loaded.has_synthetic {
        println!("WARNING:   synthetic data, not market data");
    }
    println!();
    print!("{}", statistics_table(stats, sig_figs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_defaults() {
        let cli = Cli::try_parse_from(["sectorlab", "run", "--synthetic"]).unwrap();
        match cli.command {
            Commands::Run {
                input,
                output_dir,
                sig_figs,
            } => {
                assert!(input.synthetic);
                assert!(input.config.is_none());
                assert!(!input.parallel);
                assert_eq!(input.seed, 42);
                assert_eq!(output_dir, PathBuf::from("results"));
                assert_eq!(sig_figs, 4);
            }
            Commands::Stats { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn default_config_runs_default_strategy() {
        let config = load_config(None).unwrap();
        assert_eq!(config.strategies.len(), 1);
        assert_eq!(config.strategies[0].name, SectorMomentum::DEFAULT_NAME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stats_on_small_synthetic_universe() {
        let cli = Cli::try_parse_from([
            "sectorlab",
            "stats",
            "--synthetic",
            "--synthetic-start",
            "2010-01-01",
            "--synthetic-end",
            "2012-12-31",
            "--synthetic-assets",
            "30",
            "--synthetic-sectors",
            "6",
            "--parallel",
        ])
        .unwrap();
        let Commands::Stats { input, .. } = cli.command else {
            panic!("expected stats");
        };
        let (loaded, results) = evaluate(&input).unwrap();
        assert!(loaded.has_synthetic);
        assert_eq!(
            results.labels(),
            vec![
                "Benchmark".to_string(),
                format!("{} - Long", SectorMomentum::DEFAULT_NAME),
                format!("{} - Short", SectorMomentum::DEFAULT_NAME),
                format!("{} - Combined", SectorMomentum::DEFAULT_NAME),
            ]
        );
    }

    #[test]
    fn inverted_synthetic_window_rejected() {
        let cli = Cli::try_parse_from([
            "sectorlab",
            "stats",
            "--synthetic",
            "--synthetic-start",
            "2012-01-01",
            "--synthetic-end",
            "2010-01-01",
        ])
        .unwrap();
        let Commands::Stats { input, .. } = cli.command else {
            panic!("expected stats");
        };
        assert!(evaluate(&input).is_err());
    }
}
