//! Backtest orchestrator: seeds the benchmark, then values every strategy leg.
//!
//! Each strategy is evaluated in full (signals, then turnover, weighted
//! returns, and cost drag for every leg) before any of its series is inserted,
//! so a failing strategy never leaves partial output behind. Strategies only
//! read the shared panels, which lets `with_parallelism(true)` fan them out
//! over rayon while keeping the insertion order of the sequential path.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sectorlab_core::{
    evaluate_leg, BenchmarkReturns, Frequency, Leg, Panel, PanelDataProvider, PanelError,
    SignalError, Strategy, TimeSeries,
};

/// Errors from an orchestrated run.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("series '{0}' is already in the results collection")]
    DuplicateSeries(SeriesKey),

    #[error("strategy '{name}' failed: {source}")]
    Strategy {
        name: String,
        #[source]
        source: SignalError,
    },
}

// ─── Keys ───────────────────────────────────────────────────────────

/// Structured identity of one result series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub strategy_id: String,
    /// `None` for the benchmark.
    pub leg: Option<Leg>,
}

impl SeriesKey {
    pub const BENCHMARK: &'static str = "Benchmark";

    pub fn benchmark() -> Self {
        Self {
            strategy_id: Self::BENCHMARK.to_string(),
            leg: None,
        }
    }

    pub fn leg(strategy_id: impl Into<String>, leg: Leg) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            leg: Some(leg),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.leg {
            Some(leg) => write!(f, "{} - {}", self.strategy_id, leg.label()),
            None => f.write_str(&self.strategy_id),
        }
    }
}

// ─── Results ────────────────────────────────────────────────────────

/// Net returns, turnover, and selection mask of one series.
#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub key: SeriesKey,
    pub returns: TimeSeries,
    pub turnover: TimeSeries,
    pub frequency: Frequency,
    /// Per-period selection mask; `None` means every period counts.
    pub activity: Option<Panel>,
}

impl ResultEntry {
    pub fn label(&self) -> String {
        self.key.to_string()
    }
}

/// Insertion-ordered collection of result series with unique keys.
#[derive(Debug, Clone, Default)]
pub struct ResultsCollection {
    entries: Vec<ResultEntry>,
    index: HashMap<SeriesKey, usize>,
}

impl ResultsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; an existing key is an error and leaves the collection unchanged.
    pub fn insert(&mut self, entry: ResultEntry) -> Result<(), BacktestError> {
        if self.index.contains_key(&entry.key) {
            return Err(BacktestError::DuplicateSeries(entry.key));
        }
        self.index.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Append a batch atomically: either every entry goes in or none does.
    pub fn insert_all(&mut self, entries: Vec<ResultEntry>) -> Result<(), BacktestError> {
        let mut batch = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if self.index.contains_key(&entry.key) || !batch.insert(&entry.key) {
                return Err(BacktestError::DuplicateSeries(entry.key.clone()));
            }
        }
        for entry in entries {
            self.index.insert(entry.key.clone(), self.entries.len());
            self.entries.push(entry);
        }
        Ok(())
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&ResultEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display labels in insertion order.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(ResultEntry::label).collect()
    }
}

impl<'a> IntoIterator for &'a ResultsCollection {
    type Item = &'a ResultEntry;
    type IntoIter = std::slice::Iter<'a, ResultEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ─── Orchestrator ───────────────────────────────────────────────────

/// Benchmark plus an ordered list of strategies to evaluate against one provider.
pub struct Backtest {
    benchmark: BenchmarkReturns,
    strategies: Vec<Box<dyn Strategy>>,
    parallel: bool,
}

impl Backtest {
    pub fn new(benchmark: BenchmarkReturns, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            benchmark,
            strategies,
            parallel: false,
        }
    }

    /// Enables or disables parallel strategy evaluation.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn strategies(&self) -> &[Box<dyn Strategy>] {
        &self.strategies
    }

    /// Seed the benchmark and evaluate every strategy in order.
    ///
    /// Stops at the first failing strategy.
    pub fn run(&self, data: &dyn PanelDataProvider) -> Result<ResultsCollection, BacktestError> {
        let started = Instant::now();
        let mut results = ResultsCollection::new();
        results.insert(ResultEntry {
            key: SeriesKey::benchmark(),
            returns: self.benchmark.returns.clone(),
            turnover: self.benchmark.turnover.clone(),
            frequency: self.benchmark.frequency,
            activity: None,
        })?;

        let evaluated: Vec<Result<Vec<ResultEntry>, BacktestError>> = if self.parallel {
            self.strategies
                .par_iter()
                .map(|s| evaluate_strategy(s.as_ref(), data))
                .collect()
        } else {
            self.strategies
                .iter()
                .map(|s| evaluate_strategy(s.as_ref(), data))
                .collect()
        };

        for entries in evaluated {
            results.insert_all(entries?)?;
        }

        tracing::info!(
            strategies = self.strategies.len(),
            series = results.len(),
            parallel = self.parallel,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backtest complete"
        );
        Ok(results)
    }
}

/// Generate signals and value every leg; nothing is returned on failure.
fn evaluate_strategy(
    strategy: &dyn Strategy,
    data: &dyn PanelDataProvider,
) -> Result<Vec<ResultEntry>, BacktestError> {
    let name = strategy.name();
    let started = Instant::now();
    let fail = |source: SignalError| BacktestError::Strategy {
        name: name.to_string(),
        source,
    };

    let signals = strategy.generate_signals(data).map_err(&fail)?;
    let cost_bps = strategy.transaction_cost_bps();

    let entries = signals
        .legs()
        .iter()
        .map(|leg| {
            let series = evaluate_leg(signals.asset_returns(), &leg.positions, cost_bps)?;
            Ok(ResultEntry {
                key: SeriesKey::leg(name, leg.leg),
                returns: series.returns,
                turnover: series.turnover,
                frequency: signals.frequency,
                activity: leg.activity.clone(),
            })
        })
        .collect::<Result<Vec<_>, PanelError>>()
        .map_err(|e| fail(e.into()))?;

    tracing::info!(
        strategy = name,
        legs = entries.len(),
        cost_bps,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "strategy evaluated"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(key: SeriesKey) -> ResultEntry {
        let series = TimeSeries::new(vec![d("2024-01-31")], vec![0.01]).unwrap();
        ResultEntry {
            key,
            returns: series.clone(),
            turnover: series,
            frequency: Frequency::Monthly,
            activity: None,
        }
    }

    #[test]
    fn key_display_uses_leg_label() {
        assert_eq!(SeriesKey::leg("Momo", Leg::Combined).to_string(), "Momo - Combined");
        assert_eq!(SeriesKey::benchmark().to_string(), "Benchmark");
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut results = ResultsCollection::new();
        results.insert(entry(SeriesKey::leg("a", Leg::Long))).unwrap();
        let err = results.insert(entry(SeriesKey::leg("a", Leg::Long))).unwrap_err();
        assert!(matches!(err, BacktestError::DuplicateSeries(k) if k == SeriesKey::leg("a", Leg::Long)));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let mut results = ResultsCollection::new();
        results.insert(entry(SeriesKey::leg("a", Leg::Short))).unwrap();
        let batch = vec![
            entry(SeriesKey::leg("a", Leg::Long)),
            entry(SeriesKey::leg("a", Leg::Short)),
        ];
        assert!(results.insert_all(batch).is_err());
        assert_eq!(results.labels(), vec!["a - Short"]);
    }

    #[test]
    fn batch_with_internal_duplicate_rejected() {
        let mut results = ResultsCollection::new();
        let batch = vec![
            entry(SeriesKey::leg("a", Leg::Long)),
            entry(SeriesKey::leg("a", Leg::Long)),
        ];
        assert!(results.insert_all(batch).is_err());
        assert!(results.is_empty());
    }

    #[test]
    fn lookup_preserves_insertion_order() {
        let mut results = ResultsCollection::new();
        results.insert(entry(SeriesKey::benchmark())).unwrap();
        results.insert(entry(SeriesKey::leg("z", Leg::Long))).unwrap();
        results.insert(entry(SeriesKey::leg("a", Leg::Long))).unwrap();
        assert_eq!(results.labels(), vec!["Benchmark", "z - Long", "a - Long"]);
        assert!(results.get(&SeriesKey::leg("a", Leg::Long)).is_some());
        assert!(!results.contains(&SeriesKey::leg("a", Leg::Short)));
    }
}
