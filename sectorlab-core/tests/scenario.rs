//! End-to-end signal scenarios on small hand-built universes.

use chrono::{Duration, NaiveDate};
use sectorlab_core::signals::{equal_weights, expand_to_assets, select_sectors};
use sectorlab_core::{
    evaluate_leg, turnover, weighted_returns, Frequency, Leg, LegMode, Panel, PanelData,
    SectorMap, SectorMomentum, Strategy, StrategyParams,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn month_ends() -> Vec<NaiveDate> {
    vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30)]
}

fn assets() -> Vec<String> {
    vec!["1".into(), "2".into(), "3".into()]
}

/// Assets 1 and 2 in sector 10, asset 3 in sector 20.
fn sector_map() -> SectorMap {
    [("1", "10"), ("2", "10"), ("3", "20")].into_iter().collect()
}

/// Daily prices, Jan through Apr 2024: sector 10 trends up, sector 20 down.
fn trending_universe() -> PanelData {
    let start = d(2024, 1, 1);
    let days = (d(2024, 4, 30) - start).num_days() as usize + 1;
    let dates: Vec<NaiveDate> = (0..days).map(|i| start + Duration::days(i as i64)).collect();
    let rows: Vec<Vec<f64>> = (0..days)
        .map(|t| {
            let t = t as i32;
            vec![
                100.0 * 1.002_f64.powi(t),
                50.0 * 1.003_f64.powi(t),
                80.0 * 0.998_f64.powi(t),
            ]
        })
        .collect();
    let presence = vec![vec![1.0; 3]; days];
    PanelData::new(
        Panel::from_rows(dates.clone(), assets(), rows).unwrap(),
        Panel::from_rows(dates, assets(), presence).unwrap(),
        sector_map(),
    )
    .unwrap()
}

// ─── Selection and weights ──────────────────────────────────────────

#[test]
fn ranked_sectors_expand_to_asset_weights() {
    // Sector 10 ranks highest and 20 lowest from period 2 on.
    let momentum = Panel::from_rows(
        month_ends(),
        vec!["10".into(), "20".into()],
        vec![
            vec![f64::NAN, f64::NAN],
            vec![f64::NAN, f64::NAN],
            vec![0.04, -0.02],
            vec![0.05, -0.03],
        ],
    )
    .unwrap();

    let (top, bottom) = select_sectors(&momentum, 1);
    let long = equal_weights(&top, 1.0);
    let short = equal_weights(&bottom, -1.0);
    let long_assets = expand_to_assets(&long, &assets(), &sector_map()).unwrap();
    let short_assets = expand_to_assets(&short, &assets(), &sector_map()).unwrap();

    assert_eq!(long_assets.row(3), &[0.5, 0.5, 0.0]);
    assert_eq!(short_assets.row(3), &[0.0, 0.0, -1.0]);
    assert_eq!(long_assets.row(0), &[0.0, 0.0, 0.0]);
    assert_eq!(short_assets.row(1), &[0.0, 0.0, 0.0]);
}

#[test]
fn generated_signals_go_long_the_rising_sector() {
    let params = StrategyParams {
        num_sectors: 1,
        frequency: Frequency::Monthly,
        start_date: d(2024, 1, 1),
        legs: LegMode::All,
        ..StrategyParams::default()
    };
    let strategy = SectorMomentum::with_params("Momo", params).unwrap();
    let data = trending_universe();
    let signals = strategy.generate_signals(&data).unwrap();

    assert_eq!(signals.frequency, Frequency::Monthly);
    assert_eq!(signals.asset_returns().dates(), month_ends().as_slice());
    assert_eq!(signals.legs().len(), 3);

    let long = signals.positions(Leg::Long).unwrap();
    let short = signals.positions(Leg::Short).unwrap();
    assert_eq!(long.columns(), &["10".to_string(), "20".to_string()]);

    // No score exists until two periods of sector returns have been seen.
    assert_eq!(long.row(0), &[0.0, 0.0]);
    assert_eq!(long.row(1), &[0.0, 0.0]);
    assert_eq!(long.row(3), &[1.0, 0.0]);
    assert_eq!(short.row(3), &[0.0, -1.0]);

    let long_assets = expand_to_assets(long, &assets(), data.sectors()).unwrap();
    let short_assets = expand_to_assets(short, &assets(), data.sectors()).unwrap();
    assert_eq!(long_assets.row(3), &[0.5, 0.5, 0.0]);
    assert_eq!(short_assets.row(3), &[0.0, 0.0, -1.0]);

    let activity = signals.activity(Leg::Long).unwrap();
    assert_eq!(activity.row_sums(), vec![0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn combined_leg_is_sum_of_sides() {
    let params = StrategyParams {
        num_sectors: 1,
        start_date: d(2024, 1, 1),
        ..StrategyParams::default()
    };
    let strategy = SectorMomentum::with_params("Momo", params).unwrap();
    let signals = strategy.generate_signals(&trending_universe()).unwrap();

    let long = signals.positions(Leg::Long).unwrap();
    let short = signals.positions(Leg::Short).unwrap();
    let combined = signals.positions(Leg::Combined).unwrap();
    for r in 0..combined.n_rows() {
        for c in 0..combined.n_cols() {
            assert_eq!(combined.get(r, c), long.get(r, c) + short.get(r, c));
        }
    }
}

#[test]
fn long_leg_earns_the_rising_sector() {
    let params = StrategyParams {
        num_sectors: 1,
        start_date: d(2024, 1, 1),
        legs: LegMode::Long,
        ..StrategyParams::default()
    };
    let strategy = SectorMomentum::with_params("Momo", params).unwrap();
    let signals = strategy.generate_signals(&trending_universe()).unwrap();
    let long = signals.positions(Leg::Long).unwrap();
    assert!(signals.positions(Leg::Short).is_none());

    let leg = evaluate_leg(signals.asset_returns(), long, 0.0).unwrap();
    assert_eq!(leg.returns.values[0], 0.0);
    assert_eq!(leg.returns.values[1], 0.0);
    assert!(leg.returns.values[2] > 0.0);
    assert!(leg.returns.values[3] > 0.0);
    assert_eq!(leg.turnover.values, vec![0.0, 0.0, 1.0, 0.0]);
}

// ─── Turnover ───────────────────────────────────────────────────────

#[test]
fn turnover_of_switching_book() {
    let positions = Panel::from_rows(
        month_ends()[..3].to_vec(),
        vec!["a".into(), "b".into()],
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 1.0]],
    )
    .unwrap();
    assert_eq!(turnover(&positions).values, vec![1.0, 2.0, 0.0]);
}

#[test]
fn flat_book_earns_nothing() {
    let returns = Panel::from_rows(
        month_ends()[..2].to_vec(),
        vec!["a".into(), "b".into()],
        vec![vec![0.1, -0.2], vec![f64::NAN, 0.3]],
    )
    .unwrap();
    let flat = returns.full_like(0.0);
    let gross = weighted_returns(&returns, &flat).unwrap();
    assert!(gross.values.iter().all(|&r| r == 0.0));
}
