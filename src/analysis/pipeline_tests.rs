//! Analysis Pipeline and Summary Tests

use crate::analysis::book::{BookLevel, OrderbookSnapshot};
use crate::analysis::config::{AnalysisConfig, ShortTapePolicy};
use crate::analysis::error::AnalysisError;
use crate::analysis::pipeline::AnalysisPipeline;
use crate::analysis::repository::OrderbookRepository;
use crate::analysis::summary::{
    DatasetDescription, ExperimentSummary, ProbabilitySummary, SpreadSummary, TradeTapeDescription,
};
use crate::analysis::time_buckets::{parse_timestamp, NANOS_PER_SEC};
use crate::analysis::trades::{Side, TradeRecord};

fn base() -> i64 {
    parse_timestamp("2021-07-05T10:00:00Z").unwrap()
}

fn book(offset_secs: i64, bid: f64, ask: f64) -> OrderbookSnapshot {
    OrderbookSnapshot::new(
        base() + offset_secs * NANOS_PER_SEC,
        vec![
            BookLevel::new(1.0, bid, ask, 1.0),
            BookLevel::new(2.0, bid - 1.0, ask + 1.0, 2.0),
        ],
        true,
    )
    .unwrap()
}

/// Two exchanges; `kraken` leaves 10:01 empty.
fn repository() -> OrderbookRepository {
    OrderbookRepository::from_snapshots(vec![
        (
            "bitfinex".to_string(),
            vec![
                book(0, 100.0, 101.0),
                book(30, 100.0, 101.0),
                book(70, 100.0, 102.0),
                book(90, 100.0, 102.0),
            ],
        ),
        (
            "kraken".to_string(),
            vec![
                book(5, 200.0, 201.0),
                book(10, 200.5, 201.5),
                book(130, 200.0, 201.0),
            ],
        ),
    ])
}

fn trades() -> Vec<TradeRecord> {
    [Side::Sell, Side::Buy, Side::Buy, Side::Sell]
        .iter()
        .enumerate()
        .map(|(i, &side)| TradeRecord {
            timestamp: base() + i as i64 * NANOS_PER_SEC,
            price: 100.5,
            amount: 0.1,
            side,
        })
        .collect()
}

fn pipeline() -> AnalysisPipeline {
    let config = AnalysisConfig {
        short_tape_policy: ShortTapePolicy::Clamp,
        ..AnalysisConfig::default()
    };
    AnalysisPipeline::new(&config).unwrap()
}

// =============================================================================
// PIPELINE
// =============================================================================

#[test]
fn test_run_covers_every_exchange() {
    let tape = trades();
    let bundle = pipeline().run(&repository(), Some(tape.as_slice()), &[]).unwrap();
    assert_eq!(
        bundle.exchanges.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["bitfinex", "kraken"]
    );

    let bitfinex = bundle.get("bitfinex").unwrap();
    // Two levels per book, two books per minute: 4 rows, 3 transitions.
    let simple = bitfinex.apt_all.simple_mid_price.buckets();
    assert_eq!(simple.len(), 2);
    assert_eq!(simple[0].rows, 4);
    assert_eq!(simple[0].denominator, 3);
    // Level 0 and level 1 share a mid, so every transition repeats.
    assert_eq!(simple[0].p_exp_1, 1.0);

    // Top of book: two rows per minute, denominator = rows.
    let tob = bitfinex.apt_tob.simple_mid_price.buckets();
    assert_eq!(tob.len(), 2);
    assert_eq!(tob[0].denominator, 2);
    assert_eq!(tob[0].p_exp_1, 0.5);

    assert_eq!(bitfinex.roll.spread_definition.rows.len(), 4);
    assert_eq!(bitfinex.roll.prob_evolution.len(), 4);
    assert_eq!(bitfinex.roll.prob_evolution[3].prob_sell, 0.5);
}

#[test]
fn test_top_of_book_fills_empty_minutes() {
    let bundle = pipeline().run(&repository(), None, &[]).unwrap();
    let kraken = bundle.get("kraken").unwrap();

    let bins = kraken.apt_tob.weighted_mid_price_b.buckets();
    assert_eq!(bins.len(), 3);
    assert_eq!(bins[1].time, base() + 60 * NANOS_PER_SEC);
    assert_eq!(bins[1].rows, 0);
    assert_eq!(bins[1].p_exp_1, 0.0);
    assert_eq!(bins[1].p_exp_2, 1.0);

    // All-orders mode only reports occupied buckets.
    assert_eq!(kraken.apt_all.weighted_mid_price.len(), 2);
    assert!(kraken.roll.prob_evolution.is_empty());
}

#[test]
fn test_exchange_filter() {
    let only = vec!["kraken".to_string()];
    let bundle = pipeline().run(&repository(), None, &only).unwrap();
    assert_eq!(bundle.exchanges.len(), 1);
    assert!(bundle.get("bitfinex").is_none());
}

#[test]
fn test_unknown_exchange_is_config_error() {
    let only = vec!["binance".to_string()];
    match pipeline().run(&repository(), None, &only) {
        Err(AnalysisError::Config { message }) => assert!(message.contains("binance")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_invalid_config_rejected() {
    let config = AnalysisConfig {
        bucket_secs: 0,
        ..AnalysisConfig::default()
    };
    assert!(AnalysisPipeline::new(&config).is_err());
}

#[test]
fn test_short_history_fails_whole_run() {
    let repo = OrderbookRepository::from_snapshots(vec![(
        "tiny".to_string(),
        vec![book(0, 100.0, 101.0), book(1, 100.0, 101.0)],
    )]);
    assert!(matches!(
        pipeline().run(&repo, None, &[]),
        Err(AnalysisError::InsufficientHistory { .. })
    ));
}

#[test]
fn test_json_export_keys() {
    let tape = trades();
    let bundle = pipeline().run(&repository(), Some(tape.as_slice()), &[]).unwrap();
    let mut buf = Vec::new();
    bundle.write_json(&mut buf).unwrap();

    let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    let bitfinex = &value["bitfinex"];
    assert!(bitfinex["apt_all"]["simple_mid_price"].is_array());
    assert!(bitfinex["apt_all"]["weighted_mid_price"].is_array());
    assert!(bitfinex["apt_tob"]["weighted_mid_price_a"].is_array());
    assert!(bitfinex["apt_tob"]["weighted_mid_price_b"].is_array());
    assert!(bitfinex["roll"]["spread_definition"]["rows"].is_array());
    assert_eq!(bitfinex["roll"]["prob_evolution"][0]["side"], "sell");
    assert_eq!(bitfinex["apt_all"]["simple_mid_price"][0]["p_exp_1"], 1.0);

    let back: crate::analysis::pipeline::ResultBundle = serde_json::from_slice(&buf).unwrap();
    assert_eq!(back.exchanges.len(), bundle.exchanges.len());
}

// =============================================================================
// SUMMARIES
// =============================================================================

#[test]
fn test_experiment_summary_skips_undefined_buckets() {
    let bundle = pipeline().run(&repository(), None, &[]).unwrap();
    let table = &bundle.get("kraken").unwrap().apt_tob.simple_mid_price;

    // Bins: [0.0 (2 rows, no repeat), empty, 0.0 (1 row)].
    let summary = ExperimentSummary::from_table(table).unwrap();
    assert_eq!(summary.buckets, 3);
    assert_eq!(summary.defined_buckets, 2);
    assert_eq!(summary.min_p_exp_1, 0.0);
    assert_eq!(summary.min_at, base());
    assert_eq!(summary.mean_p_exp_1, 0.0);
}

#[test]
fn test_experiment_summary_extremes() {
    let bundle = pipeline().run(&repository(), None, &[]).unwrap();
    let table = &bundle.get("bitfinex").unwrap().apt_all.simple_mid_price;
    let summary = ExperimentSummary::from_table(table).unwrap();
    assert_eq!(summary.max_p_exp_1, 1.0);
    // First occurrence wins on ties.
    assert_eq!(summary.max_at, base());
    assert!((summary.mean_p_exp_1 - 1.0).abs() < 1e-12);

    assert!(ExperimentSummary::from_table(&Default::default()).is_none());
}

#[test]
fn test_spread_summary() {
    let bundle = pipeline().run(&repository(), None, &[]).unwrap();
    let definition = &bundle.get("bitfinex").unwrap().roll.spread_definition;
    let summary = SpreadSummary::from_definition(definition);

    assert_eq!(summary.observations, 4);
    // Real spreads: 1, 1, 2, 2.
    assert!((summary.mean_real_spread - 1.5).abs() < 1e-12);
    assert_eq!(summary.overall_spread, definition.estimate.spread);
    assert!(summary.mean_theoretical_spread.is_some());
    assert!(summary.mean_spread_diff.is_some());
}

#[test]
fn test_probability_summary() {
    let tape = trades();
    let rows = pipeline().prob_evolution(&tape).unwrap();
    let summary = ProbabilitySummary::from_rows(&rows).unwrap();
    assert_eq!(summary.trades, 4);
    assert_eq!(summary.final_prob_sell, 0.5);
    assert_eq!(summary.final_prob_buy, 0.5);
    assert!(ProbabilitySummary::from_rows(&[]).is_none());
}

#[test]
fn test_dataset_descriptions() {
    let repo = repository();
    let description = DatasetDescription::new("kraken", repo.snapshots("kraken").unwrap());
    assert_eq!(description.books, 3);
    assert_eq!(description.first, Some(base() + 5 * NANOS_PER_SEC));
    assert_eq!(description.last, Some(base() + 130 * NANOS_PER_SEC));
    assert_eq!(description.max_depth, 2);
    assert_eq!(description.first_levels.len(), 2);

    let empty = DatasetDescription::new("none", &[]);
    assert_eq!(empty.first, None);
    assert_eq!(empty.max_depth, 0);

    let mut tape = trades();
    tape.swap(0, 3);
    let tape_description = TradeTapeDescription::new(&tape);
    assert_eq!(tape_description.trades, 4);
    assert_eq!(tape_description.first, Some(base()));
    assert_eq!(tape_description.last, Some(base() + 3 * NANOS_PER_SEC));
}
