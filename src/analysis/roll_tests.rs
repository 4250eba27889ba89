//! Roll Spread Estimator Tests

use crate::analysis::autocovariance::lag1_autocovariance;
use crate::analysis::book::{BookLevel, OrderbookSnapshot};
use crate::analysis::error::AnalysisError;
use crate::analysis::roll::{price_differences, roll_spread, RollSpreadEstimator};
use crate::analysis::time_buckets::NANOS_PER_SEC;

/// Books one second apart whose top-of-book mid follows `mids` with a 1.0 spread.
fn books_from_mids(mids: &[f64]) -> Vec<OrderbookSnapshot> {
    mids.iter()
        .enumerate()
        .map(|(i, &mid)| {
            OrderbookSnapshot::new(
                i as i64 * NANOS_PER_SEC,
                vec![BookLevel::new(1.0, mid - 0.5, mid + 0.5, 2.0)],
                true,
            )
            .unwrap()
        })
        .collect()
}

#[test]
fn test_price_differences() {
    assert_eq!(price_differences(&[100.0, 101.0, 100.5]), vec![1.0, -0.5]);
    assert!(price_differences(&[100.0]).is_empty());
}

#[test]
fn test_alternating_differences_give_positive_spread() {
    let estimate = RollSpreadEstimator::default()
        .estimate(&[1.0, -1.0, 1.0, -1.0, 1.0])
        .unwrap();
    assert!(estimate.gamma_1 < 0.0);
    assert!(!estimate.positive_covariance);
    assert!(estimate.spread > 0.0);
    assert!(estimate.spread.is_finite());
    assert_eq!(estimate.differences, 5);
}

#[test]
fn test_spread_matches_injected_autocovariance() {
    // Bid-ask bounce around a fixed value: p_t = v ± c/2 with c = 0.8.
    let mids: Vec<f64> = (0..101)
        .map(|i| 35_000.0 + if i % 3 == 0 { 0.4 } else { -0.4 })
        .collect();
    let diffs = price_differences(&mids);
    let gamma = lag1_autocovariance(&diffs).unwrap();

    let estimate = RollSpreadEstimator::default().estimate(&diffs).unwrap();
    assert!((estimate.gamma_1 - gamma).abs() < 1e-12);
    assert!((estimate.spread - 2.0 * gamma.abs().sqrt()).abs() < 1e-9);
}

#[test]
fn test_constant_prices_give_zero_spread() {
    let definition = RollSpreadEstimator::default()
        .spread_definition(&books_from_mids(&[100.5; 6]))
        .unwrap();
    assert_eq!(definition.estimate.gamma_1, 0.0);
    assert_eq!(definition.estimate.spread, 0.0);
    assert!(definition
        .rows
        .iter()
        .skip(2)
        .all(|r| r.theoretical_spread == Some(0.0)));
}

#[test]
fn test_insufficient_history() {
    let estimator = RollSpreadEstimator::default();
    for mids in [&[100.0][..], &[100.0, 101.0][..]] {
        match estimator.spread_definition(&books_from_mids(mids)) {
            Err(AnalysisError::InsufficientHistory {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, 2);
                assert_eq!(available, mids.len() - 1);
            }
            other => panic!("expected InsufficientHistory, got {:?}", other),
        }
    }
}

#[test]
fn test_running_series_alignment() {
    let mids = [100.0, 101.0, 100.0, 101.0, 100.0, 101.5];
    let estimator = RollSpreadEstimator::default();
    let definition = estimator.spread_definition(&books_from_mids(&mids)).unwrap();
    let diffs = price_differences(&mids);

    assert_eq!(definition.rows.len(), mids.len());
    assert_eq!(definition.rows[0].theoretical_spread, None);
    assert_eq!(definition.rows[1].theoretical_spread, None);
    assert_eq!(definition.rows[0].spread_diff, None);

    // Row t uses the first t differences.
    for t in 2..mids.len() {
        let expected = roll_spread(lag1_autocovariance(&diffs[..t]).unwrap());
        let got = definition.rows[t].theoretical_spread.unwrap();
        assert!((got - expected).abs() < 1e-9, "row {}: {} vs {}", t, got, expected);
    }

    // The last running value covers every difference.
    let last = definition.rows.last().unwrap().theoretical_spread.unwrap();
    assert!((last - definition.estimate.spread).abs() < 1e-9);
}

#[test]
fn test_spread_rows_use_overall_estimate() {
    let mids = [100.0, 101.0, 100.0, 101.0, 100.0];
    let definition = RollSpreadEstimator::default()
        .spread_definition(&books_from_mids(&mids))
        .unwrap();
    let s = definition.estimate.spread;

    for (row, &mid) in definition.rows.iter().zip(mids.iter()) {
        assert_eq!(row.mid_price, mid);
        assert_eq!(row.real_spread, 1.0);
        assert_eq!(row.bid, mid - 0.5);
        assert_eq!(row.ask_size, 2.0);
        assert_eq!(row.theoretical_bid, mid - s);
        assert_eq!(row.theoretical_ask, mid + s);
        if let (Some(theo), Some(diff)) = (row.theoretical_spread, row.spread_diff) {
            assert_eq!(diff, row.real_spread - theo);
        }
    }
}

#[test]
fn test_positive_covariance_is_flagged() {
    // Trending differences: positively autocorrelated.
    let diffs = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0];
    let estimate = RollSpreadEstimator::default().estimate(&diffs).unwrap();
    assert!(estimate.gamma_1 > 0.0);
    assert!(estimate.positive_covariance);
    assert_eq!(estimate.spread, roll_spread(estimate.gamma_1));
}

#[test]
fn test_overall_spread_rounding() {
    let diffs = [1.0, -1.0, 1.0, -1.0, 1.0];
    let rounded = RollSpreadEstimator::new(Some(6)).estimate(&diffs).unwrap();
    let raw = RollSpreadEstimator::default().estimate(&diffs).unwrap();
    assert!((rounded.spread - raw.spread).abs() <= 5e-7);
    assert_eq!(rounded.spread, (raw.spread * 1e6).round_ties_even() / 1e6);
}
