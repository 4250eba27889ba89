//! APT Martingale Experiment
//!
//! Tests whether consecutive mid-prices are equal. For every time bucket:
//!
//! - **Exp 1**: number of adjacent pairs with `price[t] == price[t+1]`
//! - **Exp 2**: number of adjacent pairs with `price[t] != price[t+1]`
//! - **P. Exp 1** = `round2(Exp 1 / denominator)`, **P. Exp 2** = `1 - P. Exp 1`
//!
//! # Modes
//!
//! | Mode         | Rows                       | Buckets                    | Denominator |
//! |--------------|----------------------------|----------------------------|-------------|
//! | all orders   | every level of every book  | occupied buckets only      | `n - 1`     |
//! | top of book  | level 0 of every book      | calendar bins, gaps filled | `n`         |
//!
//! The two denominators differ on purpose and are both part of the output
//! contract; each bucket records the one it used.
//!
//! Input snapshots must be in chronological order.

use crate::analysis::book::{ensure_chronological, OrderbookSnapshot, Price};
use crate::analysis::error::AnalysisError;
use crate::analysis::mid_price::{MidPriceEngine, MidPriceRow, TopOfBookPrices};
use crate::analysis::time_buckets::{round_to, BucketGranularity, Nanos};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decimal places kept on P. Exp 1.
pub const PROPORTION_DECIMALS: u32 = 2;

/// Experiment counts for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentBucket {
    /// Bucket start (nanoseconds since epoch).
    pub time: Nanos,
    pub exp_1: usize,
    pub exp_2: usize,
    pub p_exp_1: f64,
    pub p_exp_2: f64,
    /// Rows that fell in the bucket.
    pub rows: usize,
    /// Denominator behind P. Exp 1. Zero means the proportion is undefined
    /// and reported as 0.
    pub denominator: usize,
}

impl ExperimentBucket {
    pub fn from_counts(time: Nanos, exp_1: usize, denominator: usize, rows: usize) -> Self {
        debug_assert!(exp_1 <= denominator);
        let p_exp_1 = if denominator == 0 {
            0.0
        } else {
            round_to(exp_1 as f64 / denominator as f64, PROPORTION_DECIMALS)
        };
        Self {
            time,
            exp_1,
            exp_2: denominator - exp_1,
            p_exp_1,
            p_exp_2: 1.0 - p_exp_1,
            rows,
            denominator,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.denominator > 0
    }
}

/// One experiment table, buckets in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentTable {
    buckets: Vec<ExperimentBucket>,
}

impl ExperimentTable {
    pub fn new(buckets: Vec<ExperimentBucket>) -> Self {
        Self { buckets }
    }

    pub fn buckets(&self) -> &[ExperimentBucket] {
        &self.buckets
    }

    /// First `n` buckets.
    pub fn head(&self, n: usize) -> &[ExperimentBucket] {
        &self.buckets[..n.min(self.buckets.len())]
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl FromIterator<ExperimentBucket> for ExperimentTable {
    fn from_iter<I: IntoIterator<Item = ExperimentBucket>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// All-orders tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllOrdersResult {
    pub simple_mid_price: ExperimentTable,
    pub weighted_mid_price: ExperimentTable,
}

/// Top-of-book tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopOfBookResult {
    pub simple_mid_price: ExperimentTable,
    pub weighted_mid_price_a: ExperimentTable,
    pub weighted_mid_price_b: ExperimentTable,
}

/// Number of adjacent equal pairs in `values`.
pub fn count_repeats(values: impl IntoIterator<Item = Price>) -> usize {
    let mut iter = values.into_iter();
    let Some(mut prev) = iter.next() else {
        return 0;
    };
    iter.fold(0, |repeats, value| {
        let equal = value == prev;
        prev = value;
        repeats + usize::from(equal)
    })
}

/// Runs both martingale modes over a chronologically ordered snapshot set.
#[derive(Debug, Clone)]
pub struct MartingaleExperiment {
    granularity: BucketGranularity,
    engine: MidPriceEngine,
    emit_empty_bins: bool,
}

impl MartingaleExperiment {
    pub fn new(granularity: BucketGranularity, engine: MidPriceEngine, emit_empty_bins: bool) -> Self {
        Self {
            granularity,
            engine,
            emit_empty_bins,
        }
    }

    /// All-orders mode: every level of every book, compared within buckets.
    pub fn all_orders(&self, snapshots: &[OrderbookSnapshot]) -> Result<AllOrdersResult, AnalysisError> {
        ensure_chronological(snapshots)?;
        let g = self.granularity;

        let rows: Vec<MidPriceRow> = snapshots
            .iter()
            .map(|s| self.engine.level_rows(s))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        let (simple, weighted): (Vec<_>, Vec<_>) = rows
            .chunk_by(|a, b| g.index(a.timestamp) == g.index(b.timestamp))
            .map(|chunk| all_orders_bucket(g.bucket_start(chunk[0].timestamp), chunk))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unzip();

        debug!(
            "all-orders: {} rows across {} buckets",
            rows.len(),
            simple.len()
        );

        Ok(AllOrdersResult {
            simple_mid_price: ExperimentTable::new(simple),
            weighted_mid_price: ExperimentTable::new(weighted),
        })
    }

    /// Top-of-book mode: level 0 of every book, compared within calendar bins.
    pub fn top_of_book(&self, snapshots: &[OrderbookSnapshot]) -> Result<TopOfBookResult, AnalysisError> {
        ensure_chronological(snapshots)?;

        let prices: Vec<TopOfBookPrices> = snapshots
            .iter()
            .filter_map(|s| self.engine.top_of_book(s).transpose())
            .collect::<Result<_, _>>()?;

        let bins = self.calendar_bins(&prices);
        debug!(
            "top-of-book: {} rows across {} bins",
            prices.len(),
            bins.len()
        );

        Ok(TopOfBookResult {
            simple_mid_price: top_of_book_table(&bins, |p| p.simple_mid),
            weighted_mid_price_a: top_of_book_table(&bins, |p| p.weighted_mid_a),
            weighted_mid_price_b: top_of_book_table(&bins, |p| p.weighted_mid_b),
        })
    }

    /// Group rows into clock-aligned bins, filling gaps with empty bins
    /// between the first and last occupied one when configured to.
    fn calendar_bins<'a>(&self, rows: &'a [TopOfBookPrices]) -> Vec<(Nanos, &'a [TopOfBookPrices])> {
        let g = self.granularity;
        let occupied = rows
            .chunk_by(|a, b| g.index(a.timestamp) == g.index(b.timestamp))
            .map(|chunk| (g.bucket_start(chunk[0].timestamp), chunk));

        if !self.emit_empty_bins {
            return occupied.collect();
        }

        let mut bins = Vec::new();
        let mut next_start: Option<Nanos> = None;
        for (start, chunk) in occupied {
            if let Some(mut gap) = next_start {
                while gap < start {
                    bins.push((gap, &rows[..0]));
                    gap += g.width_ns();
                }
            }
            bins.push((start, chunk));
            next_start = Some(start + g.width_ns());
        }
        bins
    }
}

fn all_orders_bucket(
    start: Nanos,
    rows: &[MidPriceRow],
) -> Result<(ExperimentBucket, ExperimentBucket), AnalysisError> {
    if rows.is_empty() {
        return Err(AnalysisError::EmptyBucket { bucket_start: start });
    }
    let transitions = rows.len() - 1;
    let simple = count_repeats(rows.iter().map(|r| r.simple_mid));
    let weighted = count_repeats(rows.iter().map(|r| r.weighted_mid));
    Ok((
        ExperimentBucket::from_counts(start, simple, transitions, rows.len()),
        ExperimentBucket::from_counts(start, weighted, transitions, rows.len()),
    ))
}

fn top_of_book_table(
    bins: &[(Nanos, &[TopOfBookPrices])],
    price: impl Fn(&TopOfBookPrices) -> Price,
) -> ExperimentTable {
    bins.iter()
        .map(|(start, rows)| {
            let repeats = count_repeats(rows.iter().map(&price));
            ExperimentBucket::from_counts(*start, repeats, rows.len(), rows.len())
        })
        .collect()
}
