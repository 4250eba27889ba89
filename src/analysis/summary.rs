//! Report summaries and dataset descriptions.
//!
//! Undefined buckets (zero denominator) are left out of every statistic,
//! so a sparse minute cannot drag the mean toward zero.

use crate::analysis::book::{BookLevel, OrderbookSnapshot};
use crate::analysis::martingale::{ExperimentBucket, ExperimentTable};
use crate::analysis::roll::SpreadDefinition;
use crate::analysis::time_buckets::Nanos;
use crate::analysis::trade_probability::ProbabilityRow;
use crate::analysis::trades::TradeRecord;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Levels shown for the first book of a dataset description.
pub const PREVIEW_LEVELS: usize = 5;

/// Extremes and mean of P. Exp 1 across a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub buckets: usize,
    pub defined_buckets: usize,
    pub min_p_exp_1: f64,
    pub min_at: Nanos,
    pub max_p_exp_1: f64,
    pub max_at: Nanos,
    pub mean_p_exp_1: f64,
}

impl ExperimentSummary {
    /// `None` when no bucket has a defined proportion.
    pub fn from_table(table: &ExperimentTable) -> Option<Self> {
        let defined: Vec<&ExperimentBucket> =
            table.buckets().iter().filter(|b| b.is_defined()).collect();
        let first = *defined.first()?;

        // Strict comparisons keep the first occurrence, like idxmin/idxmax.
        let (min, max) = defined.iter().fold((first, first), |(min, max), &b| {
            (
                if b.p_exp_1 < min.p_exp_1 { b } else { min },
                if b.p_exp_1 > max.p_exp_1 { b } else { max },
            )
        });

        Some(Self {
            buckets: table.len(),
            defined_buckets: defined.len(),
            min_p_exp_1: min.p_exp_1,
            min_at: min.time,
            max_p_exp_1: max.p_exp_1,
            max_at: max.time,
            mean_p_exp_1: defined.iter().map(|b| b.p_exp_1).collect::<Vec<_>>().mean(),
        })
    }
}

/// Theoretical vs observed spread at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadSummary {
    pub observations: usize,
    pub gamma_1: f64,
    pub overall_spread: f64,
    pub positive_covariance: bool,
    pub positive_running_estimates: usize,
    pub mean_real_spread: f64,
    /// Mean over rows with a defined running estimate; `None` if there are none.
    pub mean_theoretical_spread: Option<f64>,
    pub mean_spread_diff: Option<f64>,
}

impl SpreadSummary {
    pub fn from_definition(definition: &SpreadDefinition) -> Self {
        let real: Vec<f64> = definition.rows.iter().map(|r| r.real_spread).collect();
        let theoretical: Vec<f64> = definition
            .rows
            .iter()
            .filter_map(|r| r.theoretical_spread)
            .collect();
        let diffs: Vec<f64> = definition.rows.iter().filter_map(|r| r.spread_diff).collect();

        Self {
            observations: definition.rows.len(),
            gamma_1: definition.estimate.gamma_1,
            overall_spread: definition.estimate.spread,
            positive_covariance: definition.estimate.positive_covariance,
            positive_running_estimates: definition.positive_running_estimates,
            mean_real_spread: if real.is_empty() { 0.0 } else { real.iter().mean() },
            mean_theoretical_spread: (!theoretical.is_empty()).then(|| theoretical.iter().mean()),
            mean_spread_diff: (!diffs.is_empty()).then(|| diffs.iter().mean()),
        }
    }
}

/// Where the running sell probability ended up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySummary {
    pub trades: usize,
    pub final_prob_sell: f64,
    pub final_prob_buy: f64,
}

impl ProbabilitySummary {
    pub fn from_rows(rows: &[ProbabilityRow]) -> Option<Self> {
        rows.last().map(|last| Self {
            trades: rows.len(),
            final_prob_sell: last.prob_sell,
            final_prob_buy: last.prob_buy,
        })
    }
}

/// Shape of one exchange's order book capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescription {
    pub exchange: String,
    pub books: usize,
    pub first: Option<Nanos>,
    pub last: Option<Nanos>,
    pub max_depth: usize,
    /// Leading levels of the first book.
    pub first_levels: Vec<BookLevel>,
}

impl DatasetDescription {
    pub fn new(exchange: &str, snapshots: &[OrderbookSnapshot]) -> Self {
        Self {
            exchange: exchange.to_string(),
            books: snapshots.len(),
            first: snapshots.first().map(|s| s.timestamp),
            last: snapshots.last().map(|s| s.timestamp),
            max_depth: snapshots.iter().map(OrderbookSnapshot::depth).fold(0, usize::max),
            first_levels: snapshots
                .first()
                .map(|s| s.levels().iter().take(PREVIEW_LEVELS).copied().collect())
                .unwrap_or_default(),
        }
    }
}

/// Size and time range of a trade tape (file order is not assumed sorted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTapeDescription {
    pub trades: usize,
    pub first: Option<Nanos>,
    pub last: Option<Nanos>,
}

impl TradeTapeDescription {
    pub fn new(trades: &[TradeRecord]) -> Self {
        let range = trades.iter().fold(None, |range: Option<(Nanos, Nanos)>, t| {
            Some(match range {
                Some((lo, hi)) => (lo.min(t.timestamp), hi.max(t.timestamp)),
                None => (t.timestamp, t.timestamp),
            })
        });
        Self {
            trades: trades.len(),
            first: range.map(|(lo, _)| lo),
            last: range.map(|(_, hi)| hi),
        }
    }
}
