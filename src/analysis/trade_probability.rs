//! Trade side probability evolution.
//!
//! For the first `N` trades of the tape, the running share of sells:
//!
//! ```text
//! prob_sell[k] = round(#sell in trades[0..k] / k, 4),   prob_buy[k] = 1 - prob_sell[k]
//! ```
//!
//! The 4 dp rounding applies to the exact quotient, not a scaled product.
//! A single running counter makes this O(N).

use crate::analysis::book::{Price, Size};
use crate::analysis::config::ShortTapePolicy;
use crate::analysis::error::AnalysisError;
use crate::analysis::time_buckets::{round_exact, Nanos};
use crate::analysis::trades::{Side, TradeRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Decimal places kept on `prob_sell`.
pub const PROBABILITY_DECIMALS: u32 = 4;

/// A trade annotated with the running side probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRow {
    pub timestamp: Nanos,
    pub price: Price,
    pub amount: Size,
    pub side: Side,
    pub prob_sell: f64,
    pub prob_buy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TradeProbabilityTracker {
    sample_size: usize,
    policy: ShortTapePolicy,
}

impl TradeProbabilityTracker {
    pub fn new(sample_size: usize, policy: ShortTapePolicy) -> Self {
        Self {
            sample_size,
            policy,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Running probabilities over the leading `sample_size` trades.
    ///
    /// A shorter tape is clamped (with a warning) or rejected, per policy.
    pub fn evolution(&self, trades: &[TradeRecord]) -> Result<Vec<ProbabilityRow>, AnalysisError> {
        if trades.len() < self.sample_size {
            match self.policy {
                ShortTapePolicy::Fail => {
                    return Err(AnalysisError::InsufficientHistory {
                        what: "trade probability sample",
                        required: self.sample_size,
                        available: trades.len(),
                    })
                }
                ShortTapePolicy::Clamp => warn!(
                    "Trade tape has {} trades, fewer than the sample size {}; using all of them",
                    trades.len(),
                    self.sample_size
                ),
            }
        }

        Ok(trades
            .iter()
            .take(self.sample_size)
            .enumerate()
            .scan(0usize, |sells, (i, trade)| {
                if trade.side == Side::Sell {
                    *sells += 1;
                }
                let prob_sell = round_exact(*sells as f64 / (i + 1) as f64, PROBABILITY_DECIMALS);
                Some(ProbabilityRow {
                    timestamp: trade.timestamp,
                    price: trade.price,
                    amount: trade.amount,
                    side: trade.side,
                    prob_sell,
                    prob_buy: 1.0 - prob_sell,
                })
            })
            .collect())
    }
}
