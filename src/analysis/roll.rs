//! Roll (1984) Spread Estimator
//!
//! Infers the effective bid-ask spread from the serial covariance of
//! mid-price changes:
//!
//! ```text
//! Δp_t = p_t - p_{t-1}
//! γ₁   = Cov(Δp_t, Δp_{t-1})
//! S    = 2·sqrt(-γ₁)
//! ```
//!
//! Roll's model needs `γ₁ ≤ 0`. Real data does not always comply, so the
//! estimate uses `|γ₁|` and flags positive covariances instead of returning
//! NaN. The flag travels with the estimate and is logged.

use crate::analysis::autocovariance::{expanding_lag1, lag1_autocovariance};
use crate::analysis::book::{ensure_chronological, OrderbookSnapshot, Price, Size};
use crate::analysis::error::AnalysisError;
use crate::analysis::mid_price::simple_mid;
use crate::analysis::time_buckets::{round_to, Nanos};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimum number of price differences for a lag-1 autocovariance.
pub const MIN_DIFFERENCES: usize = 2;

/// Spread implied by a lag-1 autocovariance.
#[inline]
pub fn roll_spread(gamma_1: f64) -> f64 {
    2.0 * gamma_1.abs().sqrt()
}

/// First differences `p[t] - p[t-1]`.
pub fn price_differences(prices: &[Price]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Overall Roll estimate for a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollEstimate {
    pub gamma_1: f64,
    pub spread: f64,
    /// γ₁ was positive, outside the model's assumptions.
    pub positive_covariance: bool,
    /// Number of price differences behind the estimate.
    pub differences: usize,
}

/// One row of the theoretical vs observed spread comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadRow {
    pub time: Nanos,
    pub bid_size: Size,
    pub bid: Price,
    pub ask: Price,
    pub ask_size: Size,
    pub mid_price: Price,
    pub real_spread: Price,
    /// Expanding-window estimate; `None` for the first two rows.
    pub theoretical_spread: Option<Price>,
    /// `real_spread - theoretical_spread`.
    pub spread_diff: Option<Price>,
    pub theoretical_bid: Price,
    pub theoretical_ask: Price,
}

/// The `spread_definition` table plus the estimate behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadDefinition {
    pub estimate: RollEstimate,
    /// Running estimates computed from a positive γ₁.
    pub positive_running_estimates: usize,
    pub rows: Vec<SpreadRow>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RollSpreadEstimator {
    overall_decimals: Option<u32>,
}

impl RollSpreadEstimator {
    pub fn new(overall_decimals: Option<u32>) -> Self {
        Self { overall_decimals }
    }

    /// Roll estimate over the whole difference series.
    pub fn estimate(&self, differences: &[f64]) -> Result<RollEstimate, AnalysisError> {
        let gamma_1 =
            lag1_autocovariance(differences).ok_or(AnalysisError::InsufficientHistory {
                what: "lag-1 autocovariance",
                required: MIN_DIFFERENCES,
                available: differences.len(),
            })?;

        let spread = roll_spread(gamma_1);
        let spread = match self.overall_decimals {
            Some(decimals) => round_to(spread, decimals),
            None => spread,
        };

        let positive_covariance = gamma_1 > 0.0;
        if positive_covariance {
            warn!(
                "Positive lag-1 autocovariance {:.6e}: Roll spread uses |γ₁|",
                gamma_1
            );
        }

        Ok(RollEstimate {
            gamma_1,
            spread,
            positive_covariance,
            differences: differences.len(),
        })
    }

    /// Expanding-window spread series aligned with the price series.
    ///
    /// Entry `t` uses the differences up to price `t`; entries 0 and 1 are
    /// `None`. Also returns how many defined entries came from a positive γ₁.
    pub fn running_spreads(&self, differences: &[f64]) -> (Vec<Option<Price>>, usize) {
        let mut positives = 0;
        let running = std::iter::once(None)
            .chain(expanding_lag1(differences))
            .map(|gamma| {
                gamma.map(|g| {
                    if g > 0.0 {
                        positives += 1;
                    }
                    roll_spread(g)
                })
            })
            .collect();
        (running, positives)
    }

    /// Build the `spread_definition` table from chronologically ordered books.
    pub fn spread_definition(
        &self,
        snapshots: &[OrderbookSnapshot],
    ) -> Result<SpreadDefinition, AnalysisError> {
        ensure_chronological(snapshots)?;

        let mids: Vec<Price> = snapshots.iter().map(|s| simple_mid(s.top())).collect();
        let differences = price_differences(&mids);
        let estimate = self.estimate(&differences)?;
        let (running, positive_running_estimates) = self.running_spreads(&differences);

        if positive_running_estimates > 0 {
            debug!(
                "{} of {} running estimates had positive γ₁",
                positive_running_estimates,
                running.iter().flatten().count()
            );
        }

        let rows = snapshots
            .iter()
            .zip(mids.iter())
            .zip(running.iter())
            .map(|((snapshot, &mid_price), &theoretical_spread)| {
                let top = snapshot.top();
                let real_spread = top.spread();
                SpreadRow {
                    time: snapshot.timestamp,
                    bid_size: top.bid_size,
                    bid: top.bid,
                    ask: top.ask,
                    ask_size: top.ask_size,
                    mid_price,
                    real_spread,
                    theoretical_spread,
                    spread_diff: theoretical_spread.map(|s| real_spread - s),
                    theoretical_bid: mid_price - estimate.spread,
                    theoretical_ask: mid_price + estimate.spread,
                }
            })
            .collect();

        Ok(SpreadDefinition {
            estimate,
            positive_running_estimates,
            rows,
        })
    }
}
