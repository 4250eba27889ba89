//! Mid-Price Engine
//!
//! Simple and volume-weighted mid-prices for order book snapshots.
//!
//! # Formulas
//!
//! For a level with bid `b`, ask `a`, bid size `bv` and ask size `av`:
//!
//! ```text
//! simple_mid   = (b + a) / 2
//! weighted_mid = round2( bv / (bv + av) * a  +  av / (bv + av) * b )
//! ```
//!
//! The weighted mid leans toward the side with *less* resting volume, the
//! side more likely to be consumed next.
//!
//! Top-of-book mode adds two variants:
//! - **B**: `weighted_mid` of level 0.
//! - **A**: `round2(imbalance * simple_mid[0])` with
//!   `imbalance = Σbv / Σ(bv + av)` over the full visible depth.

use crate::analysis::book::{BookLevel, OrderbookSnapshot, Price};
use crate::analysis::config::DegeneratePolicy;
use crate::analysis::error::AnalysisError;
use crate::analysis::time_buckets::{round_to, Nanos};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Decimal places kept on weighted mid-prices.
pub const WEIGHTED_MID_DECIMALS: u32 = 2;

/// Per-level mid-prices of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidPriceRow {
    pub timestamp: Nanos,
    pub level: usize,
    pub simple_mid: Price,
    pub weighted_mid: Price,
}

/// Level-0 mid-prices of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopOfBookPrices {
    pub timestamp: Nanos,
    pub simple_mid: Price,
    pub weighted_mid_a: Price,
    pub weighted_mid_b: Price,
}

#[inline]
pub fn simple_mid(level: &BookLevel) -> Price {
    (level.bid + level.ask) / 2.0
}

/// Size-weighted mid of one level, rounded to two decimals.
pub fn weighted_mid(
    level: &BookLevel,
    timestamp: Nanos,
    index: usize,
) -> Result<Price, AnalysisError> {
    let total = level.total_size();
    if total == 0.0 {
        return Err(AnalysisError::DegenerateBook {
            timestamp,
            level: Some(index),
        });
    }
    let raw = (level.bid_size / total) * level.ask + (level.ask_size / total) * level.bid;
    Ok(round_to(raw, WEIGHTED_MID_DECIMALS))
}

/// Bid share of total resting volume across the visible depth.
pub fn depth_imbalance(snapshot: &OrderbookSnapshot) -> Result<f64, AnalysisError> {
    let total = snapshot.total_size();
    if total == 0.0 {
        return Err(AnalysisError::DegenerateBook {
            timestamp: snapshot.timestamp,
            level: None,
        });
    }
    Ok(snapshot.total_bid_size() / total)
}

/// Computes mid-price rows, applying the configured degenerate-book policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidPriceEngine {
    policy: DegeneratePolicy,
}

impl MidPriceEngine {
    pub fn new(policy: DegeneratePolicy) -> Self {
        Self { policy }
    }

    /// Simple and weighted mid for every level, best level first.
    ///
    /// Under `SkipLevel` a zero-volume level is left out of the result.
    pub fn level_rows(&self, snapshot: &OrderbookSnapshot) -> Result<Vec<MidPriceRow>, AnalysisError> {
        let mut rows = Vec::with_capacity(snapshot.depth());
        for (index, level) in snapshot.levels().iter().enumerate() {
            match weighted_mid(level, snapshot.timestamp, index) {
                Ok(weighted) => rows.push(MidPriceRow {
                    timestamp: snapshot.timestamp,
                    level: index,
                    simple_mid: simple_mid(level),
                    weighted_mid: weighted,
                }),
                Err(err) => self.absorb(err)?,
            }
        }
        Ok(rows)
    }

    /// Level-0 simple mid plus weighted variants A and B.
    ///
    /// Returns `Ok(None)` when the snapshot is skipped under `SkipLevel`.
    pub fn top_of_book(
        &self,
        snapshot: &OrderbookSnapshot,
    ) -> Result<Option<TopOfBookPrices>, AnalysisError> {
        let top = snapshot.top();
        let mid = simple_mid(top);

        let computed = depth_imbalance(snapshot).and_then(|imbalance| {
            let weighted_b = weighted_mid(top, snapshot.timestamp, 0)?;
            Ok(TopOfBookPrices {
                timestamp: snapshot.timestamp,
                simple_mid: mid,
                weighted_mid_a: round_to(imbalance * mid, WEIGHTED_MID_DECIMALS),
                weighted_mid_b: weighted_b,
            })
        });

        match computed {
            Ok(prices) => Ok(Some(prices)),
            Err(err) => self.absorb(err).map(|_| None),
        }
    }

    fn absorb(&self, err: AnalysisError) -> Result<(), AnalysisError> {
        match (self.policy, &err) {
            (DegeneratePolicy::SkipLevel, AnalysisError::DegenerateBook { .. }) => {
                warn!("Skipping: {}", err);
                Ok(())
            }
            _ => Err(err),
        }
    }
}
