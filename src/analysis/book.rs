//! Order Book Snapshot Model
//!
//! Immutable per-timestamp limit order book snapshots. Each level is the
//! 4-tuple `(bid_size, bid, ask, ask_size)` and levels are ordered by depth,
//! best first.

use crate::analysis::error::AnalysisError;
use crate::analysis::time_buckets::{format_nanos, Nanos};
use serde::{Deserialize, Serialize};

/// Price in quote currency.
pub type Price = f64;

/// Resting size in base currency.
pub type Size = f64;

/// One depth level of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub bid_size: Size,
    pub bid: Price,
    pub ask: Price,
    pub ask_size: Size,
}

impl BookLevel {
    #[inline]
    pub fn new(bid_size: Size, bid: Price, ask: Price, ask_size: Size) -> Self {
        Self {
            bid_size,
            bid,
            ask,
            ask_size,
        }
    }

    /// Observed spread at this level.
    #[inline]
    pub fn spread(&self) -> Price {
        self.ask - self.bid
    }

    /// Combined resting size at this level.
    #[inline]
    pub fn total_size(&self) -> Size {
        self.bid_size + self.ask_size
    }
}

/// A single order book observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderbookSnapshot {
    pub timestamp: Nanos,
    levels: Vec<BookLevel>,
}

impl OrderbookSnapshot {
    /// Build a snapshot, checking the level invariants.
    ///
    /// Prices and sizes must be finite, sizes non-negative, and there must be
    /// at least one level. With `reject_crossed` set, `bid > ask` at any
    /// level is also rejected.
    pub fn new(
        timestamp: Nanos,
        levels: Vec<BookLevel>,
        reject_crossed: bool,
    ) -> Result<Self, AnalysisError> {
        let context = format!("snapshot {}", format_nanos(timestamp));

        if levels.is_empty() {
            return Err(AnalysisError::malformed(context, "snapshot has no levels"));
        }

        for (i, level) in levels.iter().enumerate() {
            let values = [level.bid_size, level.bid, level.ask, level.ask_size];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(AnalysisError::malformed(
                    context,
                    format!("level {} has a non-finite value", i),
                ));
            }
            if level.bid_size < 0.0 || level.ask_size < 0.0 {
                return Err(AnalysisError::malformed(
                    context,
                    format!("level {} has a negative size", i),
                ));
            }
            if reject_crossed && level.bid > level.ask {
                return Err(AnalysisError::malformed(
                    context,
                    format!("level {} is crossed: bid {} > ask {}", i, level.bid, level.ask),
                ));
            }
        }

        Ok(Self { timestamp, levels })
    }

    #[inline]
    pub fn levels(&self) -> &[BookLevel] {
        &self.levels
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Best level. Always present by construction.
    #[inline]
    pub fn top(&self) -> &BookLevel {
        &self.levels[0]
    }

    /// Sum of bid sizes across the visible depth.
    pub fn total_bid_size(&self) -> Size {
        self.levels.iter().map(|l| l.bid_size).sum()
    }

    /// Sum of bid and ask sizes across the visible depth.
    pub fn total_size(&self) -> Size {
        self.levels.iter().map(BookLevel::total_size).sum()
    }
}

/// Reject a snapshot collection that is not in non-decreasing time order.
pub fn ensure_chronological(snapshots: &[OrderbookSnapshot]) -> Result<(), AnalysisError> {
    match snapshots
        .windows(2)
        .position(|w| w[1].timestamp < w[0].timestamp)
    {
        Some(i) => Err(AnalysisError::malformed(
            "snapshots",
            format!("snapshot {} is earlier than its predecessor", i + 1),
        )),
        None => Ok(()),
    }
}
