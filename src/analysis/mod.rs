//! Microstructure Analysis
//!
//! Empirical tests of the APT martingale hypothesis and the Roll (1984)
//! spread model over captured crypto order books and public trades.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     OrderbookRepository                         │
//! │  (exchange -> timestamp -> levels, null books dropped, sorted)  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//!                       ┌─────────────────┐
//!                       │  MidPriceEngine │
//!                       │ simple / A / B  │
//!                       └────────┬────────┘
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!      ┌─────────────────────┐       ┌─────────────────────┐
//!      │ MartingaleExperiment│       │ RollSpreadEstimator │
//!      │ all-orders / TOB    │       │ γ₁ -> 2·sqrt(|γ₁|)  │
//!      └─────────────────────┘       └──────────┬──────────┘
//!                                               │
//!   trade tape ──▶ TradeProbabilityTracker ─────┤
//!                                               ▼
//!                                        ResultBundle
//! ```
//!
//! # Ordering Guarantees
//!
//! - Snapshots are sorted by timestamp before any comparison.
//! - Adjacency comparisons inside a bucket are strictly sequential.
//! - Exchanges are independent; the bundle is keyed by exchange name.

pub mod autocovariance;
pub mod book;
pub mod config;
pub mod error;
pub mod martingale;
pub mod mid_price;
pub mod pipeline;
pub mod repository;
pub mod roll;
pub mod summary;
pub mod time_buckets;
pub mod trade_probability;
pub mod trades;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod roll_tests;

pub use autocovariance::{expanding_lag1, lag1_autocovariance, Lag1Accumulator};
pub use book::{BookLevel, OrderbookSnapshot, Price, Size};
pub use config::{AnalysisConfig, DegeneratePolicy, ShortTapePolicy};
pub use error::AnalysisError;
pub use martingale::{
    AllOrdersResult, ExperimentBucket, ExperimentTable, MartingaleExperiment, TopOfBookResult,
};
pub use mid_price::{MidPriceEngine, MidPriceRow, TopOfBookPrices};
pub use pipeline::{AnalysisPipeline, ExchangeReport, ResultBundle, RollResults};
pub use repository::{load_trade_tape, OrderbookRepository};
pub use roll::{RollEstimate, RollSpreadEstimator, SpreadDefinition, SpreadRow};
pub use summary::{
    DatasetDescription, ExperimentSummary, ProbabilitySummary, SpreadSummary,
    TradeTapeDescription,
};
pub use time_buckets::{BucketGranularity, Nanos};
pub use trade_probability::{ProbabilityRow, TradeProbabilityTracker};
pub use trades::{Side, TradeRecord};
