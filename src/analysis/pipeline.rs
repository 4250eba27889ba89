//! Analysis pipeline and result bundle.
//!
//! Per exchange: order books → mid-prices → {martingale tables, Roll spread};
//! the trade tape → side probability evolution, shared by every exchange's
//! Roll bundle. Exchanges are independent and run in parallel.
//!
//! # Output keys
//!
//! ```text
//! <exchange>
//! ├── apt_all   { simple_mid_price, weighted_mid_price }
//! ├── apt_tob   { simple_mid_price, weighted_mid_price_a, weighted_mid_price_b }
//! └── roll      { spread_definition, prob_evolution }
//! ```

use crate::analysis::book::OrderbookSnapshot;
use crate::analysis::config::AnalysisConfig;
use crate::analysis::error::AnalysisError;
use crate::analysis::martingale::{AllOrdersResult, MartingaleExperiment, TopOfBookResult};
use crate::analysis::mid_price::MidPriceEngine;
use crate::analysis::repository::{describe_span, OrderbookRepository};
use crate::analysis::roll::{RollSpreadEstimator, SpreadDefinition};
use crate::analysis::trade_probability::{ProbabilityRow, TradeProbabilityTracker};
use crate::analysis::trades::TradeRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::info;

/// Roll model outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollResults {
    pub spread_definition: SpreadDefinition,
    /// Empty when no trade tape was supplied.
    pub prob_evolution: Vec<ProbabilityRow>,
}

/// Everything computed for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub apt_all: AllOrdersResult,
    pub apt_tob: TopOfBookResult,
    pub roll: RollResults,
}

/// Reports keyed by exchange name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBundle {
    pub exchanges: BTreeMap<String, ExchangeReport>,
}

impl ResultBundle {
    pub fn get(&self, exchange: &str) -> Option<&ExchangeReport> {
        self.exchanges.get(exchange)
    }

    /// Pretty JSON export for the charting collaborator.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), AnalysisError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisPipeline {
    martingale: MartingaleExperiment,
    roll: RollSpreadEstimator,
    tracker: TradeProbabilityTracker,
}

impl AnalysisPipeline {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let engine = MidPriceEngine::new(config.degenerate_policy);
        Ok(Self {
            martingale: MartingaleExperiment::new(
                config.granularity()?,
                engine,
                config.emit_empty_bins,
            ),
            roll: RollSpreadEstimator::new(config.overall_spread_decimals),
            tracker: TradeProbabilityTracker::new(
                config.trade_sample_size,
                config.short_tape_policy,
            ),
        })
    }

    /// Side probability evolution for a tape.
    pub fn prob_evolution(&self, trades: &[TradeRecord]) -> Result<Vec<ProbabilityRow>, AnalysisError> {
        info!(
            "Side probabilities over the first {} of {} trades",
            self.tracker.sample_size().min(trades.len()),
            trades.len()
        );
        self.tracker.evolution(trades)
    }

    /// Analyse one exchange given a precomputed probability evolution.
    pub fn run_exchange(
        &self,
        exchange: &str,
        snapshots: &[OrderbookSnapshot],
        prob_evolution: &[ProbabilityRow],
    ) -> Result<ExchangeReport, AnalysisError> {
        info!(
            "{}: analysing {} books ({})",
            exchange,
            snapshots.len(),
            describe_span(snapshots)
        );

        let apt_all = self.martingale.all_orders(snapshots)?;
        let apt_tob = self.martingale.top_of_book(snapshots)?;
        let spread_definition = self.roll.spread_definition(snapshots)?;

        info!(
            "{}: {} all-orders buckets, {} top-of-book bins, roll spread {:.6}",
            exchange,
            apt_all.simple_mid_price.len(),
            apt_tob.simple_mid_price.len(),
            spread_definition.estimate.spread
        );

        Ok(ExchangeReport {
            apt_all,
            apt_tob,
            roll: RollResults {
                spread_definition,
                prob_evolution: prob_evolution.to_vec(),
            },
        })
    }

    /// Analyse the selected exchanges (all of them when `only` is empty).
    ///
    /// Fails on the first error from any exchange.
    pub fn run(
        &self,
        repository: &OrderbookRepository,
        trades: Option<&[TradeRecord]>,
        only: &[String],
    ) -> Result<ResultBundle, AnalysisError> {
        if let Some(unknown) = only
            .iter()
            .find(|name| repository.snapshots(name.as_str()).is_none())
        {
            return Err(AnalysisError::Config {
                message: format!("exchange '{}' is not in the orderbook file", unknown),
            });
        }

        let prob_evolution = match trades {
            Some(trades) => self.prob_evolution(trades)?,
            None => Vec::new(),
        };

        let selected: Vec<(&str, &[OrderbookSnapshot])> = repository
            .iter()
            .filter(|(name, _)| only.is_empty() || only.iter().any(|o| o == name))
            .collect();

        let exchanges = selected
            .par_iter()
            .map(|(name, snapshots)| {
                self.run_exchange(name, snapshots, &prob_evolution)
                    .map(|report| (name.to_string(), report))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(ResultBundle { exchanges })
    }
}
