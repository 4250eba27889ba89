//! Orderbook Repository
//!
//! Loads captured order books and the public trade tape.
//!
//! # Orderbook file layout
//!
//! ```text
//! {
//!   "bitfinex": {
//!     "2021-07-05T13:06:46.571Z": { "bid_size": [..], "bid": [..], "ask": [..], "ask_size": [..] },
//!     "2021-07-05T13:06:47.109Z": null,
//!     ...
//!   },
//!   "kraken": { ... }
//! }
//! ```
//!
//! Each snapshot payload may be column-oriented (arrays), column-oriented
//! with index maps (`{"bid": {"0": .., "1": ..}}`) or row-oriented (an array
//! of level objects). Extra columns are ignored; `null` payloads are dropped.
//! Snapshots are stably sorted by timestamp before being handed out.

use crate::analysis::book::{BookLevel, OrderbookSnapshot};
use crate::analysis::error::AnalysisError;
use crate::analysis::time_buckets::{format_nanos, parse_timestamp};
use crate::analysis::trades::{Side, TradeRecord};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Column names every snapshot must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["bid_size", "bid", "ask", "ask_size"];

/// Per-exchange, timestamp-ordered snapshot collections.
#[derive(Debug, Clone, Default)]
pub struct OrderbookRepository {
    exchanges: BTreeMap<String, Vec<OrderbookSnapshot>>,
}

impl OrderbookRepository {
    /// Read and parse an orderbook file.
    pub fn load(path: impl AsRef<Path>, reject_crossed: bool) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::io(path.display().to_string(), e))?;
        info!("Loading order books from {}", path.display());
        Self::from_json_str(&contents, reject_crossed)
    }

    /// Parse the nested `exchange -> timestamp -> snapshot` JSON document.
    pub fn from_json_str(json: &str, reject_crossed: bool) -> Result<Self, AnalysisError> {
        let raw: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(json)?;
        let mut exchanges = BTreeMap::new();

        for (exchange, books) in raw {
            let total = books.len();
            let mut snapshots = books
                .into_iter()
                .filter(|(_, payload)| !payload.is_null())
                .map(|(key, payload)| parse_snapshot(&exchange, &key, payload, reject_crossed))
                .collect::<Result<Vec<_>, _>>()?;

            // Stable, so snapshots sharing a timestamp keep key order.
            snapshots.sort_by_key(|s| s.timestamp);

            let dropped = total - snapshots.len();
            if dropped > 0 {
                debug!("{}: dropped {} null snapshots", exchange, dropped);
            }
            info!("{}: loaded {} snapshots", exchange, snapshots.len());
            exchanges.insert(exchange, snapshots);
        }

        Ok(Self { exchanges })
    }

    /// Build a repository from already-parsed snapshots (sorted on insert).
    pub fn from_snapshots(
        exchanges: impl IntoIterator<Item = (String, Vec<OrderbookSnapshot>)>,
    ) -> Self {
        let exchanges = exchanges
            .into_iter()
            .map(|(name, mut snapshots)| {
                snapshots.sort_by_key(|s| s.timestamp);
                (name, snapshots)
            })
            .collect();
        Self { exchanges }
    }

    /// Exchange names in lexical order.
    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.exchanges.keys().map(String::as_str)
    }

    pub fn snapshots(&self, exchange: &str) -> Option<&[OrderbookSnapshot]> {
        self.exchanges.get(exchange).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[OrderbookSnapshot])> {
        self.exchanges
            .iter()
            .map(|(name, snaps)| (name.as_str(), snaps.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

/// Index-keyed column as written by pandas (`{"0": v0, "1": v1, ...}`).
type IndexedColumn = BTreeMap<String, Option<f64>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumn {
    List(Vec<Option<f64>>),
    Indexed(IndexedColumn),
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    bid_size: f64,
    bid: f64,
    ask: f64,
    ask_size: f64,
}

fn parse_snapshot(
    exchange: &str,
    key: &str,
    payload: Value,
    reject_crossed: bool,
) -> Result<OrderbookSnapshot, AnalysisError> {
    let context = format!("{}/{}", exchange, key);
    let timestamp = parse_timestamp(key).map_err(|e| AnalysisError::malformed(&context, e.to_string()))?;

    let levels = match payload {
        Value::Object(mut columns) => {
            let mut parsed = Vec::with_capacity(REQUIRED_COLUMNS.len());
            for name in REQUIRED_COLUMNS {
                let column = columns
                    .remove(name)
                    .ok_or_else(|| AnalysisError::malformed(&context, format!("missing column '{}'", name)))?;
                parsed.push(parse_column(&context, name, column)?);
            }
            zip_columns(&context, parsed)?
        }
        Value::Array(_) => {
            let rows: Vec<RawLevel> = serde_json::from_value(payload)
                .map_err(|e| AnalysisError::malformed(&context, e.to_string()))?;
            rows.into_iter()
                .map(|r| BookLevel::new(r.bid_size, r.bid, r.ask, r.ask_size))
                .collect()
        }
        other => {
            return Err(AnalysisError::malformed(
                &context,
                format!("expected an object or array, got {}", value_kind(&other)),
            ))
        }
    };

    OrderbookSnapshot::new(timestamp, levels, reject_crossed)
}

fn parse_column(context: &str, name: &str, column: Value) -> Result<Vec<f64>, AnalysisError> {
    let raw: RawColumn = serde_json::from_value(column).map_err(|_| {
        AnalysisError::malformed(context, format!("column '{}' is not a list of numbers", name))
    })?;

    let values: Vec<Option<f64>> = match raw {
        RawColumn::List(values) => values,
        RawColumn::Indexed(map) => {
            let mut indexed = map
                .into_iter()
                .map(|(idx, v)| {
                    idx.parse::<usize>().map(|i| (i, v)).map_err(|_| {
                        AnalysisError::malformed(
                            context,
                            format!("column '{}' has non-numeric index '{}'", name, idx),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            indexed.sort_by_key(|(i, _)| *i);
            indexed.into_iter().map(|(_, v)| v).collect()
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                AnalysisError::malformed(context, format!("column '{}' has a null at row {}", name, i))
            })
        })
        .collect()
}

fn zip_columns(context: &str, columns: Vec<Vec<f64>>) -> Result<Vec<BookLevel>, AnalysisError> {
    let depth = columns[0].len();
    if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != depth) {
        return Err(AnalysisError::malformed(
            context,
            format!(
                "column '{}' has {} rows, expected {}",
                REQUIRED_COLUMNS[i],
                col.len(),
                depth
            ),
        ));
    }

    Ok((0..depth)
        .map(|i| BookLevel::new(columns[0][i], columns[1][i], columns[2][i], columns[3][i]))
        .collect())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// TRADE TAPE
// =============================================================================

/// Trade row as it appears on disk. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct RawTrade {
    timestamp: String,
    price: f64,
    amount: f64,
    side: String,
}

impl RawTrade {
    fn into_record(self, row: usize) -> Result<TradeRecord, AnalysisError> {
        let context = format!("trade row {}", row);
        let timestamp =
            parse_timestamp(&self.timestamp).map_err(|e| AnalysisError::malformed(&context, e.to_string()))?;
        let side = self
            .side
            .parse::<Side>()
            .map_err(|e| AnalysisError::malformed(&context, e.to_string()))?;
        Ok(TradeRecord {
            timestamp,
            price: self.price,
            amount: self.amount,
            side,
        })
    }
}

/// Load a trade tape. `.json` files are read as an array of trade objects,
/// anything else as CSV with a `timestamp,price,amount,side` header.
///
/// Trades keep file order; the probability evolution is order-dependent.
pub fn load_trade_tape(path: impl AsRef<Path>) -> Result<Vec<TradeRecord>, AnalysisError> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let trades = if is_json {
        let contents = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(&shown, e))?;
        parse_trades_json(&contents)?
    } else {
        let file = std::fs::File::open(path).map_err(|e| AnalysisError::io(&shown, e))?;
        parse_trades_csv(file)?
    };

    if trades.is_empty() {
        warn!("Trade tape {} is empty", shown);
    } else {
        info!("Loaded {} trades from {}", trades.len(), shown);
    }
    Ok(trades)
}

pub fn parse_trades_csv<R: Read>(reader: R) -> Result<Vec<TradeRecord>, AnalysisError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    csv_reader
        .deserialize::<RawTrade>()
        .enumerate()
        .map(|(row, rec)| rec.map_err(AnalysisError::from).and_then(|r| r.into_record(row)))
        .collect()
}

pub fn parse_trades_json(json: &str) -> Result<Vec<TradeRecord>, AnalysisError> {
    let raw: Vec<RawTrade> = serde_json::from_str(json)?;
    raw.into_iter()
        .enumerate()
        .map(|(row, r)| r.into_record(row))
        .collect()
}

/// Human-readable span of a snapshot collection, for logs.
pub fn describe_span(snapshots: &[OrderbookSnapshot]) -> String {
    match (snapshots.first(), snapshots.last()) {
        (Some(first), Some(last)) => format!(
            "{} .. {}",
            format_nanos(first.timestamp),
            format_nanos(last.timestamp)
        ),
        _ => "empty".to_string(),
    }
}
