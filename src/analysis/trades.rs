//! Public trade tape model.

use crate::analysis::book::{Price, Size};
use crate::analysis::error::AnalysisError;
use crate::analysis::time_buckets::Nanos;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Aggressor side of a public trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl FromStr for Side {
    type Err = AnalysisError;

    /// Case-sensitive: only `buy` and `sell` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(AnalysisError::malformed(
                "trade side",
                format!("expected 'buy' or 'sell', got '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One public trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: Nanos,
    pub price: Price,
    pub amount: Size,
    pub side: Side,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_is_case_sensitive() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("SELL".parse::<Side>().is_err());
        assert!("Buy".parse::<Side>().is_err());
    }
}
