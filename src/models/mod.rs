use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traded pair identifier as the exchange spells it (e.g. `KRW-BTC`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketSymbol(String);

impl MarketSymbol {
    /// Returns `None` for blank input
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into().trim().to_uppercase();
        if code.is_empty() {
            None
        } else {
            Some(Self(code))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base asset of the pair, e.g. `BTC` for `KRW-BTC`
    pub fn base_asset(&self) -> &str {
        self.0.rsplit('-').next().unwrap_or(&self.0)
    }

    /// Quote asset of the pair, e.g. `KRW` for `KRW-BTC`
    pub fn quote_asset(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for MarketSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Daily change direction reported by the ticker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeDirection {
    Rise,
    Even,
    Fall,
}

/// Aggressor side of an executed trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Ask,
    Bid,
}

/// Single price level of the order book
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Executed trade as kept on the tape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeTick {
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

/// Display fields derived from the latest ticker event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerSnapshot {
    pub price: f64,
    pub percent_change: f64,
    pub direction: ChangeDirection,
    pub high: f64,
    pub low: f64,
    pub volume_24h: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeLogKind {
    System,
    Buy,
    ProfitSell,
    LossSell,
}

/// Line of the append-only trade log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub kind: TradeLogKind,
}

impl TradeLogEntry {
    pub fn new(message: impl Into<String>, kind: TradeLogKind) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        let symbol = MarketSymbol::new(" krw-btc ").unwrap();

        assert_eq!(symbol.as_str(), "KRW-BTC");
        assert_eq!(symbol.base_asset(), "BTC");
        assert_eq!(symbol.quote_asset(), "KRW");
    }

    #[test]
    fn test_blank_symbol_rejected() {
        assert!(MarketSymbol::new("   ").is_none());
    }

    #[test]
    fn test_trade_side_wire_format() {
        let side: TradeSide = serde_json::from_str("\"BID\"").unwrap();
        assert_eq!(side, TradeSide::Bid);

        let direction: ChangeDirection = serde_json::from_str("\"FALL\"").unwrap();
        assert_eq!(direction, ChangeDirection::Fall);
    }
}
