// Exchange stream wire format
// Outbound: a JSON array of a ticket clause plus one clause per channel
// Inbound: JSON objects discriminated by their `type` field

use crate::feed::error::{FeedError, FeedResult};
use crate::models::{BookLevel, ChangeDirection, MarketSymbol, TradeSide, TradeTick};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stream channels a session subscribes to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ticker,
    Orderbook,
    Trade,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Ticker, Channel::Orderbook, Channel::Trade];
}

/// One element of the subscription request array
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SubscriptionClause {
    Ticket {
        ticket: String,
    },
    Channel {
        #[serde(rename = "type")]
        channel: Channel,
        codes: Vec<String>,
    },
}

/// Build the subscription clauses for a symbol
pub fn subscription_request(ticket: &str, symbol: &MarketSymbol) -> Vec<SubscriptionClause> {
    let mut clauses = vec![SubscriptionClause::Ticket {
        ticket: ticket.to_string(),
    }];
    clauses.extend(Channel::ALL.iter().map(|channel| SubscriptionClause::Channel {
        channel: *channel,
        codes: vec![symbol.as_str().to_string()],
    }));
    clauses
}

/// Serialize the subscription request sent right after the socket opens
pub fn encode_subscription(ticket: &str, symbol: &MarketSymbol) -> FeedResult<String> {
    Ok(serde_json::to_string(&subscription_request(ticket, symbol))?)
}

/// Ticker summary event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerPayload {
    #[serde(default)]
    pub code: String,
    pub trade_price: f64,
    pub signed_change_rate: f64,
    pub change: ChangeDirection,
    pub high_price: f64,
    pub low_price: f64,
    pub acc_trade_volume_24h: f64,
}

/// One row of the order book event; each row carries an ask and a bid level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrderBookUnit {
    pub ask_price: f64,
    pub bid_price: f64,
    pub ask_size: f64,
    pub bid_size: f64,
}

/// Order book event
///
/// Units are ordered from the spread outwards: ask prices ascend, bid
/// prices descend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBookPayload {
    #[serde(default)]
    pub code: String,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    pub orderbook_units: Vec<OrderBookUnit>,
}

impl OrderBookPayload {
    pub fn ask_levels(&self) -> Vec<BookLevel> {
        self.orderbook_units
            .iter()
            .map(|u| BookLevel {
                price: u.ask_price,
                size: u.ask_size,
            })
            .collect()
    }

    pub fn bid_levels(&self) -> Vec<BookLevel> {
        self.orderbook_units
            .iter()
            .map(|u| BookLevel {
                price: u.bid_price,
                size: u.bid_size,
            })
            .collect()
    }
}

/// Single execution event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradePayload {
    #[serde(default)]
    pub code: String,
    pub trade_price: f64,
    pub trade_volume: f64,
    pub ask_bid: TradeSide,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl TradePayload {
    pub fn to_tick(&self) -> FeedResult<TradeTick> {
        let timestamp = DateTime::from_timestamp_millis(self.timestamp).ok_or_else(|| {
            FeedError::Malformed(format!("trade timestamp out of range: {}", self.timestamp))
        })?;

        Ok(TradeTick {
            price: self.trade_price,
            size: self.trade_volume,
            side: self.ask_bid,
            timestamp,
        })
    }
}

/// Decoded market data event
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Ticker(TickerPayload),
    OrderBook(OrderBookPayload),
    Trade(TradePayload),
}

impl FeedEvent {
    pub fn channel(&self) -> Channel {
        match self {
            FeedEvent::Ticker(_) => Channel::Ticker,
            FeedEvent::OrderBook(_) => Channel::Orderbook,
            FeedEvent::Trade(_) => Channel::Trade,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            FeedEvent::Ticker(p) => &p.code,
            FeedEvent::OrderBook(p) => &p.code,
            FeedEvent::Trade(p) => &p.code,
        }
    }
}

/// Decode an inbound frame
///
/// Returns `Ok(None)` for frames whose `type` is missing or not one of the
/// subscribed channels, and an error when a known type fails to parse
pub fn decode_event(text: &str) -> FeedResult<Option<FeedEvent>> {
    let value: Value = serde_json::from_str(text)?;

    let channel = match value.get("type").and_then(Value::as_str) {
        Some("ticker") => Channel::Ticker,
        Some("orderbook") => Channel::Orderbook,
        Some("trade") => Channel::Trade,
        _ => return Ok(None),
    };

    let event = match channel {
        Channel::Ticker => FeedEvent::Ticker(serde_json::from_value(value)?),
        Channel::Orderbook => FeedEvent::OrderBook(serde_json::from_value(value)?),
        Channel::Trade => FeedEvent::Trade(serde_json::from_value(value)?),
    };

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_request_format() {
        let symbol = MarketSymbol::new("KRW-BTC").unwrap();
        let encoded = encode_subscription("ticket-1", &symbol).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(
            value,
            json!([
                {"ticket": "ticket-1"},
                {"type": "ticker", "codes": ["KRW-BTC"]},
                {"type": "orderbook", "codes": ["KRW-BTC"]},
                {"type": "trade", "codes": ["KRW-BTC"]},
            ])
        );
    }

    #[test]
    fn test_decode_ticker() {
        let raw = r#"{
            "type": "ticker",
            "code": "KRW-BTC",
            "trade_price": 95000000.0,
            "signed_change_rate": -0.0123,
            "change": "FALL",
            "high_price": 97000000.0,
            "low_price": 94000000.0,
            "acc_trade_volume_24h": 3210.5,
            "stream_type": "REALTIME"
        }"#;

        let event = decode_event(raw).unwrap().unwrap();
        assert_eq!(event.channel(), Channel::Ticker);
        assert_eq!(event.code(), "KRW-BTC");

        if let FeedEvent::Ticker(ticker) = event {
            assert_eq!(ticker.trade_price, 95_000_000.0);
            assert_eq!(ticker.change, ChangeDirection::Fall);
        } else {
            panic!("Expected ticker event");
        }
    }

    #[test]
    fn test_decode_orderbook_levels() {
        let raw = json!({
            "type": "orderbook",
            "code": "KRW-BTC",
            "total_ask_size": 12.0,
            "total_bid_size": 8.0,
            "orderbook_units": [
                {"ask_price": 101.0, "bid_price": 99.0, "ask_size": 1.0, "bid_size": 2.0},
                {"ask_price": 102.0, "bid_price": 98.0, "ask_size": 3.0, "bid_size": 4.0}
            ]
        })
        .to_string();

        let event = decode_event(&raw).unwrap().unwrap();
        let FeedEvent::OrderBook(book) = event else {
            panic!("Expected orderbook event");
        };

        let asks = book.ask_levels();
        let bids = book.bid_levels();
        assert_eq!(asks[1], BookLevel { price: 102.0, size: 3.0 });
        assert_eq!(bids[0], BookLevel { price: 99.0, size: 2.0 });
    }

    #[test]
    fn test_decode_trade_tick() {
        let raw = r#"{"type":"trade","code":"KRW-BTC","trade_price":100.5,
            "trade_volume":0.25,"ask_bid":"ASK","timestamp":1700000000000}"#;

        let event = decode_event(raw).unwrap().unwrap();
        let FeedEvent::Trade(trade) = event else {
            panic!("Expected trade event");
        };

        let tick = trade.to_tick().unwrap();
        assert_eq!(tick.side, TradeSide::Ask);
        assert_eq!(tick.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_unknown_type_ignored() {
        assert!(decode_event(r#"{"type":"candle","code":"KRW-BTC"}"#)
            .unwrap()
            .is_none());
        assert!(decode_event(r#"{"status":"UP"}"#).unwrap().is_none());
    }

    #[test]
    fn test_malformed_known_type_is_error() {
        let result = decode_event(r#"{"type":"ticker","trade_price":"abc"}"#);
        assert!(matches!(result, Err(FeedError::Json(_))));

        let result = decode_event("not json");
        assert!(result.is_err());
    }
}
