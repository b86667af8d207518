use super::{OrderBookSnapshot, PriceWindow, TradeTape};
use crate::feed::{FeedError, FeedResult, OrderBookPayload, TickerPayload, TradePayload};
use crate::models::TickerSnapshot;

/// Normalizes raw stream events into bounded, ordered snapshots
///
/// Every handler validates first and mutates second, so a rejected event
/// leaves all windows untouched.
#[derive(Debug, Clone, Default)]
pub struct MarketDataAggregator {
    window: PriceWindow,
    tape: TradeTape,
    order_book: Option<OrderBookSnapshot>,
    ticker: Option<TickerSnapshot>,
}

impl MarketDataAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ticker update and derive its display snapshot
    pub fn on_ticker(&mut self, payload: &TickerPayload) -> FeedResult<TickerSnapshot> {
        ensure_price("trade_price", payload.trade_price)?;
        ensure_finite("signed_change_rate", payload.signed_change_rate)?;
        ensure_non_negative("high_price", payload.high_price)?;
        ensure_non_negative("low_price", payload.low_price)?;
        ensure_non_negative("acc_trade_volume_24h", payload.acc_trade_volume_24h)?;

        self.window.push(payload.trade_price);

        let snapshot = TickerSnapshot {
            price: payload.trade_price,
            percent_change: payload.signed_change_rate * 100.0,
            direction: payload.change,
            high: payload.high_price,
            low: payload.low_price,
            volume_24h: payload.acc_trade_volume_24h,
        };
        self.ticker = Some(snapshot.clone());

        Ok(snapshot)
    }

    /// Rebuild the order book snapshot
    pub fn on_order_book(&mut self, payload: &OrderBookPayload) -> FeedResult<&OrderBookSnapshot> {
        ensure_non_negative("total_ask_size", payload.total_ask_size)?;
        ensure_non_negative("total_bid_size", payload.total_bid_size)?;
        for unit in &payload.orderbook_units {
            ensure_non_negative("ask_price", unit.ask_price)?;
            ensure_non_negative("bid_price", unit.bid_price)?;
            ensure_non_negative("ask_size", unit.ask_size)?;
            ensure_non_negative("bid_size", unit.bid_size)?;
        }

        let snapshot = OrderBookSnapshot::from_levels(
            &payload.ask_levels(),
            &payload.bid_levels(),
            payload.total_ask_size,
            payload.total_bid_size,
        );

        Ok(&*self.order_book.insert(snapshot))
    }

    /// Prepend an execution to the trade tape
    pub fn on_trade(&mut self, payload: &TradePayload) -> FeedResult<&TradeTape> {
        ensure_price("trade_price", payload.trade_price)?;
        ensure_non_negative("trade_volume", payload.trade_volume)?;
        let tick = payload.to_tick()?;

        self.tape.record(tick);

        Ok(&self.tape)
    }

    /// Drop everything collected for the previous symbol
    pub fn reset(&mut self) {
        self.window.clear();
        self.tape.clear();
        self.order_book = None;
        self.ticker = None;
    }

    pub fn price_window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn trade_tape(&self) -> &TradeTape {
        &self.tape
    }

    pub fn order_book(&self) -> Option<&OrderBookSnapshot> {
        self.order_book.as_ref()
    }

    pub fn ticker(&self) -> Option<&TickerSnapshot> {
        self.ticker.as_ref()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.window.latest()
    }
}

fn ensure_finite(field: &str, value: f64) -> FeedResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FeedError::Malformed(format!("{} is not finite", field)))
    }
}

fn ensure_non_negative(field: &str, value: f64) -> FeedResult<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(FeedError::Malformed(format!("{} is negative: {}", field, value)));
    }
    Ok(())
}

fn ensure_price(field: &str, value: f64) -> FeedResult<()> {
    ensure_finite(field, value)?;
    if value <= 0.0 {
        return Err(FeedError::Malformed(format!("{} must be positive: {}", field, value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::OrderBookUnit;
    use crate::models::{ChangeDirection, TradeSide};

    fn ticker(price: f64) -> TickerPayload {
        TickerPayload {
            code: "KRW-BTC".to_string(),
            trade_price: price,
            signed_change_rate: 0.0125,
            change: ChangeDirection::Rise,
            high_price: price * 1.1,
            low_price: price * 0.9,
            acc_trade_volume_24h: 1234.5,
        }
    }

    fn trade(price: f64, timestamp: i64) -> TradePayload {
        TradePayload {
            code: "KRW-BTC".to_string(),
            trade_price: price,
            trade_volume: 0.1,
            ask_bid: TradeSide::Bid,
            timestamp,
        }
    }

    #[test]
    fn test_on_ticker_snapshot() {
        let mut aggregator = MarketDataAggregator::new();
        let snapshot = aggregator.on_ticker(&ticker(100.0)).unwrap();

        assert_eq!(snapshot.price, 100.0);
        assert!((snapshot.percent_change - 1.25).abs() < 1e-9);
        assert_eq!(snapshot.direction, ChangeDirection::Rise);
        assert_eq!(aggregator.last_price(), Some(100.0));
        assert_eq!(aggregator.ticker(), Some(&snapshot));
    }

    #[test]
    fn test_price_window_bounded() {
        let mut aggregator = MarketDataAggregator::new();
        for i in 0..20 {
            aggregator.on_ticker(&ticker(100.0 + i as f64)).unwrap();
        }

        assert_eq!(aggregator.price_window().len(), 14);
        assert_eq!(aggregator.price_window().prices()[0], 106.0);
    }

    #[test]
    fn test_rejected_ticker_leaves_state() {
        let mut aggregator = MarketDataAggregator::new();
        aggregator.on_ticker(&ticker(100.0)).unwrap();

        let result = aggregator.on_ticker(&ticker(-5.0));
        assert!(matches!(result, Err(FeedError::Malformed(_))));

        let result = aggregator.on_ticker(&ticker(f64::NAN));
        assert!(result.is_err());

        assert_eq!(aggregator.price_window().prices(), vec![100.0]);
        assert_eq!(aggregator.ticker().unwrap().price, 100.0);
    }

    #[test]
    fn test_on_order_book() {
        let mut aggregator = MarketDataAggregator::new();
        let units: Vec<OrderBookUnit> = (1..=10)
            .map(|i| OrderBookUnit {
                ask_price: 100.0 + i as f64,
                bid_price: 100.0 - i as f64,
                ask_size: 1.0,
                bid_size: 2.0,
            })
            .collect();
        let payload = OrderBookPayload {
            code: "KRW-BTC".to_string(),
            total_ask_size: 10.0,
            total_bid_size: 20.0,
            orderbook_units: units,
        };

        let book = aggregator.on_order_book(&payload).unwrap();
        assert_eq!(book.asks.len(), 8);
        assert_eq!(book.asks[0].price, 110.0);
        assert_eq!(book.bids[0].price, 99.0);
        // 1 / 10 * 500 = 50%
        assert!((book.asks[0].bar_width - 50.0).abs() < 1e-9);
        assert!((book.bid_ratio() - 66.666_666_666).abs() < 1e-6);
    }

    #[test]
    fn test_on_trade_tape() {
        let mut aggregator = MarketDataAggregator::new();
        for i in 0..35 {
            aggregator
                .on_trade(&trade(100.0 + i as f64, 1_700_000_000_000 + i))
                .unwrap();
        }

        let tape = aggregator.trade_tape();
        assert_eq!(tape.len(), 30);
        assert_eq!(tape.newest().unwrap().price, 134.0);
    }

    #[test]
    fn test_reset_clears_windows() {
        let mut aggregator = MarketDataAggregator::new();
        aggregator.on_ticker(&ticker(100.0)).unwrap();
        aggregator.on_trade(&trade(100.0, 1_700_000_000_000)).unwrap();

        aggregator.reset();

        assert!(aggregator.price_window().is_empty());
        assert!(aggregator.trade_tape().is_empty());
        assert!(aggregator.ticker().is_none());
        assert!(aggregator.order_book().is_none());
    }
}
