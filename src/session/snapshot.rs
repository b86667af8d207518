use crate::execution::{Position, WalletSnapshot};
use crate::feed::ConnectionState;
use crate::indicators::NEUTRAL_RSI;
use crate::market::OrderBookSnapshot;
use crate::models::{MarketSymbol, TickerSnapshot, TradeLogEntry, TradeTick};
use serde::Serialize;

/// Read-only view of a session, republished after every processed event
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub symbol: MarketSymbol,
    pub connection: ConnectionState,
    pub armed: bool,
    pub ticker: Option<TickerSnapshot>,
    pub order_book: Option<OrderBookSnapshot>,
    /// Newest first
    pub trades: Vec<TradeTick>,
    /// Prices currently in the momentum window
    pub window_len: usize,
    pub indicator: f64,
    pub position: Position,
    pub wallet: WalletSnapshot,
    pub trade_log: Vec<TradeLogEntry>,
    pub coin_image: Option<String>,
}

impl SessionSnapshot {
    /// Snapshot of a session that has not processed anything yet
    pub fn initial(symbol: MarketSymbol, wallet: WalletSnapshot) -> Self {
        Self {
            symbol,
            connection: ConnectionState::Disconnected,
            armed: false,
            ticker: None,
            order_book: None,
            trades: Vec::new(),
            window_len: 0,
            indicator: NEUTRAL_RSI,
            position: Position::Flat,
            wallet,
            trade_log: Vec::new(),
            coin_image: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn last_price(&self) -> Option<f64> {
        self.ticker.as_ref().map(|t| t.price)
    }
}
