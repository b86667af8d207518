use crate::models::TradeTick;
use std::collections::VecDeque;

/// Capacity of the trade tape
pub const TRADE_TAPE_CAPACITY: usize = 30;

/// Recent executions, newest first
#[derive(Debug, Clone)]
pub struct TradeTape {
    trades: VecDeque<TradeTick>,
    capacity: usize,
}

impl Default for TradeTape {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeTape {
    pub fn new() -> Self {
        Self {
            trades: VecDeque::with_capacity(TRADE_TAPE_CAPACITY + 1),
            capacity: TRADE_TAPE_CAPACITY,
        }
    }

    /// Prepend a trade, evicting the oldest beyond capacity
    pub fn record(&mut self, trade: TradeTick) {
        self.trades.push_front(trade);
        self.trades.truncate(self.capacity);
    }

    /// Trades in presentation order (newest first)
    pub fn trades(&self) -> Vec<TradeTick> {
        self.trades.iter().cloned().collect()
    }

    pub fn newest(&self) -> Option<&TradeTick> {
        self.trades.front()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }
}
