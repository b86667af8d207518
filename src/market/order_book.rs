use crate::models::BookLevel;
use serde::{Deserialize, Serialize};

/// Levels shown per side
pub const BOOK_DEPTH: usize = 8;

/// Multiplier applied to a level's share of its side before capping at 100%
pub const BAR_WIDTH_SCALE: f64 = 500.0;

/// One rendered order book level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BookRow {
    pub price: f64,
    pub size: f64,
    /// Bar width in percent, `min(size / side_total * 500, 100)`
    pub bar_width: f64,
}

/// Top of book for presentation
///
/// Asks run highest price first, bids run highest price first, so the
/// spread sits in the middle when asks are drawn above bids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderBookSnapshot {
    pub asks: Vec<BookRow>,
    pub bids: Vec<BookRow>,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
}

impl OrderBookSnapshot {
    /// Build the snapshot from feed-ordered levels
    ///
    /// # Arguments
    /// * `asks` - Ask levels in feed order (ascending price)
    /// * `bids` - Bid levels in feed order (descending price)
    /// * `total_ask_size` / `total_bid_size` - Whole-book totals, not just the top levels
    pub fn from_levels(
        asks: &[BookLevel],
        bids: &[BookLevel],
        total_ask_size: f64,
        total_bid_size: f64,
    ) -> Self {
        let asks = asks
            .iter()
            .rev()
            .take(BOOK_DEPTH)
            .map(|level| BookRow::new(level, total_ask_size))
            .collect();

        let bids = bids
            .iter()
            .take(BOOK_DEPTH)
            .map(|level| BookRow::new(level, total_bid_size))
            .collect();

        Self {
            asks,
            bids,
            total_ask_size,
            total_bid_size,
        }
    }

    /// Bid share of total resting size in percent
    pub fn bid_ratio(&self) -> f64 {
        self.total_bid_size / guarded(self.total_ask_size + self.total_bid_size) * 100.0
    }

    /// Ask share of total resting size in percent
    pub fn ask_ratio(&self) -> f64 {
        self.total_ask_size / guarded(self.total_ask_size + self.total_bid_size) * 100.0
    }
}

impl BookRow {
    fn new(level: &BookLevel, side_total: f64) -> Self {
        Self {
            price: level.price,
            size: level.size,
            bar_width: bar_width(level.size, side_total),
        }
    }
}

/// Width of a level's bar in percent of the row
pub fn bar_width(size: f64, side_total: f64) -> f64 {
    (size / guarded(side_total) * BAR_WIDTH_SCALE).min(100.0)
}

// Empty sides divide by 1
fn guarded(denominator: f64) -> f64 {
    if denominator == 0.0 {
        1.0
    } else {
        denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(prices: impl Iterator<Item = f64>, size: f64) -> Vec<BookLevel> {
        prices.map(|price| BookLevel { price, size }).collect()
    }

    #[test]
    fn test_asks_reversed_and_truncated() {
        // 10 ascending ask levels 101..=110
        let asks = levels((1..=10).map(|i| 100.0 + i as f64), 1.0);
        let bids = levels((1..=10).map(|i| 100.0 - i as f64), 1.0);

        let book = OrderBookSnapshot::from_levels(&asks, &bids, 10.0, 10.0);

        assert_eq!(book.asks.len(), 8);
        let ask_prices: Vec<f64> = book.asks.iter().map(|r| r.price).collect();
        assert_eq!(
            ask_prices,
            vec![110.0, 109.0, 108.0, 107.0, 106.0, 105.0, 104.0, 103.0]
        );

        assert_eq!(book.bids.len(), 8);
        assert_eq!(book.bids[0].price, 99.0);
        assert_eq!(book.bids[7].price, 92.0);
    }

    #[test]
    fn test_bar_width_scaled_and_capped() {
        // 1 / 100 * 500 = 5%
        assert!((bar_width(1.0, 100.0) - 5.0).abs() < 1e-9);
        // 30 / 100 * 500 = 150% -> capped
        assert_eq!(bar_width(30.0, 100.0), 100.0);
    }

    #[test]
    fn test_bar_width_uses_side_total() {
        let asks = vec![BookLevel {
            price: 101.0,
            size: 2.0,
        }];
        let bids = vec![BookLevel {
            price: 99.0,
            size: 2.0,
        }];

        let book = OrderBookSnapshot::from_levels(&asks, &bids, 200.0, 50.0);

        assert!((book.asks[0].bar_width - 5.0).abs() < 1e-9);
        assert!((book.bids[0].bar_width - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_liquidity_ratio() {
        let book = OrderBookSnapshot::from_levels(&[], &[], 30.0, 10.0);

        assert!((book.bid_ratio() - 25.0).abs() < 1e-9);
        assert!((book.ask_ratio() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_book_guarded() {
        let book = OrderBookSnapshot::from_levels(&[], &[], 0.0, 0.0);

        assert_eq!(book.bid_ratio(), 0.0);
        assert_eq!(book.ask_ratio(), 0.0);
        assert_eq!(bar_width(0.0, 0.0), 0.0);
    }
}
