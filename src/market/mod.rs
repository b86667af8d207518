// Market data aggregation module
pub mod aggregator;
pub mod order_book;
pub mod price_window;
pub mod trade_tape;

pub use aggregator::MarketDataAggregator;
pub use order_book::{bar_width, BookRow, OrderBookSnapshot, BOOK_DEPTH};
pub use price_window::{PriceWindow, PRICE_WINDOW_CAPACITY};
pub use trade_tape::{TradeTape, TRADE_TAPE_CAPACITY};
