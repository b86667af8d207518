// Technical indicators module
// Momentum index (RSI-14) over the live price window

pub mod rsi;

pub use rsi::{calculate_rsi, momentum_index, NEUTRAL_RSI, RSI_PERIOD};
