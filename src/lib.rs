// Core modules
pub mod api;
pub mod backtest;
pub mod config;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod market;
pub mod models;
pub mod session;

// Re-export commonly used types
pub use models::*;
pub use session::{SessionError, SessionHandle, SessionSnapshot, TradingSession};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
