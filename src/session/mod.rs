// Trading session: the task that owns feed, market state and trading state
pub mod service;
pub mod snapshot;

pub use service::{SessionError, SessionHandle, TradingSession};
pub use snapshot::SessionSnapshot;
