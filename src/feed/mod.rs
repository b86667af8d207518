// Market data feed module
// Wire format, transports and the connection manager

pub mod connection;
pub mod error;
pub mod memory;
pub mod message;

pub use connection::{
    ConnectionState, Connector, FeedConnectionManager, FeedMessage, FeedSignal, FeedTransport,
    WsConnector, DEFAULT_FEED_URL, RECONNECT_DELAY,
};
pub use error::{FeedError, FeedResult};
pub use memory::{MemoryConnector, MemoryPeer};
pub use message::{
    decode_event, encode_subscription, subscription_request, Channel, FeedEvent,
    OrderBookPayload, OrderBookUnit, SubscriptionClause, TickerPayload, TradePayload,
};
