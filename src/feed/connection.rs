// Exchange stream connection manager
// One task per connection, tagged with a generation id
// Aborting the task also cancels its pending reconnect

use crate::feed::error::{FeedError, FeedResult};
use crate::feed::message::{decode_event, encode_subscription, FeedEvent};
use crate::models::MarketSymbol;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Public Upbit websocket endpoint
pub const DEFAULT_FEED_URL: &str = "wss://api.upbit.com/websocket/v1";

/// Wait between a dropped connection and the next attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What a connection task reports upstream
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    State(ConnectionState),
    Event(FeedEvent),
}

/// Signal tagged with the connection that produced it
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub generation: u64,
    pub symbol: MarketSymbol,
    pub signal: FeedSignal,
}

/// Bidirectional text stream to the exchange
pub trait FeedTransport: Send {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, FeedResult<()>>;

    /// Next text frame; `None` once the stream has ended
    fn next_text(&mut self) -> BoxFuture<'_, Option<FeedResult<String>>>;
}

/// Opens transports. Implemented over websockets for live use and in memory
/// for tests
pub trait Connector: Send + Sync + 'static {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FeedResult<Box<dyn FeedTransport>>>;
}

/// Websocket connector (TLS via native-tls)
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FeedResult<Box<dyn FeedTransport>>> {
        Box::pin(async move {
            let (stream, _response) = connect_async(url).await?;
            Ok(Box::new(WsTransport { stream }) as Box<dyn FeedTransport>)
        })
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl FeedTransport for WsTransport {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, FeedResult<()>> {
        Box::pin(async move {
            self.stream
                .send(Message::Text(text))
                .await
                .map_err(|e| FeedError::SendFailed(e.to_string()))
        })
    }

    fn next_text(&mut self) -> BoxFuture<'_, Option<FeedResult<String>>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                    // Upbit delivers JSON in binary frames
                    Some(Ok(Message::Binary(bytes))) => {
                        return Some(String::from_utf8(bytes).map_err(FeedError::from))
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        return Some(Err(FeedError::ConnectionClosed { code, reason }));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => return None,
                }
            }
        })
    }
}

struct ActiveConnection {
    generation: u64,
    symbol: MarketSymbol,
    task: JoinHandle<()>,
}

/// Feed connection manager
///
/// At most one connection task is alive at a time. `connect` waits for the
/// previous task to be fully dropped before spawning the next one
pub struct FeedConnectionManager {
    connector: Arc<dyn Connector>,
    url: String,
    ticket: String,
    events_tx: mpsc::Sender<FeedMessage>,
    generation: u64,
    active: Option<ActiveConnection>,
}

impl FeedConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `ticket` - Session ticket sent with every subscription request
    /// * `events_tx` - Receives decoded events and state changes from every connection
    pub fn new(
        connector: Arc<dyn Connector>,
        url: impl Into<String>,
        ticket: impl Into<String>,
        events_tx: mpsc::Sender<FeedMessage>,
    ) -> Self {
        Self {
            connector,
            url: url.into(),
            ticket: ticket.into(),
            events_tx,
            generation: 0,
            active: None,
        }
    }

    /// Tear down the current connection (if any) and connect to `symbol`
    ///
    /// Returns the generation of the new connection
    pub async fn connect(&mut self, symbol: MarketSymbol) -> u64 {
        self.disconnect().await;

        self.generation += 1;
        let generation = self.generation;

        let link = ConnectionLink {
            connector: self.connector.clone(),
            url: self.url.clone(),
            ticket: self.ticket.clone(),
            symbol: symbol.clone(),
            generation,
            events_tx: self.events_tx.clone(),
        };

        info!(symbol = %symbol, generation, "Opening feed connection");
        let task = tokio::spawn(link.run());

        self.active = Some(ActiveConnection {
            generation,
            symbol,
            task,
        });

        generation
    }

    /// Tear down the current connection and any reconnect it has pending
    pub async fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            // Wait for the task (and its socket) to be dropped
            let _ = active.task.await;
            info!(
                symbol = %active.symbol,
                generation = active.generation,
                "Feed connection closed"
            );
        }
    }

    /// Whether a message belongs to the live connection
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn symbol(&self) -> Option<&MarketSymbol> {
        self.active.as_ref().map(|active| &active.symbol)
    }

    pub fn ticket(&self) -> &str {
        &self.ticket
    }
}

impl Drop for FeedConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

/// Everything a connection task needs; owned by the task
struct ConnectionLink {
    connector: Arc<dyn Connector>,
    url: String,
    ticket: String,
    symbol: MarketSymbol,
    generation: u64,
    events_tx: mpsc::Sender<FeedMessage>,
}

impl ConnectionLink {
    async fn run(self) {
        loop {
            self.report(ConnectionState::Connecting).await;

            match self.stream_once().await {
                Ok(()) => info!(symbol = %self.symbol, "Feed stream ended"),
                Err(e) => warn!(symbol = %self.symbol, error = %e, "Feed connection lost"),
            }

            self.report(ConnectionState::Disconnected).await;

            if self.events_tx.is_closed() {
                debug!(symbol = %self.symbol, "Feed receiver dropped, not reconnecting");
                return;
            }

            warn!(
                symbol = %self.symbol,
                delay_secs = RECONNECT_DELAY.as_secs(),
                "Reconnecting"
            );
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn stream_once(&self) -> FeedResult<()> {
        let mut transport = self.connector.connect(&self.url).await?;

        let request = encode_subscription(&self.ticket, &self.symbol)?;
        transport.send_text(request).await?;

        self.report(ConnectionState::Connected).await;
        info!(symbol = %self.symbol, generation = self.generation, "Feed subscribed");

        while let Some(frame) = transport.next_text().await {
            let text = frame?;

            match decode_event(&text) {
                Ok(Some(event)) => {
                    if !self.forward(FeedSignal::Event(event)).await {
                        return Ok(());
                    }
                }
                Ok(None) => debug!("Ignoring unrecognized stream message"),
                Err(e) => warn!(error = %e, "Dropping malformed stream message"),
            }
        }

        Ok(())
    }

    async fn report(&self, state: ConnectionState) {
        self.forward(FeedSignal::State(state)).await;
    }

    async fn forward(&self, signal: FeedSignal) -> bool {
        let message = FeedMessage {
            generation: self.generation,
            symbol: self.symbol.clone(),
            signal,
        };
        self.events_tx.send(message).await.is_ok()
    }
}
