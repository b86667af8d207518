// Trading session service
// One task owns the feed, market windows, momentum reading and position manager

use super::snapshot::SessionSnapshot;
use crate::api::{coin_id_for, CoinGeckoClient};
use crate::config::Settings;
use crate::execution::{PositionManager, RandomSource};
use crate::feed::{
    ConnectionState, Connector, FeedConnectionManager, FeedError, FeedEvent, FeedMessage,
    FeedSignal,
};
use crate::indicators::{momentum_index, NEUTRAL_RSI};
use crate::market::MarketDataAggregator;
use crate::models::MarketSymbol;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const FEED_CHANNEL_CAPACITY: usize = 1024;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session has stopped")]
    Stopped,

    #[error("Invalid market symbol: '{0}'")]
    InvalidSymbol(String),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

enum Command {
    SwitchSymbol {
        symbol: MarketSymbol,
        reply: oneshot::Sender<()>,
    },
    SetArmed {
        armed: bool,
        reply: oneshot::Sender<bool>,
    },
    ToggleArmed {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

struct MetadataResult {
    symbol: MarketSymbol,
    image: Option<String>,
}

/// Single owner of all mutable trading state
pub struct TradingSession {
    symbol: MarketSymbol,
    feed: FeedConnectionManager,
    feed_rx: mpsc::Receiver<FeedMessage>,
    aggregator: MarketDataAggregator,
    trader: PositionManager,
    indicator: f64,
    connection: ConnectionState,
    metadata: Option<CoinGeckoClient>,
    metadata_tx: mpsc::Sender<MetadataResult>,
    metadata_rx: mpsc::Receiver<MetadataResult>,
    coin_image: Option<String>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl TradingSession {
    pub fn new(
        symbol: MarketSymbol,
        feed_url: impl Into<String>,
        initial_balance: f64,
        connector: Arc<dyn Connector>,
        random: Box<dyn RandomSource>,
        metadata: Option<CoinGeckoClient>,
    ) -> Self {
        let (feed_tx, feed_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let (metadata_tx, metadata_rx) = mpsc::channel(8);

        let ticket = Uuid::new_v4().to_string();
        let feed = FeedConnectionManager::new(connector, feed_url, ticket, feed_tx);
        let trader = PositionManager::new(initial_balance, random);

        let (snapshot_tx, _) =
            watch::channel(SessionSnapshot::initial(symbol.clone(), trader.wallet(None)));

        Self {
            symbol,
            feed,
            feed_rx,
            aggregator: MarketDataAggregator::new(),
            trader,
            indicator: NEUTRAL_RSI,
            connection: ConnectionState::Disconnected,
            metadata,
            metadata_tx,
            metadata_rx,
            coin_image: None,
            snapshot_tx,
        }
    }

    /// Build a session from loaded settings
    ///
    /// The metadata client is only created when `metadata_enabled` is set
    pub fn from_settings(
        settings: &Settings,
        connector: Arc<dyn Connector>,
        random: Box<dyn RandomSource>,
    ) -> Result<Self, SessionError> {
        let symbol = settings.market_symbol()?;
        let metadata = if settings.metadata_enabled {
            Some(CoinGeckoClient::with_base_url(
                settings.coingecko_api_base.as_str(),
                settings.coingecko_api_key.clone(),
            )?)
        } else {
            None
        };

        Ok(Self::new(
            symbol,
            settings.feed_url.as_str(),
            settings.initial_balance,
            connector,
            random,
            metadata,
        ))
    }

    /// Connect to the initial symbol and hand the session to its own task
    pub async fn start(mut self) -> SessionHandle {
        info!(symbol = %self.symbol, ticket = self.feed.ticket(), "Starting trading session");

        self.feed.connect(self.symbol.clone()).await;
        self.connection = ConnectionState::Connecting;
        self.request_metadata();
        self.publish();

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let snapshots = self.snapshot_tx.subscribe();
        let task = tokio::spawn(self.run(commands_rx));

        SessionHandle {
            commands: commands_tx,
            snapshots,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Stop { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All session handles dropped");
                        self.shutdown().await;
                        return;
                    }
                },
                Some(message) = self.feed_rx.recv() => self.handle_feed_message(message),
                Some(result) = self.metadata_rx.recv() => self.apply_metadata(result),
            }

            self.publish();
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            // Publish before replying so callers observe the change
            Command::SwitchSymbol { symbol, reply } => {
                self.switch_symbol(symbol).await;
                self.publish();
                let _ = reply.send(());
            }
            Command::SetArmed { armed, reply } => {
                self.trader.set_armed(armed);
                self.publish();
                let _ = reply.send(self.trader.is_armed());
            }
            Command::ToggleArmed { reply } => {
                let armed = self.trader.toggle_armed();
                self.publish();
                let _ = reply.send(armed);
            }
            Command::Stop { reply } => {
                let _ = reply.send(());
            }
        }
    }

    /// Move the session to another market
    ///
    /// The old connection (and any reconnect it had pending) is gone before
    /// the new one opens. Windows start empty; the ledger, the open position
    /// and the armed flag carry over
    ///
    /// A carried-over position keeps its entry price, so the first ticker of
    /// the new market is judged against it and usually closes the position
    /// at the new market's price
    pub async fn switch_symbol(&mut self, symbol: MarketSymbol) {
        info!(from = %self.symbol, to = %symbol, "Switching market");
        self.trader
            .log_system(format!("SWITCHING MARKET TO {}", symbol));

        self.symbol = symbol;
        self.feed.connect(self.symbol.clone()).await;

        self.aggregator.reset();
        self.indicator = NEUTRAL_RSI;
        self.connection = ConnectionState::Connecting;
        self.coin_image = None;

        self.request_metadata();
    }

    /// Apply one message from the connection manager
    ///
    /// Messages from a superseded connection are dropped unseen
    pub fn handle_feed_message(&mut self, message: FeedMessage) {
        if !self.feed.is_current(message.generation) {
            debug!(
                symbol = %message.symbol,
                generation = message.generation,
                "Dropping message from stale connection"
            );
            return;
        }

        match message.signal {
            FeedSignal::State(state) => self.on_connection_state(state),
            FeedSignal::Event(event) => {
                if let Err(e) = self.apply_event(event) {
                    warn!(symbol = %self.symbol, error = %e, "Dropping malformed event");
                }
            }
        }
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        if state == self.connection {
            return;
        }
        if state == ConnectionState::Connected {
            self.trader
                .log_system(format!("UPLINK ESTABLISHED: {}", self.symbol));
        }
        self.connection = state;
    }

    fn apply_event(&mut self, event: FeedEvent) -> Result<(), FeedError> {
        if !event.code().is_empty() && event.code() != self.symbol.as_str() {
            debug!(code = event.code(), symbol = %self.symbol, "Ignoring event for another market");
            return Ok(());
        }

        match event {
            FeedEvent::Ticker(payload) => {
                let ticker = self.aggregator.on_ticker(&payload)?;
                self.indicator = momentum_index(self.aggregator.price_window());
                self.trader.on_price(ticker.price, self.indicator);
            }
            FeedEvent::OrderBook(payload) => {
                self.aggregator.on_order_book(&payload)?;
            }
            FeedEvent::Trade(payload) => {
                self.aggregator.on_trade(&payload)?;
            }
        }
        Ok(())
    }

    fn request_metadata(&self) {
        let Some(client) = self.metadata.clone() else {
            return;
        };
        if coin_id_for(&self.symbol).is_none() {
            debug!(symbol = %self.symbol, "No coin id for market, skipping metadata lookup");
            return;
        }
        let symbol = self.symbol.clone();
        let results = self.metadata_tx.clone();

        tokio::spawn(async move {
            let image = match client.get_market_image(&symbol).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Coin metadata lookup failed");
                    None
                }
            };
            let _ = results.send(MetadataResult { symbol, image }).await;
        });
    }

    fn apply_metadata(&mut self, result: MetadataResult) {
        // A switch may have happened while the lookup was in flight
        if result.symbol == self.symbol {
            self.coin_image = result.image;
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            symbol: self.symbol.clone(),
            connection: self.connection,
            armed: self.trader.is_armed(),
            ticker: self.aggregator.ticker().cloned(),
            order_book: self.aggregator.order_book().cloned(),
            trades: self.aggregator.trade_tape().trades(),
            window_len: self.aggregator.price_window().len(),
            indicator: self.indicator,
            position: *self.trader.position(),
            wallet: self.trader.wallet(self.aggregator.last_price()),
            trade_log: self.trader.trade_log().to_vec(),
            coin_image: self.coin_image.clone(),
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    async fn shutdown(&mut self) {
        self.feed.disconnect().await;
        self.connection = ConnectionState::Disconnected;
        self.publish();
        info!(symbol = %self.symbol, "Trading session stopped");
    }

    pub fn symbol(&self) -> &MarketSymbol {
        &self.symbol
    }

    pub fn set_armed(&mut self, armed: bool) -> bool {
        self.trader.set_armed(armed)
    }
}

/// Control surface of a running session
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Switch to `code`; resolves once the new connection has been opened
    pub async fn switch_symbol(&self, code: &str) -> Result<(), SessionError> {
        let symbol =
            MarketSymbol::new(code).ok_or_else(|| SessionError::InvalidSymbol(code.to_string()))?;
        self.request(|reply| Command::SwitchSymbol { symbol, reply })
            .await
    }

    /// Arm or disarm, returning the resulting flag
    pub async fn set_armed(&self, armed: bool) -> Result<bool, SessionError> {
        self.request(|reply| Command::SetArmed { armed, reply })
            .await
    }

    /// Flip the armed flag, returning the new value
    pub async fn toggle_armed(&self) -> Result<bool, SessionError> {
        self.request(|reply| Command::ToggleArmed { reply }).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every processed event
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Close the connection, cancel pending reconnects and end the task
    pub async fn stop(self) -> Result<(), SessionError> {
        self.request(|reply| Command::Stop { reply }).await?;
        self.task.await.map_err(|_| SessionError::Stopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Stopped)?;
        reply_rx.await.map_err(|_| SessionError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ScriptedRandom;
    use crate::feed::{MemoryConnector, TickerPayload};
    use crate::models::ChangeDirection;

    fn symbol(code: &str) -> MarketSymbol {
        MarketSymbol::new(code).unwrap()
    }

    fn session(connector: &MemoryConnector) -> TradingSession {
        TradingSession::new(
            symbol("KRW-BTC"),
            "memory://feed",
            1_000_000.0,
            Arc::new(connector.clone()),
            Box::new(ScriptedRandom::quiet()),
            None,
        )
    }

    fn ticker(code: &str, price: f64) -> FeedEvent {
        FeedEvent::Ticker(TickerPayload {
            code: code.to_string(),
            trade_price: price,
            signed_change_rate: 0.01,
            change: ChangeDirection::Rise,
            high_price: price,
            low_price: price,
            acc_trade_volume_24h: 10.0,
        })
    }

    fn message(generation: u64, code: &str, signal: FeedSignal) -> FeedMessage {
        FeedMessage {
            generation,
            symbol: symbol(code),
            signal,
        }
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let connector = MemoryConnector::new();
        let mut session = session(&connector);

        session.feed.connect(symbol("KRW-BTC")).await;
        let old = session.feed.generation();

        session.switch_symbol(symbol("KRW-ETH")).await;
        let current = session.feed.generation();
        assert_ne!(old, current);

        session.handle_feed_message(message(
            old,
            "KRW-BTC",
            FeedSignal::Event(ticker("KRW-BTC", 100.0)),
        ));
        assert!(session.snapshot().ticker.is_none());

        session.handle_feed_message(message(
            current,
            "KRW-ETH",
            FeedSignal::Event(ticker("KRW-ETH", 200.0)),
        ));
        assert_eq!(session.snapshot().last_price(), Some(200.0));
    }

    #[tokio::test]
    async fn test_switch_resets_windows_and_keeps_ledger() {
        let connector = MemoryConnector::new();
        let mut session = session(&connector);
        session.feed.connect(symbol("KRW-BTC")).await;
        session.set_armed(true);

        let generation = session.feed.generation();
        for price in [100.0, 99.0, 98.0] {
            session.handle_feed_message(message(
                generation,
                "KRW-BTC",
                FeedSignal::Event(ticker("KRW-BTC", price)),
            ));
        }
        let before = session.snapshot();
        assert_eq!(before.window_len, 3);

        session.switch_symbol(symbol("KRW-XRP")).await;
        let after = session.snapshot();

        assert_eq!(after.symbol.as_str(), "KRW-XRP");
        assert_eq!(after.window_len, 0);
        assert!(after.ticker.is_none());
        assert_eq!(after.indicator, NEUTRAL_RSI);
        assert!(after.armed);
        assert_eq!(after.wallet.balance, before.wallet.balance);
        assert_eq!(after.position, before.position);
        assert!(after
            .trade_log
            .last()
            .unwrap()
            .message
            .contains("SWITCHING MARKET TO KRW-XRP"));
    }

    #[tokio::test]
    async fn test_connected_state_logs_uplink() {
        let connector = MemoryConnector::new();
        let mut session = session(&connector);
        let generation = session.feed.connect(symbol("KRW-BTC")).await;

        session.handle_feed_message(message(
            generation,
            "KRW-BTC",
            FeedSignal::State(ConnectionState::Connected),
        ));

        let snapshot = session.snapshot();
        assert!(snapshot.is_connected());
        assert_eq!(
            snapshot.trade_log.last().unwrap().message,
            "UPLINK ESTABLISHED: KRW-BTC"
        );
    }

    #[tokio::test]
    async fn test_rejected_ticker_leaves_state_untouched() {
        let connector = MemoryConnector::new();
        let mut session = session(&connector);
        let generation = session.feed.connect(symbol("KRW-BTC")).await;

        session.handle_feed_message(message(
            generation,
            "KRW-BTC",
            FeedSignal::Event(ticker("KRW-BTC", -5.0)),
        ));

        let snapshot = session.snapshot();
        assert!(snapshot.ticker.is_none());
        assert_eq!(snapshot.window_len, 0);
    }

    #[tokio::test]
    async fn test_unknown_market_skips_metadata_lookup() {
        let connector = MemoryConnector::new();
        let client = CoinGeckoClient::with_base_url("http://127.0.0.1:9", None).unwrap();
        let mut session = TradingSession::new(
            symbol("KRW-UNKNOWN"),
            "memory://feed",
            1_000_000.0,
            Arc::new(connector.clone()),
            Box::new(ScriptedRandom::quiet()),
            Some(client),
        );

        session.request_metadata();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(session.metadata_rx.try_recv().is_err());
        assert!(session.snapshot().coin_image.is_none());
    }

    #[test]
    fn test_metadata_for_old_symbol_is_ignored() {
        let connector = MemoryConnector::new();
        let mut session = session(&connector);

        session.apply_metadata(MetadataResult {
            symbol: symbol("KRW-ETH"),
            image: Some("https://img/eth.png".to_string()),
        });
        assert!(session.snapshot().coin_image.is_none());

        session.apply_metadata(MetadataResult {
            symbol: symbol("KRW-BTC"),
            image: Some("https://img/btc.png".to_string()),
        });
        assert_eq!(
            session.snapshot().coin_image.as_deref(),
            Some("https://img/btc.png")
        );
    }
}
