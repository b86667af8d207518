// In-memory transport driven from tests

use crate::feed::connection::{Connector, FeedTransport};
use crate::feed::error::{FeedError, FeedResult};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    fail_next: AtomicUsize,
}

/// Connector whose connections are driven by the test
#[derive(Clone)]
pub struct MemoryConnector {
    counters: Arc<Counters>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: Arc<Mutex<mpsc::UnboundedReceiver<MemoryPeer>>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            counters: Arc::new(Counters::default()),
            peers_tx,
            peers_rx: Arc::new(Mutex::new(peers_rx)),
        }
    }

    /// Wait for the client to open the next connection
    pub async fn accept(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_next(&self, count: usize) {
        self.counters.fail_next.store(count, Ordering::SeqCst);
    }

    /// Connection attempts so far, failed ones included
    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Transports currently alive on the client side
    pub fn live_connections(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live transports ever observed
    pub fn max_live_connections(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FeedResult<Box<dyn FeedTransport>>> {
        Box::pin(async move {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);

            let failing = self
                .counters
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(FeedError::ConnectionFailed(format!("{} refused", url)));
            }

            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

            let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_live.fetch_max(live, Ordering::SeqCst);

            let peer = MemoryPeer {
                inbound_tx,
                outbound_rx,
            };
            // The test side may not care about this peer
            let _ = self.peers_tx.send(peer);

            Ok(Box::new(MemoryTransport {
                inbound_rx,
                outbound_tx,
                counters: self.counters.clone(),
            }) as Box<dyn FeedTransport>)
        })
    }
}

/// Server side of one in-memory connection
pub struct MemoryPeer {
    inbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Deliver a frame to the client. Frames sent after the client went away
    /// are dropped
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.inbound_tx.send(text.into());
    }

    /// Next frame the client sent, `None` once the client side is gone
    pub async fn next_sent(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// End the stream from the server side
    pub fn close(self) {}
}

struct MemoryTransport {
    inbound_rx: mpsc::UnboundedReceiver<String>,
    outbound_tx: mpsc::UnboundedSender<String>,
    counters: Arc<Counters>,
}

impl FeedTransport for MemoryTransport {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, FeedResult<()>> {
        Box::pin(async move {
            self.outbound_tx
                .send(text)
                .map_err(|e| FeedError::SendFailed(e.to_string()))
        })
    }

    fn next_text(&mut self) -> BoxFuture<'_, Option<FeedResult<String>>> {
        Box::pin(async move { self.inbound_rx.recv().await.map(Ok) })
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}
