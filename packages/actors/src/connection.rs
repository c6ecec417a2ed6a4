//! Live subscriber connections and the registry that fans out to them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use ulid::Ulid;

/// How long a single send may take before the connection counts as dead.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifier of one live connection. Fresh per subscribe, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Ulid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A failed push. Treated as proof that the connection is dead.
#[derive(Debug, thiserror::Error)]
#[error("send failed: {0}")]
pub struct SinkError(pub String);

/// Future type for sink operations.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// The write side of one live connection.
///
/// Implement this for each transport. `send` should hand the frame off and
/// return promptly; a send that outlives the registry's timeout is treated as
/// a failure.
pub trait LiveSink: Send + Sync + 'static {
    /// Push one text frame.
    fn send<'a>(&'a mut self, frame: &'a str) -> SinkFuture<'a>;

    /// Close the transport. Called once at coordinator shutdown.
    fn close(&mut self) -> SinkFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// Sink backed by an unbounded channel. The send fails once the receiver is dropped.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LiveSink for ChannelSink {
    fn send<'a>(&'a mut self, frame: &'a str) -> SinkFuture<'a> {
        let result = self
            .tx
            .send(frame.to_string())
            .map_err(|_| SinkError("receiver dropped".into()));
        Box::pin(async move { result })
    }
}

struct Connection {
    sink: Box<dyn LiveSink>,
    opened_at: DateTime<Utc>,
}

/// Result of pushing one frame to every registered connection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub dropped: Vec<ConnectionId>,
}

async fn send_within(sink: &mut dyn LiveSink, frame: &str, limit: Duration) -> Result<(), SinkError> {
    match tokio::time::timeout(limit, sink.send(frame)).await {
        Ok(result) => result,
        Err(_) => Err(SinkError(format!("send timed out after {}ms", limit.as_millis()))),
    }
}

/// Set of open connections. Owned exclusively by the coordinator.
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    send_timeout: Duration,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_send_timeout(DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            send_timeout,
        }
    }

    pub fn register(&mut self, id: ConnectionId, sink: Box<dyn LiveSink>) {
        self.connections.insert(
            id,
            Connection {
                sink,
                opened_at: Utc::now(),
            },
        );
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        match self.connections.remove(id) {
            Some(conn) => {
                let open_for = Utc::now() - conn.opened_at;
                tracing::debug!(
                    "Connection {} closed after {}s",
                    id,
                    open_for.num_seconds()
                );
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Push a frame to a single connection, removing it if the send fails.
    pub async fn send_to(&mut self, id: &ConnectionId, frame: &str) -> Result<(), SinkError> {
        let Some(conn) = self.connections.get_mut(id) else {
            return Err(SinkError(format!("connection {id} is not registered")));
        };
        let result = send_within(conn.sink.as_mut(), frame, self.send_timeout).await;
        if let Err(e) = &result {
            tracing::warn!("Dropping connection {}: {}", id, e);
            self.remove(id);
        }
        result
    }

    /// Push a frame to every connection.
    ///
    /// Sends run concurrently, each bounded by the send timeout. Connections
    /// whose send failed or timed out are removed afterwards. No retries.
    pub async fn broadcast(&mut self, frame: &str) -> BroadcastOutcome {
        let limit = self.send_timeout;
        let sends = self.connections.iter_mut().map(|(id, conn)| async move {
            (*id, send_within(conn.sink.as_mut(), frame, limit).await)
        });
        let results = join_all(sends).await;

        let mut outcome = BroadcastOutcome::default();
        for (id, result) in results {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    tracing::warn!("Dropping connection {}: {}", id, e);
                    self.remove(&id);
                    outcome.dropped.push(id);
                }
            }
        }
        outcome
    }

    /// Close and forget every connection.
    pub async fn close_all(&mut self) {
        for (id, mut conn) in self.connections.drain() {
            let closed = tokio::time::timeout(self.send_timeout, conn.sink.close()).await;
            if let Ok(Err(e)) = closed {
                tracing::debug!("Closing connection {} failed: {}", id, e);
            }
        }
    }
}
