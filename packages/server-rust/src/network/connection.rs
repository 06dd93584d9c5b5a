//! Subscription socket tracking.
//!
//! Every WebSocket connection gets a bounded outbound channel drained by
//! its write loop. The registry holds the sender side so shutdown can
//! reach every open socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use shakegate_core::messages::ServerFrame;
use tokio::sync::mpsc;

use super::config::ConnectionConfig;

/// Unique identifier for a connection, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// WebSocket close code for a normal shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// WebSocket close code for an unparseable client frame.
pub const CLOSE_BAD_REQUEST: u16 = 4400;

/// Message to be written to a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// A protocol frame, serialized to JSON text by the write loop.
    Frame(ServerFrame),
    /// A close frame; the write loop exits after sending it.
    Close { code: u16, reason: String },
}

/// Error returned when sending a message to a connection fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("send timed out")]
    Timeout,
    #[error("connection closed")]
    Disconnected,
}

/// Sender side of one connection's outbound channel.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub tx: mpsc::Sender<OutboundMessage>,
    pub connected_at: Instant,
}

impl ConnectionHandle {
    /// Attempts to enqueue a message without waiting.
    ///
    /// Returns `false` if the channel is full or the connection has closed.
    #[must_use]
    pub fn try_send(&self, msg: OutboundMessage) -> bool {
        self.tx.try_send(msg).is_ok()
    }

    /// Enqueues a message, waiting at most `timeout` for channel capacity.
    ///
    /// # Errors
    ///
    /// `SendError::Timeout` if the channel stayed full; `SendError::Disconnected`
    /// if the write loop has exited.
    pub async fn send_timeout(
        &self,
        msg: OutboundMessage,
        timeout: Duration,
    ) -> Result<(), SendError> {
        match tokio::time::timeout(timeout, self.tx.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Disconnected),
            Err(_) => Err(SendError::Timeout),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Thread-safe registry of open subscription sockets.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a new empty registry. Connection IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new connection, returning its handle and the receiver
    /// for the write loop.
    pub fn register(
        &self,
        config: &ConnectionConfig,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(config.outbound_channel_capacity.max(1));

        let handle = Arc::new(ConnectionHandle {
            id,
            tx,
            connected_at: Instant::now(),
        });

        self.connections.insert(id, Arc::clone(&handle));
        (handle, rx)
    }

    /// Removes a connection, returning its handle if it was registered.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, handle)| handle)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Removes and returns all connections. Used during graceful shutdown.
    pub fn drain_all(&self) -> Vec<Arc<ConnectionHandle>> {
        let keys: Vec<ConnectionId> = self
            .connections
            .iter()
            .map(|entry| *entry.key())
            .collect();

        keys.into_iter()
            .filter_map(|key| self.connections.remove(&key).map(|(_, handle)| handle))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_channel_config() -> ConnectionConfig {
        ConnectionConfig {
            outbound_channel_capacity: 1,
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let registry = ConnectionRegistry::new();
        let config = ConnectionConfig::default();

        let (a, _rx_a) = registry.register(&config);
        let (b, _rx_b) = registry.register(&config);
        assert_eq!(a.id, ConnectionId(1));
        assert_eq!(b.id, ConnectionId(2));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn remove_and_get() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.register(&ConnectionConfig::default());
        let id = handle.id;

        assert_eq!(registry.get(id).unwrap().id, id);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.get(id).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn try_send_reports_full_channel() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = registry.register(&small_channel_config());

        assert!(handle.try_send(OutboundMessage::Frame(ServerFrame::Ping)));
        assert!(!handle.try_send(OutboundMessage::Frame(ServerFrame::Pong)));
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::Frame(ServerFrame::Ping));
    }

    #[tokio::test]
    async fn send_timeout_when_full() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.register(&small_channel_config());

        assert!(handle.try_send(OutboundMessage::Frame(ServerFrame::Ping)));
        let result = handle
            .send_timeout(
                OutboundMessage::Frame(ServerFrame::Pong),
                Duration::from_millis(20),
            )
            .await;
        assert_eq!(result, Err(SendError::Timeout));
    }

    #[tokio::test]
    async fn send_to_closed_connection() {
        let registry = ConnectionRegistry::new();
        let (handle, rx) = registry.register(&ConnectionConfig::default());
        drop(rx);

        assert!(!handle.is_connected());
        let result = handle
            .send_timeout(
                OutboundMessage::Frame(ServerFrame::Ping),
                Duration::from_millis(20),
            )
            .await;
        assert_eq!(result, Err(SendError::Disconnected));
    }

    #[test]
    fn drain_all_empties_registry() {
        let registry = ConnectionRegistry::new();
        let config = ConnectionConfig::default();
        let (_a, _rx_a) = registry.register(&config);
        let (_b, _rx_b) = registry.register(&config);

        let drained = registry.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.count(), 0);
    }
}
