//! Network configuration types for the gateway's client-facing listener.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
    /// Per-connection settings for subscription sockets.
    pub connection: ConnectionConfig,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for an HTTP request to complete.
    pub request_timeout: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight requests.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            tls: None,
            connection: ConnectionConfig::default(),
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 64 * 1024,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// TLS certificate configuration.
///
/// No `Default` impl because certificate paths have no sensible defaults.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file.
    pub cert_path: PathBuf,
    /// Path to the TLS private key file.
    pub key_path: PathBuf,
}

/// Per-connection configuration for subscription sockets.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bounded mpsc channel capacity for outbound frames per connection.
    pub outbound_channel_capacity: usize,
    /// Maximum time a subscription waits to enqueue a frame on a full
    /// connection before giving up on that subscription.
    pub send_timeout: Duration,
    /// WebSocket write buffer size in bytes.
    pub ws_write_buffer_size: usize,
    /// Maximum WebSocket write buffer size in bytes.
    pub ws_max_write_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_channel_capacity: 64,
            send_timeout: Duration::from_secs(5),
            ws_write_buffer_size: 16_384,      // 16 KB
            ws_max_write_buffer_size: 131_072, // 128 KB
        }
    }
}
