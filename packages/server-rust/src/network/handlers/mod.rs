//! HTTP and WebSocket handlers.
//!
//! `AppState` is the shared state carried through axum extractors; the
//! handler functions are re-exported for router assembly.

pub mod graphql;
pub mod health;
pub mod websocket;

pub use graphql::graphql_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use websocket::ws_upgrade_handler;

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use shakegate_core::RequestContext;

use super::{ConnectionRegistry, NetworkConfig, ShutdownController};
use crate::service::Gateway;

/// Shared application state passed to all handlers via `State` extraction.
///
/// Cloning is cheap: every field is an `Arc` or `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// Open subscription sockets.
    pub registry: Arc<ConnectionRegistry>,
    /// Health state and in-flight request tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Dispatch pipeline plus the broker behind the subscription channel.
    pub gateway: Gateway,
    /// Process start time, used for uptime.
    pub start_time: Instant,
}

impl AppState {
    /// Converts inbound headers into the request context. Headers whose
    /// values are not visible ASCII are skipped.
    pub(crate) fn request_context(&self, headers: &HeaderMap) -> RequestContext {
        self.gateway.request_context(
            headers
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        )
    }
}
