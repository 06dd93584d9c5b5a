//! Shakegate server — typed operation gateway over an HTTP backend, with a
//! WebSocket channel for scheduled-operation completions.

pub mod network;
pub mod service;
pub mod traits;

pub use network::NetworkModule;
pub use service::{Gateway, GatewayConfig, GatewayError, HttpBackend, OperationBroker};
pub use traits::Backend;
