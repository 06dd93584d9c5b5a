//! Wire envelopes exchanged with gateway clients.
//!
//! - [`graphql`]: request/response bodies of the HTTP operation endpoint
//! - [`subscription`]: frames of the WebSocket subscription channel
//!
//! All envelopes serialize to JSON with camelCase field names.

pub mod graphql;
pub mod subscription;

pub use graphql::{codes, ClientError, ErrorExtensions, OperationRequest, OperationResponse};
pub use subscription::{ClientFrame, ServerFrame, SubscribePayload, OPERATION_FINISHED};
