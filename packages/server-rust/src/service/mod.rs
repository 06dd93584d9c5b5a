//! Operation dispatch and notification core.
//!
//! This module implements the gateway's resolver pipeline:
//!
//! 1. **Registry** (`registry`): operation name -> `OperationDescriptor`
//! 2. **Auth** (`auth`): bearer credential extraction and forwarding
//! 3. **Dispatch** (`dispatch`): one backend call (or schedule) per invocation
//! 4. **Normalization** (`normalize`): backend failure -> client error
//! 5. **Broker** (`broker`): scheduled operations and completion broadcast
//! 6. **Middleware** (`middleware`): Tower layers (timeout, metrics)

pub mod auth;
pub mod backend;
pub mod broker;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod middleware;
pub mod normalize;
pub mod operation;
pub mod registry;

// Re-export key types for convenient access.
pub use auth::AuthForwarder;
pub use backend::{BackendFailure, BackendRequest, BackendResult, HttpBackend};
pub use broker::{OperationBroker, Subscription, SubscriptionId};
pub use config::GatewayConfig;
pub use dispatch::ResolverDispatch;
pub use gateway::Gateway;
pub use middleware::{build_dispatch_pipeline, DispatchPipeline};
pub use normalize::ErrorNormalizer;
pub use operation::{
    names, GatewayError, Invocation, OperationDescriptor, RequestMapper, ResponseMapper, Target,
};
pub use registry::{default_operations, OperationRegistry};
