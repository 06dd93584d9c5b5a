//! `Shakegate` Core — request context, operation arguments, and the
//! GraphQL-shaped wire envelopes shared by the gateway and its clients.

pub mod context;
pub mod messages;
pub mod types;

pub use context::RequestContext;
pub use types::{Args, HttpMethod, ScheduledOperationEvent};
