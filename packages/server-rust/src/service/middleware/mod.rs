//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`timeout`]: Per-invocation deadline enforcement
//! - [`metrics`]: Invocation timing and counting
//! - [`pipeline`]: Composes all layers around `ResolverDispatch`

pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use metrics::MetricsLayer;
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
pub use timeout::TimeoutLayer;
