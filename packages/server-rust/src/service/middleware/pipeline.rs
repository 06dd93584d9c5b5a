//! Pipeline composition: wraps `ResolverDispatch` in the middleware stack.

use serde_json::Value;
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::dispatch::ResolverDispatch;
use crate::service::operation::{GatewayError, Invocation};

/// The type-erased, cloneable dispatch pipeline shared by request handlers.
pub type DispatchPipeline = BoxCloneSyncService<Invocation, Value, GatewayError>;

/// Build the dispatch pipeline.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, including timeouts
/// 2. `TimeoutLayer` -- enforce the per-invocation deadline
#[must_use]
pub fn build_dispatch_pipeline(dispatch: ResolverDispatch) -> DispatchPipeline {
    let svc = ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(TimeoutLayer)
        .service(dispatch);
    BoxCloneSyncService::new(svc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use shakegate_core::{Args, RequestContext};
    use tower::ServiceExt;

    use super::*;
    use crate::service::auth::AuthForwarder;
    use crate::service::backend::{BackendRequest, BackendResult};
    use crate::service::broker::OperationBroker;
    use crate::service::registry::OperationRegistry;
    use crate::traits::Backend;

    struct StalledBackend;

    #[async_trait]
    impl Backend for StalledBackend {
        async fn call(&self, _request: BackendRequest) -> BackendResult {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!(null))
        }
    }

    fn pipeline() -> DispatchPipeline {
        build_dispatch_pipeline(ResolverDispatch::new(
            Arc::new(OperationRegistry::default()),
            Arc::new(StalledBackend),
            OperationBroker::new(Duration::from_secs(1), 4),
            AuthForwarder::default(),
        ))
    }

    fn invocation(operation: &str, timeout_ms: u64) -> Invocation {
        Invocation {
            call_id: 1,
            operation: operation.to_string(),
            args: Args::new(),
            ctx: RequestContext::default(),
            timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out() {
        let result = pipeline().oneshot(invocation("get_rooms", 250)).await;
        assert_eq!(result, Err(GatewayError::Timeout { timeout_ms: 250 }));
    }

    #[tokio::test]
    async fn local_errors_pass_through_layers() {
        let result = pipeline().oneshot(invocation("check", 250)).await;
        assert_eq!(result, Err(GatewayError::AuthMissing));
    }
}
