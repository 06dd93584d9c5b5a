//! Timeout middleware for invocations.
//!
//! Fails invocations that exceed their `timeout_ms` with `GatewayError::Timeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tower::{Layer, Service};

use crate::service::operation::{GatewayError, Invocation};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-invocation timeout enforcement.
///
/// The deadline is read from each invocation's `timeout_ms` field.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces per-invocation timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<Invocation> for TimeoutService<S>
where
    S: Service<Invocation, Response = Value, Error = GatewayError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = GatewayError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let timeout_ms = invocation.timeout_ms;
        let fut = self.inner.call(invocation);
        Box::pin(async move {
            let duration = Duration::from_millis(timeout_ms);
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(GatewayError::Timeout { timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use shakegate_core::{Args, RequestContext};
    use tower::ServiceExt;

    use super::*;

    /// A service that sleeps for a configurable duration before responding.
    #[derive(Clone)]
    struct SlowService {
        delay: Duration,
    }

    impl Service<Invocation> for SlowService {
        type Response = Value;
        type Error = GatewayError;
        type Future = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, invocation: Invocation) -> Self::Future {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(Value::from(invocation.call_id))
            })
        }
    }

    fn make_invocation(timeout_ms: u64) -> Invocation {
        Invocation {
            call_id: 1,
            operation: "get_rooms".to_string(),
            args: Args::new(),
            ctx: RequestContext::default(),
            timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_invocation_succeeds() {
        let svc = TimeoutLayer.layer(SlowService {
            delay: Duration::from_millis(10),
        });
        let result = svc.oneshot(make_invocation(5000)).await;
        assert_eq!(result, Ok(Value::from(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_invocation_times_out() {
        let svc = TimeoutLayer.layer(SlowService {
            delay: Duration::from_secs(60),
        });
        let result = svc.oneshot(make_invocation(100)).await;
        assert_eq!(result, Err(GatewayError::Timeout { timeout_ms: 100 }));
    }
}
