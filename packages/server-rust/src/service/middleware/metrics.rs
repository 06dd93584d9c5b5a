//! Metrics middleware for invocations.
//!
//! Records invocation duration and outcome in a `tracing` span and in the
//! `metrics` facade (`shakegate_operations_total`,
//! `shakegate_operation_duration_seconds`).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use serde_json::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{GatewayError, Invocation};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments invocations with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records invocation duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Invocation> for MetricsService<S>
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
        let operation = invocation.operation.clone();
        let call_id = invocation.call_id;

        let span = info_span!(
            "invocation",
            operation = %operation,
            call_id = call_id,
            request_id = %invocation.ctx.request_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(invocation);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.code(),
                };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                ::metrics::counter!(
                    "shakegate_operations_total",
                    "operation" => operation.clone(),
                    "outcome" => outcome,
                )
                .increment(1);
                ::metrics::histogram!(
                    "shakegate_operation_duration_seconds",
                    "operation" => operation.clone(),
                )
                .record(elapsed.as_secs_f64());

                tracing::info!(
                    operation = %operation,
                    call_id = call_id,
                    duration_ms = duration_ms,
                    outcome = outcome,
                    "invocation complete"
                );

                result
            }
            .instrument(span),
        )
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

    #[derive(Clone)]
    struct FixedService(Result<Value, GatewayError>);

    impl Service<Invocation> for FixedService {
        type Response = Value;
        type Error = GatewayError;
        type Future = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _invocation: Invocation) -> Self::Future {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    fn make_invocation() -> Invocation {
        Invocation {
            call_id: 9,
            operation: "check".to_string(),
            args: Args::new(),
            ctx: RequestContext::default(),
            timeout_ms: 1000,
        }
    }

    #[tokio::test]
    async fn passes_success_through() {
        let svc = MetricsLayer.layer(FixedService(Ok(Value::Bool(true))));
        assert_eq!(svc.oneshot(make_invocation()).await, Ok(Value::Bool(true)));
    }

    #[tokio::test]
    async fn passes_error_through() {
        let svc = MetricsLayer.layer(FixedService(Err(GatewayError::AuthMissing)));
        assert_eq!(
            svc.oneshot(make_invocation()).await,
            Err(GatewayError::AuthMissing)
        );
    }
}
