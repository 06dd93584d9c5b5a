//! Composition of the dispatch pipeline and the operation broker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shakegate_core::messages::{OperationRequest, OperationResponse};
use shakegate_core::{Args, RequestContext};
use tower::ServiceExt;
use tracing::debug;
use uuid::Uuid;

use super::auth::AuthForwarder;
use super::broker::OperationBroker;
use super::config::GatewayConfig;
use super::dispatch::ResolverDispatch;
use super::middleware::{build_dispatch_pipeline, DispatchPipeline};
use super::operation::Invocation;
use super::registry::OperationRegistry;
use crate::traits::Backend;

/// The gateway core as seen by transport handlers.
///
/// Owns exactly one broker; the same instance serves `scheduleOperation`
/// through the pipeline and the subscription channel through
/// [`Gateway::broker`]. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    pipeline: DispatchPipeline,
    broker: Arc<OperationBroker>,
    auth: AuthForwarder,
    operation_timeout_ms: u64,
    call_ids: Arc<AtomicU64>,
}

impl Gateway {
    /// Wires registry, broker, dispatch, and middleware from `config`.
    #[must_use]
    pub fn new(config: &GatewayConfig, backend: Arc<dyn Backend>) -> Self {
        let registry = Arc::new(OperationRegistry::from_config(config));
        let broker = OperationBroker::from_config(config);
        let auth = AuthForwarder::new(config.auth_header.clone());
        let dispatch =
            ResolverDispatch::new(registry, backend, Arc::clone(&broker), auth.clone());

        Self {
            pipeline: build_dispatch_pipeline(dispatch),
            broker,
            auth,
            operation_timeout_ms: config.operation_timeout_ms,
            call_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    #[must_use]
    pub fn broker(&self) -> &Arc<OperationBroker> {
        &self.broker
    }

    #[must_use]
    pub fn auth(&self) -> &AuthForwarder {
        &self.auth
    }

    /// Builds the request context for an inbound call from raw headers,
    /// extracting the credential once. Calls arriving without an
    /// `x-request-id` get a fresh UUID.
    pub fn request_context<'a, I>(&self, headers: I) -> RequestContext
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = self.auth.populate(RequestContext::from_headers(headers));
        if ctx.request_id.is_empty() {
            ctx.request_id = Uuid::new_v4().to_string();
        }
        ctx
    }

    /// Runs one operation through the pipeline and renders the response
    /// envelope. Never fails: errors become the `errors` list.
    pub async fn invoke(&self, request: OperationRequest, ctx: RequestContext) -> OperationResponse {
        let OperationRequest {
            operation_name,
            variables,
        } = request;
        let invocation = self.invocation(operation_name.clone(), variables, ctx);

        match self.pipeline.clone().oneshot(invocation).await {
            Ok(result) => OperationResponse::success(&operation_name, result),
            Err(err) => {
                debug!(operation = %operation_name, error = %err, "invocation failed");
                OperationResponse::failure(err.to_client_error())
            }
        }
    }

    fn invocation(&self, operation: String, args: Args, ctx: RequestContext) -> Invocation {
        Invocation {
            call_id: self.call_ids.fetch_add(1, Ordering::Relaxed),
            operation,
            args,
            ctx,
            timeout_ms: self.operation_timeout_ms,
        }
    }
}
