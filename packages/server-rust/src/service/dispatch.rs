//! Resolver dispatch: executes one operation end to end.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use shakegate_core::{Args, RequestContext};
use tower::Service;
use tracing::debug;

use super::auth::AuthForwarder;
use super::backend::BackendRequest;
use super::broker::OperationBroker;
use super::normalize::ErrorNormalizer;
use super::operation::{GatewayError, Invocation, OperationDescriptor, Target};
use super::registry::OperationRegistry;
use crate::traits::Backend;

type DispatchFuture = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

/// Executes operations against the registry, the backend, and the broker.
///
/// Cheap to clone: all collaborators are shared via `Arc`.
#[derive(Clone)]
pub struct ResolverDispatch {
    registry: Arc<OperationRegistry>,
    backend: Arc<dyn Backend>,
    broker: Arc<OperationBroker>,
    auth: AuthForwarder,
}

impl ResolverDispatch {
    #[must_use]
    pub fn new(
        registry: Arc<OperationRegistry>,
        backend: Arc<dyn Backend>,
        broker: Arc<OperationBroker>,
        auth: AuthForwarder,
    ) -> Self {
        Self {
            registry,
            backend,
            broker,
            auth,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Executes a single invocation.
    ///
    /// Steps run strictly in order: resolve the descriptor, check the
    /// credential, map the request, issue exactly one backend call (or arm
    /// the schedule timer), then map the response or normalize the failure.
    ///
    /// # Errors
    ///
    /// - `UnknownOperation` if `operation` is not registered
    /// - `AuthMissing` if the operation requires a credential and none was
    ///   supplied; the backend is not contacted
    /// - `InvalidArguments` if the request mapper rejects `args`
    /// - `Backend` / `Transport` for normalized backend failures
    pub async fn execute(
        &self,
        operation: &str,
        args: &Args,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let descriptor = self.registry.lookup(operation)?;

        let token = if descriptor.requires_auth {
            let token = ctx
                .token
                .clone()
                .or_else(|| self.auth.extract(ctx))
                .ok_or(GatewayError::AuthMissing)?;
            Some(token)
        } else {
            None
        };

        let payload = descriptor.map_request(args)?;

        match descriptor.target {
            Target::Schedule => self.schedule(descriptor, payload.as_ref()),
            Target::Backend { method, path } => {
                let body = if method.has_body() { payload } else { None };
                let mut request = BackendRequest::new(method, path, body);
                if let Some(token) = token {
                    request = AuthForwarder::attach(&token, request);
                }

                debug!(
                    operation = %descriptor.name,
                    request_id = %ctx.request_id,
                    method = %method,
                    path = %path,
                    "calling backend"
                );

                match self.backend.call(request).await {
                    Ok(body) => Ok(descriptor.map_response(body)),
                    Err(failure) => Err(ErrorNormalizer::normalize(&failure)),
                }
            }
        }
    }

    fn schedule(
        &self,
        descriptor: &OperationDescriptor,
        payload: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let name = payload
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidArguments {
                reason: "argument `name` must be a string".to_string(),
            })?;

        let ack = self.broker.schedule(name);
        Ok(descriptor.map_response(Value::String(ack)))
    }
}

impl Service<Invocation> for ResolverDispatch {
    type Response = Value;
    type Error = GatewayError;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            this.execute(&invocation.operation, &invocation.args, &invocation.ctx)
                .await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
