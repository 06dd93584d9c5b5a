use async_trait::async_trait;

use crate::service::backend::{BackendRequest, BackendResult};

/// The upstream service that performs the actual business logic.
///
/// Implementations: `HttpBackend` (reqwest), recording fakes (tests).
/// One call per invocation; implementations must not retry.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issues a single backend call and reports its outcome.
    async fn call(&self, request: BackendRequest) -> BackendResult;
}
