//! GraphQL-shaped envelopes for the HTTP operation endpoint.
//!
//! A request names one operation and carries its variables; a response
//! holds either `data` keyed by the operation name or a list of errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Args;

/// Stable machine-readable error codes carried in `extensions.code`.
pub mod codes {
    /// A credential was required but not supplied.
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    /// The backend rejected the call with a structured reason.
    pub const BACKEND_ERROR: &str = "BACKEND_ERROR";
    /// The backend could not be reached or did not answer in time.
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    /// The operation is not exposed by this deployment.
    pub const UNKNOWN_OPERATION: &str = "UNKNOWN_OPERATION";
    /// Operation arguments were missing or malformed.
    pub const BAD_USER_INPUT: &str = "BAD_USER_INPUT";
    /// The server is draining and accepts no new work.
    pub const SHUTTING_DOWN: &str = "SHUTTING_DOWN";
}

/// Body of `POST /graphql`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Exposed operation name, e.g. `post_login` or `get_rooms`.
    pub operation_name: String,
    /// Operation arguments. Absent means no arguments.
    #[serde(default)]
    pub variables: Args,
}

/// The single client-visible error shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientError {
    pub message: String,
    pub extensions: ErrorExtensions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    pub code: String,
}

impl ClientError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: ErrorExtensions {
                code: code.to_string(),
            },
        }
    }
}

/// Response body of `POST /graphql`.
///
/// Exactly one of `data` (non-null) or `errors` (non-empty) is populated;
/// an invocation never yields a partial success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<ClientError>,
}

impl OperationResponse {
    /// Wraps `result` as `{ "<operation_name>": result }`.
    #[must_use]
    pub fn success(operation_name: &str, result: Value) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(operation_name.to_string(), result);
        Self {
            data: Value::Object(data),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(error: ClientError) -> Self {
        Self {
            data: Value::Null,
            errors: vec![error],
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
