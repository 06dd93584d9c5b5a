//! Operation descriptors, invocations, and the gateway error taxonomy.

use serde_json::Value;
use shakegate_core::messages::{codes, ClientError};
use shakegate_core::{Args, HttpMethod, RequestContext};

/// Builds the backend payload from operation arguments.
///
/// Returns `Ok(None)` for calls that carry no body.
pub type RequestMapper = fn(&'static [&'static str], &Args) -> Result<Option<Value>, GatewayError>;

/// Turns a successful backend body into the client result.
pub type ResponseMapper = fn(Value) -> Value;

/// Exposed operation names.
pub mod names {
    pub const POST_LOGIN: &str = "post_login";
    pub const POST_REGISTER: &str = "post_register";
    pub const CHECK: &str = "check";
    pub const GET_USER_ID: &str = "get_userID";
    pub const GET_ROOMS: &str = "get_rooms";
    pub const POST_MATCHING: &str = "post_matching";
    pub const POST_READY: &str = "post_ready";
    pub const POST_RESULT: &str = "post_result";
    pub const POST_SHAKE: &str = "post_shake";
    pub const SCHEDULE_OPERATION: &str = "scheduleOperation";
}

/// Where an operation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A single HTTP call to the backend.
    Backend {
        method: HttpMethod,
        path: &'static str,
    },
    /// Arms a completion timer on the operation broker; no backend call.
    Schedule,
}

/// Static description of one exposed operation.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub target: Target,
    pub requires_auth: bool,
    /// Argument fields copied into the backend payload.
    pub fields: &'static [&'static str],
    pub request_mapper: RequestMapper,
    pub response_mapper: ResponseMapper,
}

impl OperationDescriptor {
    /// Descriptor for a backend call with pass-through payload and
    /// identity response mapping.
    #[must_use]
    pub fn backend(
        name: &'static str,
        method: HttpMethod,
        path: &'static str,
        requires_auth: bool,
        fields: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            target: Target::Backend { method, path },
            requires_auth,
            fields,
            request_mapper: pick_fields,
            response_mapper: identity,
        }
    }

    /// Descriptor for a local scheduling action: no backend call, no
    /// credential required, acknowledgement returned unchanged.
    #[must_use]
    pub fn schedule(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            name,
            target: Target::Schedule,
            requires_auth: false,
            fields,
            request_mapper: pick_fields,
            response_mapper: identity,
        }
    }

    /// Maps `args` into the backend payload for this operation.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidArguments` when a required field is absent.
    pub fn map_request(&self, args: &Args) -> Result<Option<Value>, GatewayError> {
        (self.request_mapper)(self.fields, args)
    }

    #[must_use]
    pub fn map_response(&self, body: Value) -> Value {
        (self.response_mapper)(body)
    }
}

/// Copies the listed fields from `args` into a JSON object payload.
///
/// An empty field list produces no body. A listed field that is absent
/// from `args` is an input error; explicit `null` is passed through.
///
/// # Errors
///
/// Returns `GatewayError::InvalidArguments` naming the first missing field.
pub fn pick_fields(
    fields: &'static [&'static str],
    args: &Args,
) -> Result<Option<Value>, GatewayError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut payload = serde_json::Map::with_capacity(fields.len());
    for field in fields {
        let value = args
            .get(*field)
            .ok_or_else(|| GatewayError::InvalidArguments {
                reason: format!("missing argument `{field}`"),
            })?;
        payload.insert((*field).to_string(), value.clone());
    }
    Ok(Some(Value::Object(payload)))
}

/// Returns the backend body unchanged.
#[must_use]
pub fn identity(body: Value) -> Value {
    body
}

/// One client invocation travelling through the dispatch pipeline.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub call_id: u64,
    pub operation: String,
    pub args: Args,
    pub ctx: RequestContext,
    pub timeout_ms: u64,
}

/// Errors an invocation can fail with.
///
/// Every variant is resolved at the invocation boundary; nothing is
/// retried locally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("authorization required")]
    AuthMissing,
    #[error("{reason}")]
    Backend { reason: String },
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("backend request failed")]
    Transport,
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl GatewayError {
    /// Stable error code for the client-facing `extensions.code`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthMissing => codes::UNAUTHENTICATED,
            Self::Backend { .. } => codes::BACKEND_ERROR,
            Self::UnknownOperation { .. } => codes::UNKNOWN_OPERATION,
            Self::Transport | Self::Timeout { .. } => codes::TRANSPORT_ERROR,
            Self::InvalidArguments { .. } => codes::BAD_USER_INPUT,
        }
    }

    /// Converts into the single client-visible error shape.
    ///
    /// A timeout is indistinguishable from any other transport failure.
    #[must_use]
    pub fn to_client_error(&self) -> ClientError {
        match self {
            Self::Timeout { .. } => ClientError::new(self.code(), Self::Transport.to_string()),
            _ => ClientError::new(self.code(), self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            _ => panic!("args must be an object"),
        }
    }

    #[test]
    fn pick_fields_copies_only_listed_fields() {
        let payload = pick_fields(
            &["email", "password"],
            &args(json!({ "email": "a@b.c", "password": "pw", "extra": 1 })),
        )
        .unwrap();
        assert_eq!(payload, Some(json!({ "email": "a@b.c", "password": "pw" })));
    }

    #[test]
    fn pick_fields_without_fields_yields_no_body() {
        assert_eq!(pick_fields(&[], &args(json!({ "x": 1 }))).unwrap(), None);
    }

    #[test]
    fn pick_fields_missing_field_is_input_error() {
        let err = pick_fields(&["room_id", "score"], &args(json!({ "room_id": 3 }))).unwrap_err();
        assert_eq!(
            err,
            GatewayError::InvalidArguments {
                reason: "missing argument `score`".to_string()
            }
        );
    }

    #[test]
    fn pick_fields_passes_explicit_null() {
        let payload = pick_fields(&["is_leave"], &args(json!({ "is_leave": null }))).unwrap();
        assert_eq!(payload, Some(json!({ "is_leave": null })));
    }

    #[test]
    fn schedule_descriptor_is_local() {
        let descriptor = OperationDescriptor::schedule("scheduleOperation", &["name"]);
        assert_eq!(descriptor.target, Target::Schedule);
        assert!(!descriptor.requires_auth);
        assert_eq!(
            descriptor.map_request(&args(json!({ "name": "X" }))).unwrap(),
            Some(json!({ "name": "X" }))
        );
        assert_eq!(descriptor.map_response(json!("ack")), json!("ack"));
    }

    #[test]
    fn backend_error_message_is_reason_verbatim() {
        let err = GatewayError::Backend {
            reason: "INVALID_CREDENTIALS".to_string(),
        };
        let client = err.to_client_error();
        assert_eq!(client.message, "INVALID_CREDENTIALS");
        assert_eq!(client.extensions.code, codes::BACKEND_ERROR);
    }

    #[test]
    fn timeout_surfaces_as_transport_failure() {
        let client = GatewayError::Timeout { timeout_ms: 50 }.to_client_error();
        assert_eq!(client, GatewayError::Transport.to_client_error());
    }

    #[test]
    fn auth_missing_code() {
        assert_eq!(GatewayError::AuthMissing.code(), codes::UNAUTHENTICATED);
    }
}
