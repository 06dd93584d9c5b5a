//! Normalization of backend failures into the client-facing error.

use serde_json::Value;
use tracing::warn;

use super::backend::BackendFailure;
use super::operation::GatewayError;

/// Message used when a failure body carries no usable reason.
pub const GENERIC_FAILURE: &str = "request failed";

/// Converts backend failures into a uniform `GatewayError`.
///
/// All non-success statuses are treated alike: a 401 and a 500 differ
/// only in the reason text they carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorNormalizer;

impl ErrorNormalizer {
    /// Normalizes one failure.
    ///
    /// Reason extraction order: the body's string `reason` field, then its
    /// string `message` field, then [`GENERIC_FAILURE`]. Transport detail is
    /// logged and dropped.
    #[must_use]
    pub fn normalize(failure: &BackendFailure) -> GatewayError {
        match failure {
            BackendFailure::Status { status, body } => {
                let reason = Self::reason(body).unwrap_or(GENERIC_FAILURE);
                warn!(status = *status, reason = %reason, "backend rejected request");
                GatewayError::Backend {
                    reason: reason.to_string(),
                }
            }
            BackendFailure::Transport { detail } => {
                warn!(detail = %detail, "backend unreachable");
                GatewayError::Transport
            }
        }
    }

    fn reason(body: &Value) -> Option<&str> {
        ["reason", "message"]
            .iter()
            .find_map(|field| {
                body.get(field)
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
            })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn status(status: u16, body: Value) -> BackendFailure {
        BackendFailure::Status { status, body }
    }

    fn backend_reason(err: GatewayError) -> String {
        match err {
            GatewayError::Backend { reason } => reason,
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn prefers_reason_field() {
        let err = ErrorNormalizer::normalize(&status(
            401,
            json!({ "reason": "INVALID_CREDENTIALS", "message": "bad login" }),
        ));
        assert_eq!(backend_reason(err), "INVALID_CREDENTIALS");
    }

    #[test]
    fn falls_back_to_message_field() {
        let err = ErrorNormalizer::normalize(&status(500, json!({ "message": "room is full" })));
        assert_eq!(backend_reason(err), "room is full");
    }

    #[test]
    fn non_string_reason_falls_through() {
        let err = ErrorNormalizer::normalize(&status(
            400,
            json!({ "reason": { "code": 3 }, "message": "bad score" }),
        ));
        assert_eq!(backend_reason(err), "bad score");
    }

    #[test]
    fn empty_reason_falls_through_to_message() {
        let err = ErrorNormalizer::normalize(&status(
            400,
            json!({ "reason": "", "message": "room is full" }),
        ));
        assert_eq!(backend_reason(err), "room is full");
    }

    #[test]
    fn generic_message_without_structured_fields() {
        for body in [json!(null), json!("plain text"), json!({}), json!({ "reason": "" })] {
            let err = ErrorNormalizer::normalize(&status(503, body));
            assert_eq!(backend_reason(err), GENERIC_FAILURE);
        }
    }

    #[test]
    fn status_code_does_not_change_shape() {
        let body = json!({ "reason": "NOPE" });
        assert_eq!(
            ErrorNormalizer::normalize(&status(401, body.clone())),
            ErrorNormalizer::normalize(&status(500, body))
        );
    }

    #[test]
    fn transport_failure_hides_detail() {
        let err = ErrorNormalizer::normalize(&BackendFailure::Transport {
            detail: "tcp connect error: 10.0.0.3:8080 refused".to_string(),
        });
        assert_eq!(err, GatewayError::Transport);
        assert!(!err.to_client_error().message.contains("10.0.0.3"));
    }

    proptest! {
        #[test]
        fn transport_detail_never_reaches_client(detail in ".{1,64}") {
            let err = ErrorNormalizer::normalize(&BackendFailure::Transport { detail });
            prop_assert_eq!(err.to_client_error().message, "backend request failed");
        }

        #[test]
        fn string_reason_is_surfaced_verbatim(reason in "[A-Za-z_ ]{1,32}", code in 400u16..600) {
            let err = ErrorNormalizer::normalize(&status(code, json!({ "reason": reason.clone() })));
            prop_assert_eq!(err.to_client_error().message, reason);
        }
    }
}
