//! `POST /graphql`: one operation per request.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use shakegate_core::messages::{codes, ClientError, OperationRequest, OperationResponse};
use tracing::debug;

use super::AppState;

/// Runs the requested operation through the gateway.
///
/// Invocation failures still answer 200 with `data: null` and a populated
/// `errors` list. Once shutdown has begun, new requests get 503.
pub async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OperationRequest>,
) -> Response {
    if !state.shutdown.health_state().accepts_work() {
        let body = OperationResponse::failure(ClientError::new(
            codes::SHUTTING_DOWN,
            "server is shutting down",
        ));
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    let _guard = state.shutdown.in_flight_guard();
    let ctx = state.request_context(&headers);
    debug!(
        operation = %request.operation_name,
        request_id = %ctx.request_id,
        "operation received"
    );

    Json(state.gateway.invoke(request, ctx).await).into_response()
}
