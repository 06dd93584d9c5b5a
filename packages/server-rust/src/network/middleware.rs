//! HTTP middleware stack for the gateway listener.
//!
//! Layers are listed outermost first: the first layer sees the request
//! first on the way in and the response last on the way out.

use axum::extract::DefaultBodyLimit;
use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Header carrying the per-request id. Also read by the gateway when it
/// builds the request context.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The composed layer type produced by [`build_http_layers`].
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            CorsLayer,
            Stack<
                CompressionLayer,
                Stack<
                    TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
                    Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
                >,
            >,
        >,
    >,
>;

/// Builds the transport-level middleware stack.
///
/// **Ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID `X-Request-Id` unless the client sent one
/// 2. `Tracing` -- one span per HTTP request
/// 3. `Compression` -- gzip response bodies
/// 4. `CORS` -- origins from configuration
/// 5. `Timeout` -- 408 after `request_timeout`
/// 6. `PropagateRequestId` -- echoes `X-Request-Id` on the response
///
/// The body size cap is applied separately by [`body_limit`], on the
/// routes. Per-operation concerns (timeouts, metrics) live in the dispatch
/// pipeline.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// Caps request bodies read by extractors at `max_body_bytes`; larger
/// bodies are answered with 413.
#[must_use]
pub fn body_limit(config: &NetworkConfig) -> DefaultBodyLimit {
    DefaultBodyLimit::max(config.max_body_bytes)
}

/// `"*"` anywhere in the list allows any origin; otherwise only the
/// parseable entries are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
