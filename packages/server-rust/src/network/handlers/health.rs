//! Health, liveness, and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Detailed health as JSON.
///
/// Always 200; the `state` field tells a draining server apart from a
/// healthy one.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let broker = state.gateway.broker();

    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "connections": state.registry.count(),
        "subscribers": broker.subscriber_count(),
        "pending_operations": broker.pending_operations(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: 200 while the process responds at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only in `Ready`, 503 while starting or draining.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::test_support::test_state;
    use crate::network::ConnectionConfig;

    #[tokio::test]
    async fn health_reports_all_fields() {
        let state = test_state();
        state.shutdown.set_ready();

        let json = health_handler(State(state)).await.0;

        assert_eq!(json["state"], "ready");
        assert_eq!(json["connections"], 0);
        assert_eq!(json["subscribers"], 0);
        assert_eq!(json["pending_operations"], 0);
        assert_eq!(json["in_flight"], 0);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_reports_draining_state() {
        let state = test_state();
        state.shutdown.set_ready();
        state.shutdown.trigger_shutdown();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "draining");
    }

    #[tokio::test]
    async fn health_counts_connections_and_subscribers() {
        let state = test_state();
        let (_handle, _rx) = state.registry.register(&ConnectionConfig::default());
        let _subscription = state.gateway.broker().subscribe();
        let _guard = state.shutdown.in_flight_guard();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["connections"], 1);
        assert_eq!(json["subscribers"], 1);
        assert_eq!(json["in_flight"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn health_counts_pending_operations() {
        let state = test_state();
        state.gateway.broker().schedule("deploy");

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["pending_operations"], 1);
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
