use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Gateway-level configuration for operation dispatch and scheduling.
///
/// Controls the backend location, call deadlines, the broker's completion
/// delay, and which operations this deployment exposes.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the backend service, e.g. `http://backend:8080`.
    pub backend_url: String,
    /// Deadline for a single backend HTTP call.
    pub backend_timeout: Duration,
    /// Deadline for a whole invocation through the dispatch pipeline.
    pub operation_timeout_ms: u64,
    /// Delay between accepting a scheduled operation and publishing its
    /// completion event.
    pub schedule_delay: Duration,
    /// Capacity of each subscriber's delivery channel.
    pub subscriber_channel_capacity: usize,
    /// Inbound header that carries the client credential.
    pub auth_header: String,
    /// Per-deployment overrides of an operation's `requires_auth` flag.
    pub auth_overrides: BTreeMap<String, bool>,
    /// Operations removed from the registry in this deployment.
    pub disabled_operations: BTreeSet<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".to_string(),
            backend_timeout: Duration::from_secs(10),
            operation_timeout_ms: 15_000,
            schedule_delay: Duration::from_secs(5),
            subscriber_channel_capacity: 64,
            auth_header: "authorization".to_string(),
            auth_overrides: BTreeMap::new(),
            disabled_operations: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.backend_timeout, Duration::from_secs(10));
        assert_eq!(config.operation_timeout_ms, 15_000);
        assert_eq!(config.schedule_delay, Duration::from_secs(5));
        assert_eq!(config.auth_header, "authorization");
        assert!(config.auth_overrides.is_empty());
        assert!(config.disabled_operations.is_empty());
    }
}
