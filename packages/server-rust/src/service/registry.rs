//! Declarative table of exposed operations.

use std::collections::HashMap;

use shakegate_core::HttpMethod;
use tracing::warn;

use super::config::GatewayConfig;
use super::operation::{names, GatewayError, OperationDescriptor};

// ---------------------------------------------------------------------------
// Default operation table
// ---------------------------------------------------------------------------

/// Every operation the gateway knows how to serve, with its default auth
/// requirement. Deployments adjust auth and enablement through
/// [`GatewayConfig`].
#[must_use]
pub fn default_operations() -> Vec<OperationDescriptor> {
    use HttpMethod::{Get, Post};

    vec![
        OperationDescriptor::backend(names::POST_LOGIN, Post, "/login", false, &["email", "password"]),
        OperationDescriptor::backend(
            names::POST_REGISTER,
            Post,
            "/register",
            false,
            &["email", "name", "password"],
        ),
        OperationDescriptor::backend(names::CHECK, Get, "/check", true, &[]),
        OperationDescriptor::backend(names::GET_USER_ID, Get, "/user", true, &[]),
        OperationDescriptor::backend(names::GET_ROOMS, Get, "/rooms", false, &[]),
        OperationDescriptor::backend(names::POST_MATCHING, Post, "/matching", true, &["is_leave"]),
        OperationDescriptor::backend(names::POST_READY, Post, "/ready", true, &["room_id"]),
        OperationDescriptor::backend(
            names::POST_RESULT,
            Post,
            "/result",
            true,
            &["room_id", "score"],
        ),
        OperationDescriptor::backend(names::POST_SHAKE, Post, "/shake", false, &["power"]),
        OperationDescriptor::schedule(names::SCHEDULE_OPERATION, &["name"]),
    ]
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Immutable lookup table from operation name to descriptor.
///
/// Built once at startup; shared read-only by every invocation.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, OperationDescriptor>,
}

impl OperationRegistry {
    /// Creates a registry holding exactly the given descriptors.
    ///
    /// A later descriptor with the same name replaces an earlier one.
    pub fn new(descriptors: impl IntoIterator<Item = OperationDescriptor>) -> Self {
        Self {
            operations: descriptors.into_iter().map(|d| (d.name, d)).collect(),
        }
    }

    /// Builds the deployment's registry from the default table.
    ///
    /// Applies `auth_overrides` and drops `disabled_operations`. Names in
    /// the configuration that match no known operation are logged and
    /// ignored.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut registry = Self::new(default_operations());

        for (name, requires_auth) in &config.auth_overrides {
            match registry.operations.get_mut(name.as_str()) {
                Some(descriptor) => descriptor.requires_auth = *requires_auth,
                None => warn!(operation = %name, "auth override for unknown operation ignored"),
            }
        }

        for name in &config.disabled_operations {
            if registry.operations.remove(name.as_str()).is_none() {
                warn!(operation = %name, "cannot disable unknown operation");
            }
        }

        registry
    }

    /// Resolves an operation by name.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnknownOperation` if no descriptor is registered
    /// under `name` (including operations disabled by configuration).
    pub fn lookup(&self, name: &str) -> Result<&OperationDescriptor, GatewayError> {
        self.operations
            .get(name)
            .ok_or_else(|| GatewayError::UnknownOperation {
                name: name.to_string(),
            })
    }

    /// Registered operation names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new(default_operations())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::operation::Target;

    fn backend_target(registry: &OperationRegistry, name: &str) -> (HttpMethod, &'static str) {
        match registry.lookup(name).unwrap().target {
            Target::Backend { method, path } => (method, path),
            Target::Schedule => panic!("{name} is not a backend operation"),
        }
    }

    #[test]
    fn default_table_covers_all_operations() {
        let registry = OperationRegistry::default();
        assert_eq!(
            registry.names(),
            vec![
                "check",
                "get_rooms",
                "get_userID",
                "post_login",
                "post_matching",
                "post_ready",
                "post_register",
                "post_result",
                "post_shake",
                "scheduleOperation",
            ]
        );
    }

    #[test]
    fn backend_methods_and_paths() {
        let registry = OperationRegistry::default();
        assert_eq!(backend_target(&registry, "post_login"), (HttpMethod::Post, "/login"));
        assert_eq!(backend_target(&registry, "post_register"), (HttpMethod::Post, "/register"));
        assert_eq!(backend_target(&registry, "check"), (HttpMethod::Get, "/check"));
        assert_eq!(backend_target(&registry, "get_userID"), (HttpMethod::Get, "/user"));
        assert_eq!(backend_target(&registry, "get_rooms"), (HttpMethod::Get, "/rooms"));
        assert_eq!(backend_target(&registry, "post_matching"), (HttpMethod::Post, "/matching"));
        assert_eq!(backend_target(&registry, "post_ready"), (HttpMethod::Post, "/ready"));
        assert_eq!(backend_target(&registry, "post_result"), (HttpMethod::Post, "/result"));
        assert_eq!(backend_target(&registry, "post_shake"), (HttpMethod::Post, "/shake"));
    }

    #[test]
    fn default_auth_requirements() {
        let registry = OperationRegistry::default();
        let requires = |name: &str| registry.lookup(name).unwrap().requires_auth;

        for name in ["check", "get_userID", "post_matching", "post_ready", "post_result"] {
            assert!(requires(name), "{name} should require auth");
        }
        for name in ["post_login", "post_register", "get_rooms", "post_shake", "scheduleOperation"] {
            assert!(!requires(name), "{name} should not require auth");
        }
    }

    #[test]
    fn schedule_operation_is_local() {
        let registry = OperationRegistry::default();
        let descriptor = registry.lookup("scheduleOperation").unwrap();
        assert_eq!(descriptor.target, Target::Schedule);
        assert_eq!(descriptor.fields, &["name"]);
    }

    #[test]
    fn lookup_unknown_operation_fails() {
        let registry = OperationRegistry::default();
        let err = registry.lookup("post_logout").unwrap_err();
        assert_eq!(
            err,
            GatewayError::UnknownOperation {
                name: "post_logout".to_string()
            }
        );
    }

    #[test]
    fn config_overrides_auth_requirement() {
        let mut config = GatewayConfig::default();
        config.auth_overrides.insert("post_shake".to_string(), true);
        config.auth_overrides.insert("post_ready".to_string(), false);
        config.auth_overrides.insert("no_such_op".to_string(), true);

        let registry = OperationRegistry::from_config(&config);
        assert!(registry.lookup("post_shake").unwrap().requires_auth);
        assert!(!registry.lookup("post_ready").unwrap().requires_auth);
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn config_disables_operations() {
        let mut config = GatewayConfig::default();
        config.disabled_operations.insert("post_register".to_string());

        let registry = OperationRegistry::from_config(&config);
        assert_eq!(registry.len(), 9);
        assert!(matches!(
            registry.lookup("post_register"),
            Err(GatewayError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn later_descriptor_replaces_earlier() {
        let registry = OperationRegistry::new([
            OperationDescriptor::backend("op", HttpMethod::Get, "/a", false, &[]),
            OperationDescriptor::backend("op", HttpMethod::Post, "/b", true, &[]),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(backend_target(&registry, "op"), (HttpMethod::Post, "/b"));
    }
}
