//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the listener, and
//! `serve()` accepts connections until shutdown. Binding separately lets
//! callers learn the OS-assigned port before serving.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::connection::{ConnectionRegistry, OutboundMessage, CLOSE_GOING_AWAY};
use super::handlers::{
    graphql_handler, health_handler, liveness_handler, readiness_handler, ws_upgrade_handler,
    AppState,
};
use super::middleware::{body_limit, build_http_layers};
use super::shutdown::ShutdownController;
use crate::service::Gateway;

/// Owns the HTTP/WebSocket server lifecycle around one [`Gateway`].
pub struct NetworkModule {
    config: NetworkConfig,
    gateway: Gateway,
    listener: Option<TcpListener>,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, gateway: Gateway) -> Self {
        Self {
            config,
            gateway,
            listener: None,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /graphql` -- queries and mutations
    /// - `GET /subscriptions` -- WebSocket subscription channel
    /// - `GET /health`, `/health/live`, `/health/ready`
    pub fn build_router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            gateway: self.gateway.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/graphql", post(graphql_handler))
            .route("/subscriptions", get(ws_upgrade_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .layer(body_limit(&self.config))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener and returns the bound port, which differs
    /// from the configured one when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then drains.
    ///
    /// After the signal:
    /// 1. Health state moves to Draining and new work is refused
    /// 2. Every subscription socket receives a Close frame
    /// 3. In-flight requests get up to `drain_timeout` to finish
    /// 4. The broker is torn down: pending timers aborted, subscribers cleared
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, TLS material cannot be
    /// loaded, or the server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let Self {
            config,
            gateway,
            listener,
            registry,
            shutdown: shutdown_ctrl,
            ..
        } = self;
        let listener = listener.context("start() must be called before serve()")?;

        shutdown_ctrl.set_ready();

        // The signal drives the controller, which in turn notifies every
        // open socket through its shutdown receiver.
        let ctrl = Arc::clone(&shutdown_ctrl);
        let shutdown = async move {
            shutdown.await;
            ctrl.trigger_shutdown();
        };

        if let Some(ref tls) = config.tls {
            serve_tls(listener, router, tls, shutdown).await?;
        } else {
            info!("Serving plain HTTP/WS connections");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await?;
        }

        drain(&config, &registry, &shutdown_ctrl, &gateway).await;
        Ok(())
    }
}

/// Serves TLS connections with `axum-server` over the pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .context("failed to load TLS certificates")?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!("Serving TLS connections on {}", addr);

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

/// Closes remaining sockets, waits for in-flight requests, and tears down
/// the broker.
async fn drain(
    config: &NetworkConfig,
    registry: &ConnectionRegistry,
    shutdown_ctrl: &ShutdownController,
    gateway: &Gateway,
) {
    shutdown_ctrl.trigger_shutdown();

    let handles = registry.drain_all();
    if !handles.is_empty() {
        info!("Closing {} subscription sockets", handles.len());
        for handle in &handles {
            let _ = handle.try_send(OutboundMessage::Close {
                code: CLOSE_GOING_AWAY,
                reason: "server shutting down".to_string(),
            });
        }
    }

    if shutdown_ctrl.wait_for_drain(config.drain_timeout).await {
        info!("All in-flight requests drained");
    } else {
        warn!(
            in_flight = shutdown_ctrl.in_flight_count(),
            "Drain timeout expired with in-flight requests remaining"
        );
    }

    gateway.broker().teardown();
}
