//! `shakegate` — serves the gateway over HTTP and WebSocket.
//!
//! Parses CLI flags (with environment fallbacks), initializes logging and
//! the optional Prometheus exporter, wires the gateway to the HTTP backend,
//! and runs until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use shakegate_server::network::{NetworkConfig, NetworkModule, TlsConfig};
use shakegate_server::service::{Gateway, GatewayConfig, HttpBackend};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "shakegate", version, about = "Typed operation gateway over an HTTP backend")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "SHAKEGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "SHAKEGATE_PORT", default_value_t = 4000)]
    port: u16,

    /// Base URL of the backend service.
    #[arg(long, env = "SHAKEGATE_BACKEND_URL")]
    backend_url: String,

    #[arg(long, env = "SHAKEGATE_BACKEND_TIMEOUT_MS", default_value_t = 10_000)]
    backend_timeout_ms: u64,

    /// Deadline for a whole operation, backend call included.
    #[arg(long, env = "SHAKEGATE_OPERATION_TIMEOUT_MS", default_value_t = 15_000)]
    operation_timeout_ms: u64,

    /// Delay before a scheduled operation reports completion.
    #[arg(long, env = "SHAKEGATE_SCHEDULE_DELAY_MS", default_value_t = 5_000)]
    schedule_delay_ms: u64,

    /// Inbound header carrying the client credential.
    #[arg(long, env = "SHAKEGATE_AUTH_HEADER", default_value = "authorization")]
    auth_header: String,

    /// Require a credential for this operation (repeatable).
    #[arg(long = "require-auth", value_name = "OPERATION")]
    require_auth: Vec<String>,

    /// Serve this operation without a credential (repeatable).
    #[arg(long = "skip-auth", value_name = "OPERATION")]
    skip_auth: Vec<String>,

    /// Remove this operation from the API (repeatable).
    #[arg(long = "disable", value_name = "OPERATION")]
    disable: Vec<String>,

    /// Allowed CORS origin (repeatable). Defaults to any origin.
    #[arg(long = "cors-origin", value_name = "ORIGIN")]
    cors_origins: Vec<String>,

    #[arg(long, env = "SHAKEGATE_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "SHAKEGATE_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "SHAKEGATE_METRICS_PORT")]
    metrics_port: Option<u16>,

    #[arg(long, env = "SHAKEGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig {
            backend_url: self.backend_url.clone(),
            backend_timeout: Duration::from_millis(self.backend_timeout_ms),
            operation_timeout_ms: self.operation_timeout_ms,
            schedule_delay: Duration::from_millis(self.schedule_delay_ms),
            auth_header: self.auth_header.clone(),
            ..GatewayConfig::default()
        };
        for name in &self.require_auth {
            config.auth_overrides.insert(name.clone(), true);
        }
        for name in &self.skip_auth {
            config.auth_overrides.insert(name.clone(), false);
        }
        config.disabled_operations.extend(self.disable.iter().cloned());
        config
    }

    fn network_config(&self) -> NetworkConfig {
        let mut config = NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            ..NetworkConfig::default()
        };
        if !self.cors_origins.is_empty() {
            config.cors_origins.clone_from(&self.cors_origins);
        }
        if let (Some(cert_path), Some(key_path)) = (&self.tls_cert, &self.tls_key) {
            config.tls = Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            });
        }
        config
    }
}

fn setup_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}

// Backend calls and timers are all I/O bound; one thread is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing(args.log_format);
    info!(?args, "starting shakegate");

    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let gateway_config = args.gateway_config();
    let backend = HttpBackend::new(&gateway_config.backend_url, gateway_config.backend_timeout)?;
    let gateway = Gateway::new(&gateway_config, Arc::new(backend));

    let mut network = NetworkModule::new(args.network_config(), gateway);
    let port = network.start().await?;
    info!(port, backend = %gateway_config.backend_url, "shakegate ready");

    network.serve(shutdown_signal()).await?;
    info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["shakegate", "--backend-url", "http://backend:8080"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.port, 4000);
        assert_eq!(args.log_format, LogFormat::Text);

        let gateway = args.gateway_config();
        assert_eq!(gateway.schedule_delay, Duration::from_secs(5));
        assert!(gateway.auth_overrides.is_empty());

        let network = args.network_config();
        assert_eq!(network.cors_origins, vec!["*".to_string()]);
        assert!(network.tls.is_none());
    }

    #[test]
    fn auth_overrides_and_disables() {
        let args = parse(&[
            "--require-auth",
            "post_shake",
            "--skip-auth",
            "check",
            "--disable",
            "post_register",
        ]);
        let config = args.gateway_config();
        assert_eq!(config.auth_overrides.get("post_shake"), Some(&true));
        assert_eq!(config.auth_overrides.get("check"), Some(&false));
        assert!(config.disabled_operations.contains("post_register"));
    }

    #[test]
    fn tls_requires_both_paths() {
        let argv = [
            "shakegate",
            "--backend-url",
            "http://backend:8080",
            "--tls-cert",
            "cert.pem",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn backend_url_is_required() {
        assert!(Args::try_parse_from(["shakegate"]).is_err());
    }
}
