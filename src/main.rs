//! Origin-keyed dynamic reverse proxy.
//!
//! ```text
//!     GET /?url=https://example.com/img.png
//!         │
//!         ▼
//!   ┌───────────┐   ┌──────────────┐   ┌────────────────────┐
//!   │   gate    │──▶│   resolver   │──▶│  handler registry  │
//!   │ (OPTIONS, │   │ (origin key) │   │ origin → handler   │
//!   │  ?url=)   │   └──────────────┘   └─────────┬──────────┘
//!   └───────────┘                                │
//!                                                ▼
//!                                      ┌────────────────────┐
//!     ◀────── response + CORS headers ─│     forwarder      │──▶ https://example.com/img.png
//!                                      └────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use origin_proxy::config::{load_config, validate_config, ConfigError, LogFormat, ProxyConfig};
use origin_proxy::observability::{logging, metrics};
use origin_proxy::lifecycle::{signals, Shutdown};
use origin_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "origin-proxy")]
#[command(about = "Dynamic reverse proxy that forwards /?url=<target> to the target's origin", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to listen on.
    #[arg(long, env = "PROXY_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "PROXY_PORT")]
    port: Option<u16>,

    /// Upstream inactivity timeout in milliseconds.
    #[arg(long, env = "PROXY_UPSTREAM_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Verify upstream TLS certificates.
    #[arg(long, env = "PROXY_VERIFY_TLS")]
    verify_tls: Option<bool>,

    /// Log output format.
    #[arg(long, env = "PROXY_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Expose Prometheus metrics on this address.
    #[arg(long, env = "PROXY_METRICS_ADDRESS")]
    metrics_address: Option<String>,
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format `{other}` (expected pretty or json)")),
    }
}

impl Cli {
    /// Load the file (or defaults) and apply flag/environment overrides.
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.upstream.timeout_ms = timeout_ms;
        }
        if let Some(verify_tls) = self.verify_tls {
            config.upstream.verify_tls = verify_tls;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(address) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = address;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability)?;

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        upstream_timeout_ms = config.upstream.timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(config.listener.bind_target()).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        }
    });

    HttpServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
