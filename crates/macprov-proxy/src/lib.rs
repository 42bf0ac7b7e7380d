// macprov-proxy: Same-origin edge proxy. Forwards `{prefix}/...` to the
// directory backend and receives client log entries on `/api/log`.

mod error;
mod forward;
mod log;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use macprov_api::TransportConfig;
use macprov_api::log_sink::LOG_PATH;

pub use error::ProxyError;
pub use forward::ProxyErrorBody;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_PREFIX: &str = "/api/ldap";
pub const DEFAULT_TARGET: &str = "http://127.0.0.1:8000";
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Request bodies are buffered whole before forwarding; anything larger is refused.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen: SocketAddr,
    /// Absolute path without a trailing slash, e.g. `/api/ldap`.
    pub prefix: String,
    /// Backend base URL the prefix is rewritten to.
    pub target: Url,
    /// Deadline for one forwarded exchange.
    pub timeout: Duration,
    pub transport: TransportConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            prefix: DEFAULT_PREFIX.into(),
            target: Url::parse(DEFAULT_TARGET).expect("default target URL is valid"),
            timeout: DEFAULT_FORWARD_TIMEOUT,
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ProxyState {
    pub(crate) http: reqwest::Client,
    pub(crate) config: Arc<ProxyConfig>,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the proxy router, with an HTTP client built from `config.transport`.
/// Backend redirects are never followed; the 3xx goes back to the caller.
pub fn router(config: ProxyConfig) -> Result<Router, ProxyError> {
    let transport = TransportConfig {
        follow_redirects: false,
        ..config.transport.clone()
    };
    let http = transport.build_client()?;
    Ok(router_with_client(config, http))
}

/// Build the proxy router around an existing client.
pub fn router_with_client(config: ProxyConfig, http: reqwest::Client) -> Router {
    let state = ProxyState {
        http,
        config: Arc::new(config),
    };
    Router::new()
        .route(LOG_PATH, post(log::receive))
        .fallback(forward::forward)
        .with_state(state)
}

// ── Server ──────────────────────────────────────────────────────────

/// Bind `config.listen` and serve until `shutdown` is cancelled.
pub async fn serve(config: ProxyConfig, shutdown: CancellationToken) -> Result<(), ProxyError> {
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|source| ProxyError::Bind {
            addr: config.listen,
            source,
        })?;
    serve_on(listener, config, shutdown).await
}

/// Serve on an already bound listener (ephemeral ports in tests).
pub async fn serve_on(
    listener: TcpListener,
    config: ProxyConfig,
    shutdown: CancellationToken,
) -> Result<(), ProxyError> {
    let local = listener.local_addr().map_err(ProxyError::Serve)?;
    info!(
        listen = %local,
        prefix = %config.prefix,
        target = %config.target,
        "edge proxy listening"
    );
    let app = router(config)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ProxyError::Serve)?;
    info!("edge proxy stopped");
    Ok(())
}
