// Provisioning client
//
// Two operations against the directory backend: status lookup and HSD
// registration. Every request runs under the configuration snapshot that was
// current when it was issued; `configure()` swaps in a new snapshot and never
// touches one a request already holds. Stub mode answers from `stub` after an
// artificial delay instead of going to the network.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::classify::{
    self, ClassifiedError, ErrorCategory, ErrorContext, RequestKind, classify, classify_error,
    classify_transport,
};
use crate::error::Error;
use crate::models::{DeviceRecord, ProvisionOutcome, ProvisionRequest};
use crate::stub;
use crate::transport::TransportConfig;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api/ldap";
pub const DEFAULT_STUB_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Configuration snapshot ──────────────────────────────────────────

/// Immutable client configuration. Replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory API base, e.g. `http://127.0.0.1:8080/api/ldap` (the proxy prefix).
    pub base_url: Url,
    /// Answer from the deterministic simulator instead of the network.
    pub stub_mode: bool,
    /// Artificial latency applied to every stubbed call.
    pub stub_delay: Duration,
    /// Per-request deadline in real mode.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            stub_mode: false,
            stub_delay: DEFAULT_STUB_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// A copy with every field present in `patch` overridden.
    pub fn merged(&self, patch: &ClientConfigPatch) -> Self {
        Self {
            base_url: patch.base_url.clone().unwrap_or_else(|| self.base_url.clone()),
            stub_mode: patch.stub_mode.unwrap_or(self.stub_mode),
            stub_delay: patch.stub_delay.unwrap_or(self.stub_delay),
            timeout: patch.timeout.unwrap_or(self.timeout),
        }
    }

    /// `{base_url}/{path}`, tolerant of a trailing slash on the base.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{path}"))
    }
}

/// Partial update for [`ProvisioningClient::configure`]. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfigPatch {
    pub base_url: Option<Url>,
    pub stub_mode: Option<bool>,
    pub stub_delay: Option<Duration>,
    pub timeout: Option<Duration>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Client for the directory backend.
///
/// Cheap to clone; clones share one configuration cell, so a `configure()`
/// through any clone is seen by requests issued afterwards through all of them.
/// No de-duplication happens here: callers must not overlap requests for the
/// same address.
#[derive(Clone)]
pub struct ProvisioningClient {
    http: reqwest::Client,
    config: Arc<ArcSwap<ClientConfig>>,
}

impl ProvisioningClient {
    pub fn new(config: ClientConfig, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, config))
    }

    /// Use a pre-built `reqwest::Client` (tests, shared connection pools).
    pub fn with_client(http: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            http,
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// The snapshot new requests will be issued under.
    pub fn config(&self) -> Arc<ClientConfig> {
        self.config.load_full()
    }

    /// Merge `patch` into a new snapshot. Requests already in flight keep theirs.
    pub fn configure(&self, patch: &ClientConfigPatch) -> Arc<ClientConfig> {
        self.config.rcu(|current| current.merged(patch));
        let snapshot = self.config.load_full();
        debug!(
            base_url = %snapshot.base_url,
            stub_mode = snapshot.stub_mode,
            timeout_ms = snapshot.timeout.as_millis(),
            "client reconfigured"
        );
        snapshot
    }

    /// Look up existing registrations for `mac`. Empty means the address is available.
    ///
    /// `GET {base}/searchbymac/{urlencoded mac}`
    pub async fn search_by_mac(&self, mac: &str) -> Result<Vec<DeviceRecord>, ClassifiedError> {
        let config = self.config();

        if config.stub_mode {
            debug!(mac, "stub status lookup");
            stub_delay(config.stub_delay).await;
            return stub::search(mac);
        }

        let context = ErrorContext::new(RequestKind::Search);
        let encoded: String = url::form_urlencoded::byte_serialize(mac.as_bytes()).collect();
        let url = config
            .endpoint(&format!("searchbymac/{encoded}"))
            .map_err(|e| classify_error(&e, &context))?;
        let context = context.with_url(url.as_str());

        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .timeout(config.timeout)
            .send()
            .await
            .map_err(|e| classify_transport(&e, &context))?;

        if !resp.status().is_success() {
            let err = classify::from_response(resp, context).await;
            warn!(mac, category = %err.category, "status lookup failed");
            return Err(err);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| classify_transport(&e, &context))?;
        let records: Vec<DeviceRecord> = serde_json::from_str(&body).map_err(|e| {
            ClassifiedError::from_category(
                ErrorCategory::Server,
                Some(format!("unexpected status lookup response: {e}")),
            )
        })?;

        debug!(mac, found = records.len(), "status lookup settled");
        Ok(records)
    }

    /// Register `request.mac` with the directory. Never fails with `Err`:
    /// every failure comes back as a [`ProvisionOutcome`] carrying its diagnostic.
    ///
    /// `POST {base}/addhsd`
    pub async fn add_hsd(&self, request: &ProvisionRequest) -> ProvisionOutcome {
        let config = self.config();

        if config.stub_mode {
            debug!(mac = %request.mac, "stub provisioning");
            stub_delay(config.stub_delay).await;
            return stub::provision(request);
        }

        let context = ErrorContext::new(RequestKind::Provision);
        let url = match config.endpoint("addhsd") {
            Ok(url) => url,
            Err(e) => return ProvisionOutcome::failure(classify_error(&e, &context)),
        };
        let context = context.with_url(url.as_str());

        debug!("POST {}", url);
        let resp = match self
            .http
            .post(url)
            .json(request)
            .timeout(config.timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return ProvisionOutcome::failure(classify_transport(&e, &context)),
        };

        let status = resp.status();
        if !status.is_success() {
            let err = classify::from_response(resp, context).await;
            // Every 4xx other than the auth statuses is a rejected payload.
            let err = if status.is_client_error() && err.category != ErrorCategory::Auth {
                ClassifiedError::from_category(ErrorCategory::Validation, err.technical_detail)
            } else {
                err
            };
            warn!(mac = %request.mac, status = status.as_u16(), category = %err.category, "provisioning failed");
            return ProvisionOutcome::failure(err);
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return ProvisionOutcome::failure(classify_transport(&e, &context)),
        };

        if let Ok(Value::Bool(true)) = serde_json::from_str::<Value>(&body) {
            info!(mac = %request.mac, configfile = %request.configfile, "provisioned");
            return ProvisionOutcome::success();
        }

        let err = classify(
            &format!("backend did not confirm provisioning: {}", body.trim()),
            &context,
        );
        warn!(mac = %request.mac, category = %err.category, "provisioning not confirmed");
        ProvisionOutcome::failure(err)
    }
}

async fn stub_delay(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overrides_supplied_fields() {
        let base = ClientConfig::default();
        let merged = base.merged(&ClientConfigPatch {
            stub_mode: Some(true),
            ..ClientConfigPatch::default()
        });
        assert!(merged.stub_mode);
        assert_eq!(merged.base_url, base.base_url);
        assert_eq!(merged.timeout, base.timeout);

        let again = merged.merged(&ClientConfigPatch {
            timeout: Some(Duration::from_secs(2)),
            ..ClientConfigPatch::default()
        });
        assert!(again.stub_mode, "earlier patches persist");
        assert_eq!(again.timeout, Duration::from_secs(2));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = ClientConfig {
            base_url: Url::parse("http://backend:8000/api/ldap/").unwrap(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.endpoint("addhsd").unwrap().as_str(),
            "http://backend:8000/api/ldap/addhsd"
        );
    }

    #[test]
    fn configure_is_visible_through_clones() {
        let client = ProvisioningClient::with_client(reqwest::Client::new(), ClientConfig::default());
        let clone = client.clone();
        let before = client.config();

        clone.configure(&ClientConfigPatch {
            stub_mode: Some(true),
            ..ClientConfigPatch::default()
        });

        assert!(client.config().stub_mode);
        assert!(!before.stub_mode, "held snapshots are never mutated");
    }

    #[tokio::test(start_paused = true)]
    async fn stub_mode_waits_for_the_stub_delay() {
        let client = ProvisioningClient::with_client(
            reqwest::Client::new(),
            ClientConfig {
                stub_mode: true,
                stub_delay: Duration::from_secs(3),
                ..ClientConfig::default()
            },
        );
        let started = tokio::time::Instant::now();
        let records = client.search_by_mac("00:00:00:00:00:03").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
