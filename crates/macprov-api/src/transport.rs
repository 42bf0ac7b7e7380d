// Shared transport configuration for building reqwest::Client instances.
//
// The provisioning client, the log sink and the edge proxy all build their
// HTTP clients here so TLS and connect settings stay in one place. Per-request
// deadlines are not set on the client; each request applies the timeout from
// the configuration snapshot it was issued under.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// TLS verification mode for backend connections.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (internal backends with self-signed certs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub connect_timeout: Duration,
    /// Follow 3xx answers. Off for the proxy, which mirrors them as-is.
    pub follow_redirects: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            connect_timeout: Duration::from_secs(5),
            follow_redirects: true,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("macprov/", env!("CARGO_PKG_VERSION")));
        if !self.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::ClientBuild(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::ClientBuild(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder.build().map_err(|e| Error::ClientBuild(e.to_string()))
    }
}
