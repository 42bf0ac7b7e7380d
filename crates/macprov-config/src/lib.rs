//! Configuration for the macprov CLI and edge proxy.
//!
//! One TOML file (`[client]`, `[proxy]`, `[workflow]`) layered with
//! `MACPROV_`-prefixed environment variables, plus the two JSON documents the
//! workflow consumes: the approved OUI list and the provisioning defaults.
//! Translation into `ClientConfig` / `ProxyConfig` happens here so both the
//! CLI and the proxy agree on defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use macprov_api::client::{DEFAULT_BASE_URL, DEFAULT_STUB_DELAY, DEFAULT_TIMEOUT};
use macprov_api::{ClientConfig, TlsMode, TransportConfig};
use macprov_core::workflow::MAX_ADDRESS_COUNT;
use macprov_core::{CoreError, OuiAllowList, ProvisioningDefaults};
use macprov_proxy::ProxyConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {message}", .path.display())]
    Document { path: PathBuf, message: String },

    #[error("{key} is not configured: set it in the config file or pass --{flag}")]
    Missing {
        key: &'static str,
        flag: &'static str,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub proxy: ProxySection,

    #[serde(default)]
    pub workflow: WorkflowSection,
}

/// `[client]`: how the provisioning client reaches the directory API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub stub_mode: bool,

    #[serde(default = "default_stub_delay_ms")]
    pub stub_delay_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Accept invalid TLS certificates from the backend.
    #[serde(default)]
    pub insecure: bool,

    /// PEM bundle to trust in addition to the system store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stub_mode: false,
            stub_delay_ms: default_stub_delay_ms(),
            timeout_ms: default_timeout_ms(),
            insecure: false,
            ca_cert: None,
        }
    }
}

/// `[proxy]`: the same-origin edge proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default = "default_proxy_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            prefix: default_prefix(),
            target: default_target(),
            timeout_ms: default_proxy_timeout_ms(),
        }
    }
}

/// `[workflow]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkflowSection {
    /// 1 for single-address provisioning, otherwise the length of the run.
    #[serde(default = "default_address_count")]
    pub address_count: usize,

    /// `{ "approved_ouis": [...] }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oui_file: Option<PathBuf>,

    /// `{ account, isp, configfile }` or `{ account, isp, configfiles }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults_file: Option<PathBuf>,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            address_count: default_address_count(),
            oui_file: None,
            defaults_file: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_stub_delay_ms() -> u64 {
    u64::try_from(DEFAULT_STUB_DELAY.as_millis()).unwrap_or(500)
}
fn default_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(10_000)
}
fn default_listen() -> String {
    macprov_proxy::DEFAULT_LISTEN.into()
}
fn default_prefix() -> String {
    macprov_proxy::DEFAULT_PREFIX.into()
}
fn default_target() -> String {
    macprov_proxy::DEFAULT_TARGET.into()
}
fn default_proxy_timeout_ms() -> u64 {
    u64::try_from(macprov_proxy::DEFAULT_FORWARD_TIMEOUT.as_millis()).unwrap_or(30_000)
}
fn default_address_count() -> usize {
    1
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Reject values that would only fail later, naming the field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client_config()?;
        self.proxy_config()?;
        if !(1..=MAX_ADDRESS_COUNT).contains(&self.workflow.address_count) {
            return Err(ConfigError::Validation {
                field: "workflow.address_count".into(),
                reason: format!("must be between 1 and {MAX_ADDRESS_COUNT}"),
            });
        }
        Ok(())
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let base_url = parse_url("client.base_url", &self.client.base_url)?;
        if self.client.timeout_ms == 0 {
            return Err(ConfigError::Validation {
                field: "client.timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(ClientConfig {
            base_url,
            stub_mode: self.client.stub_mode,
            stub_delay: Duration::from_millis(self.client.stub_delay_ms),
            timeout: Duration::from_millis(self.client.timeout_ms),
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        let tls = if self.client.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.client.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            ..TransportConfig::default()
        }
    }

    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        let listen: SocketAddr =
            self.proxy
                .listen
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Validation {
                    field: "proxy.listen".into(),
                    reason: e.to_string(),
                })?;
        let prefix = self.proxy.prefix.trim_end_matches('/');
        if !prefix.starts_with('/') || prefix.len() < 2 {
            return Err(ConfigError::Validation {
                field: "proxy.prefix".into(),
                reason: format!("expected an absolute path like /api/ldap, got '{}'", self.proxy.prefix),
            });
        }
        if self.proxy.timeout_ms == 0 {
            return Err(ConfigError::Validation {
                field: "proxy.timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(ProxyConfig {
            listen,
            prefix: prefix.to_owned(),
            target: parse_url("proxy.target", &self.proxy.target)?,
            timeout: Duration::from_millis(self.proxy.timeout_ms),
            transport: self.transport_config(),
        })
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(url)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "macprov", "macprov").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("macprov");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then `path` (if it exists), then `MACPROV_SECTION__KEY` variables.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MACPROV_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Workflow documents ──────────────────────────────────────────────

pub fn load_allow_list(path: &Path) -> Result<OuiAllowList, ConfigError> {
    let json = read_document(path)?;
    OuiAllowList::from_json(&json).map_err(|e| document_error(path, &e))
}

pub fn load_defaults(path: &Path) -> Result<ProvisioningDefaults, ConfigError> {
    let json = read_document(path)?;
    ProvisioningDefaults::from_json(&json).map_err(|e| document_error(path, &e))
}

fn read_document(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn document_error(path: &Path, err: &CoreError) -> ConfigError {
    ConfigError::Document {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
