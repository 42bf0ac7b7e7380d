// macprov-api: Async client for the MAC directory backend (status lookup + HSD registration)

pub mod classify;
pub mod client;
pub mod error;
pub mod log_sink;
pub mod models;
mod stub;
pub mod transport;

pub use classify::{ClassifiedError, ErrorCategory, ErrorContext, RequestKind, classify};
pub use client::{ClientConfig, ClientConfigPatch, ProvisioningClient};
pub use error::Error;
pub use log_sink::{LogEntry, LogLevel, LogSink};
pub use models::{DeviceRecord, ProvisionOutcome, ProvisionRequest};
pub use transport::{TlsMode, TransportConfig};
