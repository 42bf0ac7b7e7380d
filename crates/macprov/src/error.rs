//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text and
//! a distinct process exit code per failure class.

use std::fmt::Write as _;

use miette::Diagnostic;
use thiserror::Error;

use macprov_api::{ClassifiedError, ErrorCategory};
use macprov_config::ConfigError;
use macprov_core::CoreError;
use macprov_proxy::ProxyError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("{reason}")]
    #[diagnostic(
        code(macprov::invalid_address),
        help("Enter all 12 hex digits, with or without separators, e.g. A1:B2:C3:00:00:01.")
    )]
    InvalidAddress { reason: String },

    #[error("Vendor prefix {prefix} is not approved for provisioning")]
    #[diagnostic(
        code(macprov::oui_not_approved),
        help(
            "Check the address for typos, or add {prefix} to the approved OUI list\n\
             (workflow.oui_file or --oui-file)."
        )
    )]
    OuiNotApproved { prefix: String },

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(macprov::validation))]
    Validation { field: String, reason: String },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("{error}")]
    #[diagnostic(code(macprov::backend))]
    Backend {
        error: ClassifiedError,
        #[help]
        advice: String,
    },

    #[error("{failed} of {total} addresses were not provisioned")]
    #[diagnostic(
        code(macprov::provision_incomplete),
        help(
            "Failed addresses are listed above. Use --retries to retry transient failures,\n\
             or fix the reported problem and run provision again."
        )
    )]
    ProvisionIncomplete { failed: usize, total: usize },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(macprov::config),
        help("Check the file shown by `macprov config path` and the workflow JSON files.")
    )]
    Config { message: String },

    // ── Proxy ────────────────────────────────────────────────────────
    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(macprov::bind),
        help("Another process may be using the port. Pick another with --listen.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(macprov::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(macprov::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(macprov::render))]
    Render(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidAddress { .. }
            | Self::OuiNotApproved { .. }
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Backend { error, .. } => exit_code_for(error.category),
            _ => exit_code::GENERAL,
        }
    }

    /// Backend failure with its technical detail shown only when `verbose`.
    pub fn backend(error: ClassifiedError, verbose: bool) -> Self {
        let advice = advice(&error, verbose);
        Self::Backend { error, advice }
    }

    /// Re-render help text for the requested verbosity.
    pub fn with_verbosity(self, verbose: bool) -> Self {
        match self {
            Self::Backend { error, .. } => Self::backend(error, verbose),
            other => other,
        }
    }
}

pub fn exit_code_for(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Network | ErrorCategory::Cors => exit_code::CONNECTION,
        ErrorCategory::Timeout => exit_code::TIMEOUT,
        ErrorCategory::Auth => exit_code::AUTH,
        ErrorCategory::Validation | ErrorCategory::Oui => exit_code::USAGE,
        ErrorCategory::Server | ErrorCategory::Config | ErrorCategory::Unknown => {
            exit_code::GENERAL
        }
    }
}

fn advice(error: &ClassifiedError, verbose: bool) -> String {
    let mut out = format!("Likely cause: {}\n{}", error.likely_cause, error.suggestion);
    if verbose {
        if let Some(ref detail) = error.technical_detail {
            let _ = write!(out, "\nTechnical detail: {detail}");
        }
    }
    out
}

// ── Library error → CliError mapping ────────────────────────────────

impl From<ClassifiedError> for CliError {
    fn from(err: ClassifiedError) -> Self {
        Self::backend(err, false)
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Address(e) => Self::InvalidAddress {
                reason: e.to_string(),
            },
            CoreError::OuiNotApproved { prefix } => Self::OuiNotApproved {
                prefix: prefix.to_string(),
            },
            CoreError::Overflow(e) => Self::Validation {
                field: "count".into(),
                reason: e.to_string(),
            },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Backend(e) => e.into(),
            CoreError::Config { message } => Self::Config { message },
            other @ CoreError::InvalidPhase { .. } => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<ProxyError> for CliError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Bind { addr, source } => Self::Bind {
                addr: addr.to_string(),
                source,
            },
            ProxyError::Serve(e) => Self::Io(e),
            ProxyError::Client(e) => Self::Config {
                message: e.to_string(),
            },
        }
    }
}

impl From<macprov_api::Error> for CliError {
    fn from(err: macprov_api::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_exit_codes() {
        let cases = [
            (ErrorCategory::Network, exit_code::CONNECTION),
            (ErrorCategory::Timeout, exit_code::TIMEOUT),
            (ErrorCategory::Auth, exit_code::AUTH),
            (ErrorCategory::Validation, exit_code::USAGE),
            (ErrorCategory::Server, exit_code::GENERAL),
        ];
        for (category, code) in cases {
            let err = CliError::from(ClassifiedError::from_category(category, None));
            assert_eq!(err.exit_code(), code, "{category}");
        }
    }

    #[test]
    fn technical_detail_needs_verbose() {
        let classified =
            ClassifiedError::from_category(ErrorCategory::Server, Some("HTTP 503: busy".into()));

        let CliError::Backend { advice, .. } = CliError::backend(classified.clone(), false) else {
            panic!("expected backend error");
        };
        assert!(advice.starts_with("Likely cause: "));
        assert!(!advice.contains("HTTP 503"));

        let CliError::Backend { advice, .. } = CliError::from(classified).with_verbosity(true) else {
            panic!("expected backend error");
        };
        assert!(advice.ends_with("Technical detail: HTTP 503: busy"));
    }

    #[test]
    fn input_errors_are_usage_errors() {
        let parse_err = "A1:B2".parse::<macprov_core::MacAddress>().unwrap_err();
        let err = CliError::from(CoreError::from(parse_err));
        assert!(matches!(err, CliError::InvalidAddress { .. }));
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
