// Failure classification
//
// Turns transport failures, HTTP error responses and bare messages into
// `ClassifiedError` diagnostics. Precedence is fixed: explicit status code,
// then the `oui` request kind, then the ordered pattern table, then `unknown`.
// Nothing in here performs I/O except reading a response body, and nothing
// in here fails -- unreadable bodies degrade to the HTTP status line.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;
use tracing::debug;

/// `error` field of the envelope the edge proxy fabricates when forwarding fails.
pub const PROXY_ERROR: &str = "Proxy error";

// ── Categories ──────────────────────────────────────────────────────

/// Closed taxonomy of failure categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Cors,
    Server,
    Validation,
    Timeout,
    Config,
    Oui,
    Auth,
    Unknown,
}

impl ErrorCategory {
    /// Whether a retry affordance is offered. A property of the category,
    /// never of an individual failure.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Cors | Self::Validation | Self::Auth | Self::Oui)
    }

    fn copy(self) -> CategoryCopy {
        match self {
            Self::Network => CategoryCopy {
                title: "Network Error",
                message: "Could not reach the provisioning service.",
                likely_cause: "The backend is unreachable or the local network connection dropped.",
                suggestion: "Check your network connection and try again.",
            },
            Self::Cors => CategoryCopy {
                title: "Cross-Origin Request Blocked",
                message: "The request was blocked before it reached the provisioning service.",
                likely_cause: "The client is calling the backend directly instead of through the same-origin proxy.",
                suggestion: "Point the client base URL at the proxy prefix (for example /api/ldap) and reload.",
            },
            Self::Server => CategoryCopy {
                title: "Server Error",
                message: "The provisioning service reported an internal error.",
                likely_cause: "The directory backend is down, overloaded, or failed while processing the request.",
                suggestion: "Wait a moment and retry. If the problem persists, contact the backend administrator.",
            },
            Self::Validation => CategoryCopy {
                title: "Invalid Request",
                message: "The provisioning service rejected the submitted data.",
                likely_cause: "The MAC address, account, or configuration file was not accepted by the backend.",
                suggestion: "Review the address and provisioning values, then submit again.",
            },
            Self::Timeout => CategoryCopy {
                title: "Request Timed Out",
                message: "The provisioning service did not answer in time.",
                likely_cause: "The backend is slow to respond or the connection stalled.",
                suggestion: "Retry the request. If timeouts continue, raise the client timeout.",
            },
            Self::Config => CategoryCopy {
                title: "Configuration Error",
                message: "Required configuration could not be loaded.",
                likely_cause: "A configuration file is missing, unreadable, or malformed.",
                suggestion: "Verify the configuration files and reload.",
            },
            Self::Oui => CategoryCopy {
                title: "Vendor Prefix Check Failed",
                message: "The vendor prefix of this MAC address could not be verified.",
                likely_cause: "The device vendor is not on the approved OUI list, or the list could not be loaded.",
                suggestion: "Confirm the MAC address and that the device vendor is approved for provisioning.",
            },
            Self::Auth => CategoryCopy {
                title: "Access Denied",
                message: "The provisioning service refused this request.",
                likely_cause: "The session is not authorized to query or modify the directory.",
                suggestion: "Confirm you have access to the provisioning service, then contact an administrator.",
            },
            Self::Unknown => CategoryCopy {
                title: "Unexpected Error",
                message: "Something went wrong while talking to the provisioning service.",
                likely_cause: "An unrecognized failure occurred.",
                suggestion: "Try again. If the error repeats, share the technical details with support.",
            },
        }
    }
}

struct CategoryCopy {
    title: &'static str,
    message: &'static str,
    likely_cause: &'static str,
    suggestion: &'static str,
}

// ── Context ─────────────────────────────────────────────────────────

/// What kind of request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Search,
    Provision,
    Config,
    Oui,
}

/// Optional hints that sharpen classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub kind: Option<RequestKind>,
    pub url: Option<String>,
    pub status_code: Option<u16>,
}

impl ErrorContext {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

// ── ClassifiedError ─────────────────────────────────────────────────

/// Structured, user-presentable diagnostic. Built fresh per failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{title}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub title: String,
    pub message: String,
    pub likely_cause: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_detail: Option<String>,
    pub is_retryable: bool,
}

impl ClassifiedError {
    /// Build the diagnostic for `category`, carrying `technical_detail` verbatim.
    pub fn from_category(category: ErrorCategory, technical_detail: Option<String>) -> Self {
        let copy = category.copy();
        Self {
            category,
            title: copy.title.into(),
            message: copy.message.into(),
            likely_cause: copy.likely_cause.into(),
            suggestion: copy.suggestion.into(),
            technical_detail: technical_detail.filter(|d| !d.trim().is_empty()),
            is_retryable: category.is_retryable(),
        }
    }
}

// ── Pattern table ───────────────────────────────────────────────────

/// One row of the message table: any pattern (lowercase substring) matches.
struct Rule {
    category: ErrorCategory,
    patterns: &'static [&'static str],
}

impl Rule {
    fn matches(&self, haystack: &str) -> bool {
        self.patterns.iter().any(|p| haystack.contains(p))
    }
}

/// Evaluated top to bottom, first match wins. New categories are new rows.
static RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::Cors,
        patterns: &["cors", "cross-origin", "access-control-allow-origin"],
    },
    Rule {
        category: ErrorCategory::Network,
        patterns: &[
            "failed to fetch",
            "networkerror",
            "network error",
            "network request failed",
            "error sending request",
            "connection refused",
            "connection reset",
            "dns error",
        ],
    },
    Rule {
        category: ErrorCategory::Timeout,
        patterns: &["timeout", "timed out", "aborterror", "aborted"],
    },
    Rule {
        category: ErrorCategory::Server,
        patterns: &[
            "500",
            "502",
            "503",
            "504",
            "server error",
            "bad gateway",
            "service unavailable",
        ],
    },
    Rule {
        category: ErrorCategory::Validation,
        patterns: &["validation", "400", "invalid", "bad request"],
    },
    Rule {
        category: ErrorCategory::Auth,
        patterns: &["401", "403", "unauthorized", "forbidden"],
    },
    Rule {
        category: ErrorCategory::Config,
        patterns: &[
            "config",
            "approved_ouis.json",
            "provisioning_defaults.json",
        ],
    },
];

fn category_for_status(status: u16) -> Option<ErrorCategory> {
    match status {
        500.. => Some(ErrorCategory::Server),
        400 => Some(ErrorCategory::Validation),
        401 | 403 => Some(ErrorCategory::Auth),
        _ => None,
    }
}

fn categorize(message: &str, context: &ErrorContext) -> ErrorCategory {
    if let Some(category) = context.status_code.and_then(category_for_status) {
        return category;
    }
    if context.kind == Some(RequestKind::Oui) {
        return ErrorCategory::Oui;
    }
    let haystack = message.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matches(&haystack))
        .map_or(ErrorCategory::Unknown, |rule| rule.category)
}

// ── Entry points ────────────────────────────────────────────────────

/// Classify a failure described by `message`.
pub fn classify(message: &str, context: &ErrorContext) -> ClassifiedError {
    let category = categorize(message, context);
    debug!(
        %category,
        kind = ?context.kind,
        url = context.url.as_deref().unwrap_or("-"),
        "classified failure"
    );
    ClassifiedError::from_category(category, Some(message.to_owned()))
}

/// Classify any error value by its full `source()` chain.
pub fn classify_error<E>(err: &E, context: &ErrorContext) -> ClassifiedError
where
    E: std::error::Error + ?Sized,
{
    classify(&error_chain(err), context)
}

/// Classify a `reqwest` failure. Deadline expiry is always `timeout`, even
/// though the request was torn down like any other aborted future.
pub fn classify_transport(err: &reqwest::Error, context: &ErrorContext) -> ClassifiedError {
    let detail = error_chain(err);
    if err.is_timeout() {
        return ClassifiedError::from_category(ErrorCategory::Timeout, Some(detail));
    }
    if err.is_connect() {
        return ClassifiedError::from_category(ErrorCategory::Network, Some(detail));
    }
    let context = match err.status() {
        Some(status) => context.clone().with_status(status.as_u16()),
        None => context.clone(),
    };
    classify(&detail, &context)
}

/// Classify a non-success HTTP response from its status and body.
pub async fn from_response(response: reqwest::Response, context: ErrorContext) -> ClassifiedError {
    let status = response.status();
    let context = if context.url.is_some() {
        context
    } else {
        context.with_url(response.url().as_str())
    };
    let body = response.text().await.unwrap_or_default();
    from_parts(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        &body,
        context,
    )
}

/// Body-level half of [`from_response`], usable without a live response.
///
/// The message is taken from a JSON `detail`, `error` or `message` field (in
/// that order); anything unparseable falls back to `HTTP <status>: <text>`,
/// or `HTTP <status>` when the status has no reason phrase.
pub fn from_parts(status: u16, status_text: &str, body: &str, context: ErrorContext) -> ClassifiedError {
    let context = context.with_status(status);
    match body_message(body) {
        Some(BodyMessage::Proxy { cause, target }) => {
            let category = categorize(&cause, &context);
            ClassifiedError::from_category(
                category,
                Some(format!("{PROXY_ERROR}: could not reach {target}: {cause}")),
            )
        }
        Some(BodyMessage::Field(message)) => classify(&message, &context),
        None if status_text.is_empty() => classify(&format!("HTTP {status}"), &context),
        None => classify(&format!("HTTP {status}: {status_text}"), &context),
    }
}

enum BodyMessage {
    /// The proxy itself failed to forward; the backend never answered.
    Proxy { cause: String, target: String },
    Field(String),
}

fn body_message(body: &str) -> Option<BodyMessage> {
    let value: Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;

    if obj.get("error").and_then(Value::as_str) == Some(PROXY_ERROR) {
        let cause = obj.get("message").and_then(Value::as_str);
        let target = obj.get("target").and_then(Value::as_str);
        if let (Some(cause), Some(target)) = (cause, target) {
            return Some(BodyMessage::Proxy {
                cause: cause.to_owned(),
                target: target.to_owned(),
            });
        }
    }

    ["detail", "error", "message"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|v| match v {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .map(BodyMessage::Field)
}

/// `err: source: source...`
pub fn error_chain<E>(err: &E) -> String
where
    E: std::error::Error + ?Sized,
{
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}
