// ── Core error types ──
//
// User-facing errors from macprov-core. Backend failures arrive already
// classified; everything raised locally (bad input, overflow, workflow misuse,
// configuration) is mapped onto the same diagnostic shape by `to_classified`.

use thiserror::Error;

use macprov_api::{ClassifiedError, ErrorCategory};

use crate::mac::{MacParseError, OverflowError, VendorPrefix};
use crate::workflow::Phase;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error(transparent)]
    Address(#[from] MacParseError),

    #[error("Vendor prefix {prefix} is not on the approved list")]
    OuiNotApproved { prefix: VendorPrefix },

    #[error(transparent)]
    Overflow(#[from] OverflowError),

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Workflow errors ──────────────────────────────────────────────
    #[error("Workflow is in the {actual} phase; this operation needs {expected}")]
    InvalidPhase { expected: Phase, actual: Phase },

    // ── Backend errors (already classified) ─────────────────────────
    #[error(transparent)]
    Backend(#[from] ClassifiedError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<macprov_api::Error> for CoreError {
    fn from(err: macprov_api::Error) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}

impl CoreError {
    /// Present this error with title, cause and suggestion like any other failure.
    pub fn to_classified(&self) -> ClassifiedError {
        let category = match self {
            Self::Backend(err) => return err.clone(),
            Self::OuiNotApproved { .. } => ErrorCategory::Oui,
            Self::Address(_) | Self::Overflow(_) | Self::ValidationFailed { .. } => {
                ErrorCategory::Validation
            }
            Self::Config { .. } => ErrorCategory::Config,
            Self::InvalidPhase { .. } => ErrorCategory::Unknown,
        };
        ClassifiedError::from_category(category, Some(self.to_string()))
    }
}
