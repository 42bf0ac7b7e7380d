// Directory API request/response types
//
// The backend answers `GET /searchbymac/{mac}` with a JSON array of device
// records (empty = available) and `POST /addhsd` with a JSON boolean.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::{ClassifiedError, ErrorCategory};

/// A device registration as stored by the directory backend. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub mac: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub configfile: String,
    #[serde(default)]
    pub isp: String,
    #[serde(
        rename = "customFields",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_fields: Option<Map<String, Value>>,
}

/// Body of `POST /addhsd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub mac: String,
    pub account: String,
    pub configfile: String,
    pub isp: String,
}

/// Result of a provisioning attempt. Failures are values, never `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
}

impl ProvisionOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: ClassifiedError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// A failure without a recorded diagnostic is reported as `unknown`.
    pub fn into_result(self) -> Result<(), ClassifiedError> {
        if self.success {
            return Ok(());
        }
        Err(self
            .error
            .unwrap_or_else(|| ClassifiedError::from_category(ErrorCategory::Unknown, None)))
    }
}
