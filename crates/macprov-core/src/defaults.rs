// ── Provisioning defaults ──
//
// Account, ISP and config file assigned to each generated address. Two wire
// shapes: one config file for every address, or one per address by index.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// What a single address is provisioned with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub account: String,
    pub isp: String,
    pub configfile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvisioningDefaults {
    /// `{ account, isp, configfiles: [...] }`
    Sequential {
        account: String,
        isp: String,
        configfiles: Vec<String>,
    },
    /// `{ account, isp, configfile }`
    Single {
        account: String,
        isp: String,
        configfile: String,
    },
}

impl Default for ProvisioningDefaults {
    fn default() -> Self {
        Self::Single {
            account: String::new(),
            isp: String::new(),
            configfile: String::new(),
        }
    }
}

impl ProvisioningDefaults {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let defaults: Self = serde_json::from_str(json).map_err(|e| CoreError::Config {
            message: format!("provisioning_defaults.json: {e}"),
        })?;
        defaults.validate()?;
        Ok(defaults)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Sequential { configfiles, .. } if configfiles.is_empty() => {
                Err(CoreError::ValidationFailed {
                    message: "configfiles: at least one config file is required".into(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Assignment for the address at `index` in the generated sequence.
    /// Indexes past the end of `configfiles` reuse the last entry.
    pub fn resolve(&self, index: usize) -> Assignment {
        match self {
            Self::Single {
                account,
                isp,
                configfile,
            } => Assignment {
                account: account.clone(),
                isp: isp.clone(),
                configfile: configfile.clone(),
            },
            Self::Sequential {
                account,
                isp,
                configfiles,
            } => Assignment {
                account: account.clone(),
                isp: isp.clone(),
                configfile: configfiles
                    .get(index)
                    .or_else(|| configfiles.last())
                    .cloned()
                    .unwrap_or_default(),
            },
        }
    }
}
