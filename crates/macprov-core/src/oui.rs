// ── Approved vendor prefixes ──
//
// Wire shape: `{ "approved_ouis": ["A1B2C3", ...] }`. Entries are normalized on
// load; an entry that is not exactly six hex digits rejects the whole list.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::CoreError;
use crate::mac::{MacAddress, VendorPrefix};

#[derive(Debug, Deserialize)]
struct RawAllowList {
    approved_ouis: Vec<String>,
}

/// Set of vendor prefixes allowed through validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OuiAllowList {
    prefixes: BTreeSet<VendorPrefix>,
}

impl OuiAllowList {
    pub fn new<I, S>(entries: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = entries
            .into_iter()
            .map(|entry| {
                entry
                    .as_ref()
                    .parse::<VendorPrefix>()
                    .map_err(|e| CoreError::ValidationFailed {
                        message: format!("approved_ouis: {e}"),
                    })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { prefixes })
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let raw: RawAllowList = serde_json::from_str(json).map_err(|e| CoreError::Config {
            message: format!("approved_ouis.json: {e}"),
        })?;
        Self::new(raw.approved_ouis)
    }

    pub fn contains(&self, prefix: VendorPrefix) -> bool {
        self.prefixes.contains(&prefix)
    }

    pub fn is_approved(&self, mac: MacAddress) -> bool {
        self.contains(mac.vendor_prefix())
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_normalizes_entries() {
        let list = OuiAllowList::from_json(r#"{"approved_ouis": ["a1b2c3", "00:11:22", "DD-EE-FF"]}"#)
            .unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.is_approved("A1:B2:C3:00:00:00".parse().unwrap()));
        assert!(list.contains("001122".parse().unwrap()));
        assert!(!list.is_approved("A1:B2:C4:00:00:00".parse().unwrap()));
    }

    #[test]
    fn rejects_bad_entries() {
        let err = OuiAllowList::from_json(r#"{"approved_ouis": ["A1B2C3", "A1B2"]}"#).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        assert!(err.to_string().contains("A1B2"));
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = OuiAllowList::from_json(r#"{"ouis": []}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn duplicates_collapse() {
        let list = OuiAllowList::new(["A1B2C3", "a1:b2:c3"]).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.contains("A1B2C3".parse().unwrap()));
    }
}
