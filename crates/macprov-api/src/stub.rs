// Deterministic offline simulation of the directory backend.
//
// Outcomes are a pure function of the address's 48-bit value so tests and
// field demos can pick addresses that exercise every branch:
//
//   lookup:    value % 3 == 0 -> one record, else value % 7 == 0 -> server error
//   provision: value % 11 == 0 -> server error, else value % 5 == 0 -> validation error

use crate::classify::{ClassifiedError, ErrorContext, RequestKind, classify};
use crate::models::{DeviceRecord, ProvisionOutcome, ProvisionRequest};

pub(crate) const STUB_ACCOUNT: &str = "STUB-000000";
pub(crate) const STUB_CONFIGFILE: &str = "stub-default.cfg";
pub(crate) const STUB_ISP: &str = "stub-isp";

/// Integer value of a MAC written with any separators. `None` unless exactly 12 hex digits.
pub(crate) fn mac_value(mac: &str) -> Option<u64> {
    let hex: String = mac.chars().filter(char::is_ascii_hexdigit).collect();
    if hex.len() != 12 {
        return None;
    }
    u64::from_str_radix(&hex, 16).ok()
}

pub(crate) fn search(mac: &str) -> Result<Vec<DeviceRecord>, ClassifiedError> {
    let context = ErrorContext::new(RequestKind::Search);
    let Some(value) = mac_value(mac) else {
        return Err(classify(&format!("invalid MAC address: {mac}"), &context));
    };

    if value % 3 == 0 {
        return Ok(vec![DeviceRecord {
            mac: mac.to_owned(),
            account: STUB_ACCOUNT.into(),
            configfile: STUB_CONFIGFILE.into(),
            isp: STUB_ISP.into(),
            custom_fields: None,
        }]);
    }
    if value % 7 == 0 {
        return Err(classify(
            "Simulated server error (stub mode)",
            &context.with_status(500),
        ));
    }
    Ok(Vec::new())
}

pub(crate) fn provision(request: &ProvisionRequest) -> ProvisionOutcome {
    let context = ErrorContext::new(RequestKind::Provision);
    let Some(value) = mac_value(&request.mac) else {
        return ProvisionOutcome::failure(classify(
            &format!("invalid MAC address: {}", request.mac),
            &context,
        ));
    };

    if value % 11 == 0 {
        return ProvisionOutcome::failure(classify(
            "Simulated server error (stub mode)",
            &context.with_status(500),
        ));
    }
    if value % 5 == 0 {
        return ProvisionOutcome::failure(classify(
            "Simulated validation error (stub mode)",
            &context.with_status(400),
        ));
    }
    ProvisionOutcome::success()
}
