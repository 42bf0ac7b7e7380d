// macprov-core: Address codec, vendor allow-list, provisioning defaults and the
// Validate -> Check-Status -> Provision workflow built on top of macprov-api.

pub mod defaults;
pub mod error;
pub mod mac;
pub mod oui;
pub mod workflow;

// ── Primary re-exports ──────────────────────────────────────────────
pub use defaults::{Assignment, ProvisioningDefaults};
pub use error::CoreError;
pub use mac::{
    MacAddress, MacParseError, OverflowError, VendorPrefix, extract_vendor_prefix,
    generate_sequence, is_complete, normalize, validate_format,
};
pub use oui::OuiAllowList;
pub use workflow::{
    AddressState, LookupStatus, Phase, ProvisionGate, ProvisionState, ProvisionSummary,
    WorkflowController, WorkflowEvent,
};
