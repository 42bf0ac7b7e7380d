//! `macprov generate`: print a consecutive address run. Local only.

use tabled::Tabled;

use macprov_core::mac::DEFAULT_SEQUENCE_LEN;
use macprov_core::workflow::MAX_ADDRESS_COUNT;
use macprov_core::{MacAddress, generate_sequence};

use crate::cli::{GenerateArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SequenceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
}

pub fn handle(args: &GenerateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let count = args.count.unwrap_or(DEFAULT_SEQUENCE_LEN);
    if !(1..=MAX_ADDRESS_COUNT).contains(&count) {
        return Err(CliError::Validation {
            field: "count".into(),
            reason: format!("must be between 1 and {MAX_ADDRESS_COUNT}"),
        });
    }
    let base: MacAddress = args.mac.parse().map_err(macprov_core::CoreError::from)?;
    let sequence = generate_sequence(base, count).map_err(macprov_core::CoreError::from)?;

    let out = output::render_list(
        global.output,
        &sequence,
        |i, mac| SequenceRow {
            index: i + 1,
            mac: mac.to_string(),
            vendor: mac.vendor_prefix().to_string(),
        },
        ToString::to_string,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
