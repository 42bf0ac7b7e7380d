//! `macprov normalize`: show what the input field would display.

use std::fmt::Write as _;

use serde::Serialize;

use macprov_core::{extract_vendor_prefix, is_complete, normalize, validate_format};

use crate::cli::{GlobalOpts, NormalizeArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct NormalizeReport {
    input: String,
    normalized: String,
    complete: bool,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    vendor_prefix: Option<String>,
}

fn report(input: &str) -> NormalizeReport {
    let normalized = normalize(input);
    let complete = is_complete(&normalized);
    let valid = validate_format(&normalized);
    let vendor_prefix = valid.then(|| extract_vendor_prefix(&normalized));
    NormalizeReport {
        input: input.to_owned(),
        normalized,
        complete,
        valid,
        vendor_prefix,
    }
}

fn detail(report: &NormalizeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Normalized:    {}", report.normalized);
    let _ = writeln!(out, "Complete:      {}", if report.complete { "yes" } else { "no" });
    let _ = write!(out, "Valid:         {}", if report.valid { "yes" } else { "no" });
    if let Some(ref prefix) = report.vendor_prefix {
        let _ = write!(out, "\nVendor prefix: {prefix}");
    }
    out
}

pub fn handle(args: &NormalizeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let report = report(&args.text);
    let out = output::render_single(global.output, &report, detail, |r| r.normalized.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
