//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item. Classified
//! errors attached to addresses are rendered as notes on stderr for the
//! human-readable formats.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use macprov_api::ClassifiedError;
use macprov_core::{AddressState, LookupStatus, ProvisionState, ProvisionSummary};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ───────────────────────────────────────────────────

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ──────────────────────────────────────────────

/// Render a list of serde-serializable items in the chosen format.
///
/// - `table`: maps each item through `to_row` and builds a rounded table
/// - `json` / `json-compact` / `yaml`: serializes the original data
/// - `plain`: calls `line_fn` on each item, one line per item
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(usize, &T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().enumerate().map(|(i, item)| to_row(i, item)).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(line_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single item. Table output uses a pre-formatted detail view.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(line_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn is_structured(format: OutputFormat) -> bool {
    matches!(
        format,
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml
    )
}

// ── Format-specific renderers ───────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Render(e.to_string()))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

// ── Address tables ──────────────────────────────────────────────────

#[derive(Tabled)]
pub struct AddressRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Config file")]
    configfile: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Provisioned")]
    provisioned: String,
}

pub fn address_row(index: usize, state: &AddressState) -> AddressRow {
    AddressRow {
        index: index + 1,
        mac: state.address.to_string(),
        account: state.assignment.account.clone(),
        configfile: state.assignment.configfile.clone(),
        status: lookup_label(state),
        provisioned: provision_label(state.provision_state).into(),
    }
}

pub fn address_line(state: &AddressState) -> String {
    format!(
        "{}\t{}\t{}",
        state.address, state.lookup_status, state.provision_state
    )
}

fn lookup_label(state: &AddressState) -> String {
    match (state.lookup_status, &state.device_record) {
        (LookupStatus::Found, Some(record)) if !record.account.is_empty() => {
            format!("registered (account {})", record.account)
        }
        (LookupStatus::Found, _) => "registered".into(),
        (LookupStatus::NotFound, _) => "available".into(),
        (LookupStatus::Unknown, _) => "unknown".into(),
        (LookupStatus::Pending | LookupStatus::Checking, _) => "-".into(),
    }
}

fn provision_label(state: ProvisionState) -> &'static str {
    match state {
        ProvisionState::Complete => "yes",
        ProvisionState::Error => "failed",
        ProvisionState::Pending | ProvisionState::Provisioning => "-",
    }
}

// ── Classified errors ───────────────────────────────────────────────

/// Title, message, likely cause and suggestion. The technical detail is
/// only included when `verbose`.
pub fn render_classified(error: &ClassifiedError, verbose: bool, color: bool) -> String {
    let mut out = String::new();
    if color {
        let _ = writeln!(out, "{}: {}", error.title.red().bold(), error.message);
    } else {
        let _ = writeln!(out, "{}: {}", error.title, error.message);
    }
    let _ = writeln!(out, "  Likely cause: {}", error.likely_cause);
    let _ = write!(out, "  Suggestion:   {}", error.suggestion);
    if verbose {
        if let Some(ref detail) = error.technical_detail {
            let _ = write!(out, "\n  Detail:       {detail}");
        }
    }
    out
}

/// One block per address that carries an error, for stderr.
pub fn render_error_notes(states: &[AddressState], verbose: bool, color: bool) -> String {
    states
        .iter()
        .filter_map(|state| {
            state.error.as_ref().map(|error| {
                format!("{}  {}", state.address, render_classified(error, verbose, color))
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_notes(notes: &str, quiet: bool) {
    if quiet || notes.is_empty() {
        return;
    }
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{notes}");
}

pub fn render_summary(summary: ProvisionSummary, color: bool) -> String {
    let text = format!(
        "Provisioned {} of {} addresses",
        summary.succeeded, summary.total
    );
    match (color, summary.is_complete()) {
        (false, _) => text,
        (true, true) => text.green().to_string(),
        (true, false) => text.yellow().to_string(),
    }
}
