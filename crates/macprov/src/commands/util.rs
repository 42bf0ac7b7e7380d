//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use macprov_api::{LogSink, ProvisioningClient};
use macprov_config::{self as config, Config, ConfigError};
use macprov_core::{ProvisioningDefaults, WorkflowController, WorkflowEvent};

use crate::cli::{GlobalOpts, WorkflowArgs};
use crate::error::CliError;
use crate::output;

/// Config file (from `--config` or the platform path) with global flag
/// overrides applied, validated.
pub fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match global.config {
        Some(ref path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(ref base_url) = global.base_url {
        cfg.client.base_url.clone_from(base_url);
    }
    if let Some(timeout_ms) = global.timeout_ms {
        cfg.client.timeout_ms = timeout_ms;
    }
    cfg.client.stub_mode |= global.stub;
    cfg.client.insecure |= global.insecure;
    cfg.validate()?;
    Ok(cfg)
}

/// Build a workflow controller for `args`. Provisioning needs real defaults;
/// a status check can run with empty assignments.
pub fn build_controller(
    cfg: &Config,
    global: &GlobalOpts,
    args: &WorkflowArgs,
    require_defaults: bool,
) -> Result<WorkflowController, CliError> {
    let count = args.count.unwrap_or(cfg.workflow.address_count);

    let oui_file = args
        .oui_file
        .as_ref()
        .or(cfg.workflow.oui_file.as_ref())
        .ok_or(ConfigError::Missing {
            key: "workflow.oui_file",
            flag: "oui-file",
        })?;
    let allow_list = config::load_allow_list(oui_file)?;

    let defaults = match args.defaults_file.as_ref().or(cfg.workflow.defaults_file.as_ref()) {
        Some(path) => config::load_defaults(path)?,
        None if require_defaults => {
            return Err(ConfigError::Missing {
                key: "workflow.defaults_file",
                flag: "defaults-file",
            }
            .into());
        }
        None => ProvisioningDefaults::default(),
    };

    let client_config = cfg.client_config()?;
    let http = cfg.transport_config().build_client()?;
    let sink = if global.remote_log {
        Some(LogSink::for_origin(http.clone(), &client_config.base_url)?)
    } else {
        None
    };
    let client = ProvisioningClient::with_client(http, client_config);

    debug!(count, oui_file = %oui_file.display(), approved = allow_list.len(), "building workflow");
    let controller = WorkflowController::new(client, allow_list, defaults, count)?;
    Ok(match sink {
        Some(sink) => controller.with_log_sink(sink),
        None => controller,
    })
}

// ── Interaction ─────────────────────────────────────────────────────

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

// ── Progress ────────────────────────────────────────────────────────

/// Spinner on stderr; hidden for quiet, structured or non-terminal output.
pub fn spinner(global: &GlobalOpts) -> ProgressBar {
    if global.quiet || output::is_structured(global.output) || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Drive `bar` from workflow events until the task is aborted.
pub fn track(mut events: broadcast::Receiver<WorkflowEvent>, bar: ProgressBar) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(message) = progress_message(&event) {
                        bar.set_message(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn progress_message(event: &WorkflowEvent) -> Option<String> {
    match event {
        WorkflowEvent::LookupStarted { address } => Some(format!("Checking {address}")),
        WorkflowEvent::LookupSettled { address, status } => Some(format!("{address}: {status}")),
        WorkflowEvent::ProvisionStarted { address } => Some(format!("Provisioning {address}")),
        WorkflowEvent::ProvisionSettled { address, state } => Some(format!("{address}: {state}")),
        WorkflowEvent::Banner { address, error } => {
            Some(format!("{address}: {}", error.title))
        }
        WorkflowEvent::Validated { .. }
        | WorkflowEvent::ConfirmationRequired { .. }
        | WorkflowEvent::Summary { .. }
        | WorkflowEvent::Reset => None,
    }
}
