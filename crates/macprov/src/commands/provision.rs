//! `macprov provision`: the full workflow, from validation to summary.
//!
//! Existing registrations are only overwritten after an interactive
//! confirmation or `--yes`. Addresses are provisioned one at a time; failures
//! are reported per address and do not stop the run.

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::debug;

use macprov_core::{
    AddressState, LookupStatus, ProvisionGate, ProvisionState, ProvisionSummary,
    WorkflowController,
};

use crate::cli::{GlobalOpts, ProvisionArgs};
use crate::commands::{check, util};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProvisionReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<String>,
    cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ProvisionSummary>,
    addresses: &'a [AddressState],
    finished_at: DateTime<Utc>,
}

pub async fn handle(args: &ProvisionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::effective_config(global)?;
    let mut workflow = util::build_controller(&cfg, global, &args.workflow, true)?;

    let bar = util::spinner(global);
    let tracker = util::track(workflow.subscribe(), bar.clone());
    let result = run(&mut workflow, args, global, &bar).await;
    tracker.abort();
    bar.finish_and_clear();
    let summary = result?;

    if output::is_structured(global.output) {
        let report = ProvisionReport {
            session: workflow.session().map(|s| s.to_string()),
            cancelled: summary.is_none(),
            summary,
            addresses: workflow.addresses(),
            finished_at: Utc::now(),
        };
        let out = output::render_single(global.output, &report, |_| String::new(), |_| String::new())?;
        output::print_output(&out, global.quiet);
    } else {
        check::print_states(workflow.addresses(), global)?;
        match summary {
            Some(summary) => output::print_output(
                &output::render_summary(summary, output::should_color(global.color)),
                global.quiet,
            ),
            None => output::print_notes("Cancelled; nothing was provisioned.", global.quiet),
        }
    }

    match summary {
        Some(summary) if !summary.is_complete() => Err(CliError::ProvisionIncomplete {
            failed: summary.total - summary.succeeded,
            total: summary.total,
        }),
        _ => Ok(()),
    }
}

/// `None` when the overwrite prompt was declined.
async fn run(
    workflow: &mut WorkflowController,
    args: &ProvisionArgs,
    global: &GlobalOpts,
    bar: &ProgressBar,
) -> Result<Option<ProvisionSummary>, CliError> {
    workflow.submit(&args.workflow.mac).await?;

    if args.recheck && has_status(workflow, LookupStatus::Unknown) {
        debug!("rechecking unknown addresses");
        workflow.recheck_unknown().await?;
    }

    if let ProvisionGate::NeedsConfirmation { existing } = workflow.request_provision()? {
        let list = existing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "{} of {} addresses are already registered ({list}). Overwrite?",
            existing.len(),
            workflow.address_count()
        );
        let accepted =
            bar.suspend(|| util::confirm(&prompt, "overwrite existing registrations", global.yes))?;
        if !accepted {
            workflow.cancel_confirmation()?;
            return Ok(None);
        }
        workflow.confirm()?;
    }

    let mut summary = workflow.provision().await?;
    for attempt in 1..=args.retries {
        if summary.is_complete() || !workflow.addresses().iter().any(is_retryable_failure) {
            break;
        }
        debug!(attempt, "retrying failed addresses");
        summary = workflow.retry_failed().await?;
    }
    Ok(Some(summary))
}

fn has_status(workflow: &WorkflowController, status: LookupStatus) -> bool {
    workflow.addresses().iter().any(|s| s.lookup_status == status)
}

fn is_retryable_failure(state: &AddressState) -> bool {
    state.provision_state == ProvisionState::Error
        && state.error.as_ref().is_some_and(|e| e.is_retryable)
}
