//! `macprov check`: validate a run and look up every address.

use macprov_core::{AddressState, LookupStatus};

use crate::cli::{GlobalOpts, WorkflowArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &WorkflowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::effective_config(global)?;
    let mut workflow = util::build_controller(&cfg, global, args, false)?;

    let bar = util::spinner(global);
    let tracker = util::track(workflow.subscribe(), bar.clone());
    let result = workflow.submit(&args.mac).await.map(<[AddressState]>::to_vec);
    tracker.abort();
    bar.finish_and_clear();
    let states = result?;

    // Nothing answered: report the failure itself instead of a table of unknowns.
    if states.iter().all(|s| s.lookup_status == LookupStatus::Unknown) {
        if let Some(error) = states.iter().find_map(|s| s.error.clone()) {
            return Err(CliError::backend(error, global.verbose > 0));
        }
    }

    print_states(&states, global)
}

/// Address table on stdout, per-address error notes on stderr.
pub(crate) fn print_states(states: &[AddressState], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        states,
        output::address_row,
        output::address_line,
    )?;
    output::print_output(&out, global.quiet);

    if !output::is_structured(global.output) {
        let notes = output::render_error_notes(
            states,
            global.verbose > 0,
            output::should_color(global.color),
        );
        output::print_notes(&notes, global.quiet);
    }
    Ok(())
}
