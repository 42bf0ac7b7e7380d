//! `macprov serve`: run the edge proxy until Ctrl-C.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, ServeArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = util::effective_config(global)?;
    if let Some(ref listen) = args.listen {
        cfg.proxy.listen.clone_from(listen);
    }
    if let Some(ref prefix) = args.prefix {
        cfg.proxy.prefix.clone_from(prefix);
    }
    if let Some(ref target) = args.target {
        cfg.proxy.target.clone_from(target);
    }
    let proxy = cfg.proxy_config()?;

    output::print_notes(
        &format!(
            "Forwarding http://{}{} -> {} (Ctrl-C to stop)",
            proxy.listen, proxy.prefix, proxy.target
        ),
        global.quiet,
    );

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    macprov_proxy::serve(proxy, shutdown).await?;
    Ok(())
}
