mod cli;
mod commands;
mod error;
mod output;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);
    let verbose = cli.global.verbose > 0;

    if let Err(err) = run(cli).await {
        let err = err.with_verbosity(verbose);
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;
    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        Command::Normalize(ref args) => commands::normalize::handle(args, global),
        Command::Generate(ref args) => commands::generate::handle(args, global),
        Command::Check(ref args) => commands::check::handle(args, global).await,
        Command::Provision(ref args) => commands::provision::handle(args, global).await,
        Command::Serve(ref args) => commands::serve::handle(args, global).await,
        Command::Config(ref args) => commands::config_cmd::handle(args, global),
        Command::Completions(ref args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "macprov", &mut std::io::stdout());
            Ok(())
        }
    }
}
