//! Config subcommand handlers.

use std::path::PathBuf;

use macprov_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

fn target_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

fn render_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = util::effective_config(global)?;
            let out = output::render_single(global.output, &cfg, render_toml, render_toml)?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = target_path(global);
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists; pass --force to overwrite", path.display()),
                });
            }
            config::save_config_to(&Config::default(), &path)?;
            output::print_output(&format!("Wrote {}", path.display()), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&target_path(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}
