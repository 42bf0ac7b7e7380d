//! Clap derive structures for the `macprov` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module may
//! only depend on clap, clap_complete and std.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-level CLI ───────────────────────────────────────────────────

/// macprov: validate, generate and provision cable-modem MAC addresses
#[derive(Debug, Parser)]
#[command(
    name = "macprov",
    version,
    about = "Validate, generate and provision cable-modem MAC addresses",
    long_about = "Validate, generate and provision cable-modem MAC addresses.\n\n\
        Addresses are checked against an approved vendor (OUI) list, looked up in the\n\
        directory backend and registered with their provisioning values. The `serve`\n\
        command runs the same-origin edge proxy in front of the backend.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to use instead of the platform default
    #[arg(long, env = "MACPROV_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory API base URL (e.g. http://127.0.0.1:8080/api/ldap)
    #[arg(long, env = "MACPROV_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Answer lookups and provisioning locally without contacting the backend
    #[arg(long, env = "MACPROV_STUB", global = true)]
    pub stub: bool,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "MACPROV_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Accept invalid TLS certificates from the backend
    #[arg(long, short = 'k', env = "MACPROV_INSECURE", global = true)]
    pub insecure: bool,

    /// Mirror workflow transitions to the /api/log endpoint on the base URL's origin
    #[arg(long, env = "MACPROV_REMOTE_LOG", global = true)]
    pub remote_log: bool,

    /// Output format
    #[arg(
        long,
        short,
        env = "MACPROV_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    JsonCompact,
    Yaml,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Top-level Command Enum ──────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize typed MAC text and report whether it is complete
    Normalize(NormalizeArgs),

    /// Print a consecutive address sequence starting at a base address
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Validate addresses and look up their registration status
    Check(WorkflowArgs),

    /// Validate, look up and register addresses
    Provision(ProvisionArgs),

    /// Run the same-origin edge proxy in front of the directory backend
    Serve(ServeArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Address commands ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Raw text as typed, e.g. "a1b2c3" or "A1-B2-C3-00-00-01"
    pub text: String,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Base MAC address
    pub mac: String,

    /// Number of consecutive addresses [default: 4]
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct WorkflowArgs {
    /// Base MAC address
    pub mac: String,

    /// Number of consecutive addresses (overrides workflow.address_count)
    #[arg(long, short = 'n', env = "MACPROV_COUNT")]
    pub count: Option<usize>,

    /// Approved OUI list (overrides workflow.oui_file)
    #[arg(long, env = "MACPROV_OUI_FILE")]
    pub oui_file: Option<PathBuf>,

    /// Provisioning defaults (overrides workflow.defaults_file)
    #[arg(long, env = "MACPROV_DEFAULTS_FILE")]
    pub defaults_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Look up addresses with an unknown status once more before provisioning
    #[arg(long)]
    pub recheck: bool,

    /// Retry addresses that failed with a retryable error, up to N times
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
}

// ── Proxy ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (overrides proxy.listen)
    #[arg(long)]
    pub listen: Option<String>,

    /// Path prefix to forward (overrides proxy.prefix)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Backend base URL (overrides proxy.target)
    #[arg(long)]
    pub target: Option<String>,
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

// ── Completions ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
