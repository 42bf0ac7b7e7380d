//! Command handlers, one module per subcommand.

pub mod check;
pub mod config_cmd;
pub mod generate;
pub mod normalize;
pub mod provision;
pub mod serve;
pub mod util;
