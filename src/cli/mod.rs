mod commands;
pub mod context;
pub mod output;
mod shell;

pub use context::{CliError, CliMode, CommandError, LoopControl, ShellContext};
pub use shell::{run_cli, SCRIPT_ENV_VAR};
