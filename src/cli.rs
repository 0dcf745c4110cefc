//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to the workbench.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands, MobileCommands, SnapshotCommands};
pub use presentation::{format_facts, format_identity, format_trace_report};
pub use route::RunContext;
