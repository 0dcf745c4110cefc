//! CLI command-name contract for logging.

use crate::cli::parse::{Commands, ConfigCommands, MobileCommands, SnapshotCommands};

/// Command name string (e.g. "run", "mobile.activate").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Run { .. } => "run".to_string(),
        Commands::Facts { .. } => "facts".to_string(),
        Commands::Introspect { .. } => "introspect".to_string(),
        Commands::Mobile { command } => format!("mobile.{}", mobile_command_name(command)),
        Commands::Snapshot { command } => format!("snapshot.{}", snapshot_command_name(command)),
        Commands::Config { command } => match command {
            ConfigCommands::Show => "config.show".to_string(),
            ConfigCommands::Init { .. } => "config.init".to_string(),
        },
    }
}

pub fn mobile_command_name(command: &MobileCommands) -> &'static str {
    match command {
        MobileCommands::Activate { .. } => "activate",
        MobileCommands::Deactivate => "deactivate",
        MobileCommands::Status { .. } => "status",
    }
}

pub fn snapshot_command_name(command: &SnapshotCommands) -> &'static str {
    match command {
        SnapshotCommands::Share { .. } => "share",
        SnapshotCommands::Open { .. } => "open",
    }
}
