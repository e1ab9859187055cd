//! CLI module for Plugsmith
//!
//! Operator commands over the coordination core:
//! - `sessions`: inspect and clean up persisted sessions
//! - `scan`: run the guardrails over text or a file
//! - `phases`: list the canonical workflow phases

use clap::{Parser, Subcommand, ValueEnum};
use plugsmith_core::{OutputKind, CANONICAL_PHASES};

use crate::config::load_config;

pub mod scan;
pub mod sessions;

/// Plugsmith CLI
#[derive(Parser, Debug)]
#[command(name = "plugsmith")]
#[command(about = "Coordination core of the Plugsmith WordPress plugin generator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect persisted sessions
    #[command(subcommand)]
    Sessions(SessionCommands),
    /// Run guardrail checks
    #[command(subcommand)]
    Scan(ScanCommands),
    /// List the canonical workflow phases
    Phases,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List sessions, newest first
    List,
    /// Show one session
    Show {
        /// Session id
        id: String,
    },
    /// Delete session files older than the retention window
    Cleanup {
        /// Age in days (defaults to context.retention_days)
        #[arg(long)]
        days: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScanCommands {
    /// Validate a user request
    Input {
        /// Request text
        text: String,
    },
    /// Validate generated output stored in a file
    File {
        /// File to scan
        path: std::path::PathBuf,
        /// How to interpret the file
        #[arg(long, value_enum, default_value_t = ScanKind::Code)]
        kind: ScanKind,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum ScanKind {
    Code,
    PluginFiles,
    ComplianceReport,
}

impl From<ScanKind> for OutputKind {
    fn from(kind: ScanKind) -> Self {
        match kind {
            ScanKind::Code => OutputKind::Code,
            ScanKind::PluginFiles => OutputKind::PluginFiles,
            ScanKind::ComplianceReport => OutputKind::ComplianceReport,
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Sessions(cmd)) => sessions::run(cmd, &load_config()?),
        Some(Commands::Scan(cmd)) => scan::run(cmd, &load_config()?),
        Some(Commands::Phases) => {
            for (i, phase) in CANONICAL_PHASES.iter().enumerate() {
                println!("{}. {}", i + 1, phase.as_str());
            }
            Ok(())
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_file_kind() {
        let cli = Cli::try_parse_from([
            "plugsmith", "scan", "file", "out.json", "--kind", "plugin_files",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Scan(ScanCommands::File { kind, .. })) => {
                assert_eq!(OutputKind::from(kind), OutputKind::PluginFiles);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_cleanup_days() {
        let cli = Cli::try_parse_from(["plugsmith", "sessions", "cleanup", "--days", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Sessions(SessionCommands::Cleanup { days: Some(3) }))
        ));
    }
}
