//! CLI commands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// focusbot - Telegram productivity assistant
#[derive(Parser, Debug)]
#[command(name = "focusbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (JSONC, JSON or YAML). Searched for when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the bot (default)
    Run,

    /// Validate configuration and print a redacted summary
    CheckConfig,
}

impl Cli {
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
