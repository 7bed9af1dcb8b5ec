//! focusbot - Telegram productivity assistant

use clap::Parser;
use colored::Colorize;

use focusbot_cli::app::run_bot;
use focusbot_cli::{Cli, Commands, ConfigSummary};
use focusbot_config::resolve_config;
use focusbot_telemetry::{init_subscriber, TelemetryConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let resolved = resolve_config(cli.config.as_deref())?;

    match cli.resolved_command() {
        Commands::CheckConfig => {
            resolved.config.validate()?;
            print!("{}", ConfigSummary::from_resolved(&resolved));
            println!("{} configuration is valid", "✓".green());
            Ok(())
        }
        Commands::Run => {
            let logging = &resolved.config.logging;
            init_subscriber(&TelemetryConfig::new(
                cli.log_level.clone().unwrap_or_else(|| logging.level.clone()),
                cli.json_logs || logging.json,
            ));
            if let Some(path) = &resolved.path {
                tracing::info!(config = %path.display(), "loaded configuration");
            }
            run_bot(resolved.config).await
        }
    }
}
