//! Wiring from configuration to a running bot

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use focusbot_config::FocusbotConfig;
use focusbot_gateway::bot::run_updates;
use focusbot_gateway::channels::{TelegramChannel, TelegramTransport};
use focusbot_gateway::services::{
    GmailMailer, GoogleCalendarClient, OpenAiTaskParser, OpenAiTranscriber, ProgressLog,
    ReportMailer,
};
use focusbot_gateway::{BotHandler, BotServices, BotSettings, GatewayError, RetentionStore};
use tracing::{info, warn};

pub fn bot_settings(config: &FocusbotConfig) -> Result<BotSettings> {
    Ok(BotSettings {
        utc_offset: config.timezone.offset()?,
        retention_window_hours: config.retention.window_hours,
        report_recipient: config.mail.report_recipient.clone(),
    })
}

/// Build the HTTP collaborators. Calendar and OpenAI credentials are
/// required; mail is optional and skipped without a recipient or token.
pub fn build_services(config: &FocusbotConfig) -> Result<BotServices, GatewayError> {
    let timeout = config.openai.timeout_secs;

    let calendar = GoogleCalendarClient::new(&config.calendar, timeout)?;
    let task_parser = OpenAiTaskParser::new(&config.openai)?;
    let transcriber = OpenAiTranscriber::new(&config.openai)?;
    let progress = ProgressLog::new(config.progress.resolved_data_dir());

    let mailer: Option<Arc<dyn ReportMailer>> = match &config.mail.report_recipient {
        Some(_) => match GmailMailer::new(&config.mail, timeout) {
            Ok(mailer) => Some(Arc::new(mailer)),
            Err(e) => {
                warn!(error = %e, "report recipient set but mail is not configured");
                None
            }
        },
        None => None,
    };

    Ok(BotServices {
        calendar: Arc::new(calendar),
        task_parser: Arc::new(task_parser),
        transcriber: Arc::new(transcriber),
        progress: Arc::new(progress),
        mailer,
    })
}

/// Serve until Ctrl-C, then drain in-flight handlers.
pub async fn run_bot(config: FocusbotConfig) -> Result<()> {
    config.validate()?;

    let settings = bot_settings(&config)?;
    let services = build_services(&config).context("Failed to set up collaborators")?;

    let transport = Arc::new(TelegramTransport::new(&config.telegram.bot_token));
    let store = Arc::new(RetentionStore::with_max_keep(config.retention.max_keep));
    let handler = Arc::new(BotHandler::new(transport, store, services, settings));

    let mut channel = TelegramChannel::new(config.telegram.clone());
    let updates = channel
        .take_update_receiver()
        .ok_or_else(|| anyhow!("Telegram update receiver already taken"))?;
    channel
        .start()
        .await
        .map_err(GatewayError::from)
        .context("Failed to start Telegram channel")?;

    info!(
        max_keep = config.retention.max_keep,
        window_hours = config.retention.window_hours,
        "focusbot running"
    );
    let runner = tokio::spawn(run_updates(handler, updates));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("shutting down");

    channel.stop().await.map_err(GatewayError::from)?;
    runner.await.context("Update loop panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> FocusbotConfig {
        let mut config = FocusbotConfig::default();
        config.telegram.bot_token = "123:abc".to_string();
        config.calendar.access_token = Some("ya29.token".to_string());
        config.openai.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_build_services_requires_calendar_token() {
        let mut config = configured();
        config.calendar.access_token = None;
        assert!(matches!(
            build_services(&config),
            Err(GatewayError::Service(_))
        ));
    }

    #[test]
    fn test_build_services_without_mail() {
        let services = build_services(&configured()).unwrap();
        assert!(services.mailer.is_none());
    }

    #[test]
    fn test_build_services_with_mail() {
        let mut config = configured();
        config.mail.report_recipient = Some("me@example.com".to_string());
        config.mail.access_token = Some("ya29.mail".to_string());
        assert!(build_services(&config).unwrap().mailer.is_some());
    }

    #[test]
    fn test_bot_settings_from_config() {
        let mut config = configured();
        config.timezone.utc_offset = "-04:00".to_string();
        config.retention.window_hours = 24;

        let settings = bot_settings(&config).unwrap();
        assert_eq!(settings.utc_offset.local_minus_utc(), -4 * 3600);
        assert_eq!(settings.retention_window_hours, 24);
        assert!(settings.report_recipient.is_none());
    }

    #[test]
    fn test_bot_settings_rejects_bad_offset() {
        let mut config = configured();
        config.timezone.utc_offset = "India".to_string();
        assert!(bot_settings(&config).is_err());
    }
}
