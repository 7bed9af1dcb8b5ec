//! Human-readable view of the resolved configuration

use std::fmt;

use colored::Colorize;
use focusbot_config::ResolvedConfig;

/// Keep a short prefix so the operator can tell tokens apart.
pub fn redact_secret(secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return "not set".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

fn redact_optional(secret: Option<&str>) -> String {
    redact_secret(secret.unwrap_or_default())
}

/// Ordered `key: value` rows describing what the bot will run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSummary {
    pub source: String,
    pub rows: Vec<(String, String)>,
}

impl ConfigSummary {
    pub fn from_resolved(resolved: &ResolvedConfig) -> Self {
        let config = &resolved.config;
        let source = match &resolved.path {
            Some(path) => path.display().to_string(),
            None => "defaults + environment".to_string(),
        };

        let allowed_users = if config.telegram.allowed_users.is_empty() {
            "everyone".to_string()
        } else {
            config.telegram.allowed_users.join(", ")
        };

        let rows = vec![
            ("telegram.bot_token", redact_secret(&config.telegram.bot_token)),
            ("telegram.allowed_users", allowed_users),
            ("retention.max_keep", config.retention.max_keep.to_string()),
            ("retention.window_hours", config.retention.window_hours.to_string()),
            (
                "calendar.access_token",
                redact_optional(config.calendar.access_token.as_deref()),
            ),
            ("calendar.calendar_id", config.calendar.calendar_id.clone()),
            ("openai.api_key", redact_optional(config.openai.api_key.as_deref())),
            ("openai.task_model", config.openai.task_model.clone()),
            (
                "openai.transcription_model",
                config.openai.transcription_model.clone(),
            ),
            (
                "mail.report_recipient",
                config
                    .mail
                    .report_recipient
                    .clone()
                    .unwrap_or_else(|| "not set".to_string()),
            ),
            (
                "progress.data_dir",
                config.progress.resolved_data_dir().display().to_string(),
            ),
            ("timezone.utc_offset", config.timezone.utc_offset.clone()),
            ("logging.level", config.logging.level.clone()),
        ];

        Self {
            source,
            rows: rows.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ConfigSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", "Config:".cyan().bold(), self.source)?;
        writeln!(f, "{}", "─".repeat(50).dimmed())?;
        let width = self.rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in &self.rows {
            writeln!(f, "{:width$}  {}", key, value.yellow())?;
        }
        Ok(())
    }
}
