use anyhow::{anyhow, bail, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main focusbot configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `focusbot.jsonc` - JSON with comments
/// 2. `focusbot.json` - Standard JSON
/// 3. `focusbot.yml` / `focusbot.yaml` - YAML format
///
/// Also checks hidden variants (`.focusbot.*`) and `~/.config/focusbot/` for global config.
/// Every section is optional; missing secrets fall back to environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusbotConfig {
    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Sent-message retention and retraction
    #[serde(default)]
    pub retention: RetentionSettings,

    /// Google Calendar access
    #[serde(default)]
    pub calendar: CalendarSettings,

    /// OpenAI-compatible endpoints for task parsing and transcription
    #[serde(default)]
    pub openai: OpenAiSettings,

    /// Report delivery by email
    #[serde(default)]
    pub mail: MailSettings,

    /// Progress log storage
    #[serde(default)]
    pub progress: ProgressSettings,

    /// Local timezone used for schedules and task times
    #[serde(default)]
    pub timezone: TimezoneSettings,

    /// Log output
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl FocusbotConfig {
    /// Check that the configuration can start a bot.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("TELEGRAM_BOT_TOKEN not set. Add it to the environment or the config file");
        }
        self.timezone.offset()?;
        let hours = self.retention.window_hours;
        if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
            bail!("retention.window_hours must be between 1 and {MAX_WINDOW_HOURS}, got {hours}");
        }
        Ok(())
    }
}

// ============================================================================
// Telegram Configuration
// ============================================================================

/// Telegram settings
///
/// # Example
///
/// ```yaml
/// telegram:
///   bot_token: ${TELEGRAM_BOT_TOKEN}
///   allowed_users:
///     - "@alice"
///     - "123456789"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: String,

    /// Usernames (with or without `@`) or numeric user ids. Empty allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

// ============================================================================
// Retention Configuration
// ============================================================================

/// Longest `/clear` window accepted by `validate` (one year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// How many sent messages are remembered per chat and how far back `/clear` reaches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Messages remembered per conversation (default: 300)
    #[serde(default = "default_max_keep")]
    pub max_keep: usize,

    /// Age window for `/clear` in hours (default: 48)
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_keep: default_max_keep(),
            window_hours: default_window_hours(),
        }
    }
}

fn default_max_keep() -> usize {
    300
}

fn default_window_hours() -> i64 {
    48
}

// ============================================================================
// Calendar Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// OAuth bearer token for the Calendar API
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    #[serde(default = "default_google_api_base")]
    pub base_url: String,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            calendar_id: default_calendar_id(),
            base_url: default_google_api_base(),
        }
    }
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_google_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

// ============================================================================
// OpenAI Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base")]
    pub base_url: String,

    /// Model used to extract tasks from free text
    #[serde(default = "default_task_model")]
    pub task_model: String,

    /// Model used for voice note transcription
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base(),
            task_model: default_task_model(),
            transcription_model: default_transcription_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_openai_base() -> String {
    "https://api.openai.com".to_string()
}

fn default_task_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

// ============================================================================
// Mail Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    /// Gmail bearer token. Falls back to `calendar.access_token` when unset.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Where `/report` mails a copy. No email is sent when unset.
    #[serde(default)]
    pub report_recipient: Option<String>,

    #[serde(default = "default_gmail_base")]
    pub base_url: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            report_recipient: None,
            base_url: default_gmail_base(),
        }
    }
}

fn default_gmail_base() -> String {
    "https://gmail.googleapis.com".to_string()
}

// ============================================================================
// Progress Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSettings {
    /// Directory holding the progress log (default: platform data dir + `focusbot`)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl ProgressSettings {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("focusbot")
        })
    }
}

// ============================================================================
// Timezone Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneSettings {
    /// Fixed UTC offset such as `+05:30` or `-08:00`
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for TimezoneSettings {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> String {
    "+05:30".to_string()
}

impl TimezoneSettings {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `Z` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid UTC offset"));
    }

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => bail!("UTC offset must start with '+' or '-': {raw}"),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("UTC offset must look like +HH:MM: {raw}");
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if hours > 14 || minutes > 59 {
        bail!("UTC offset out of range: {raw}");
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("UTC offset out of range: {raw}"))
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
