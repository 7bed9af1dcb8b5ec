use crate::schema::FocusbotConfig;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A loaded configuration and where it came from.
///
/// `path` and `format` are `None` when no file was found and the
/// configuration was assembled from defaults and the environment.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: FocusbotConfig,
    pub path: Option<PathBuf>,
    pub format: Option<ConfigFormat>,
}

pub fn load_config(config_path: Option<&Path>) -> Result<FocusbotConfig> {
    resolve_config(config_path).map(|r| r.config)
}

pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = match config_path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    match path {
        Some(path) => load_config_from_file(&path),
        None => Ok(ResolvedConfig {
            config: apply_env_fallbacks(FocusbotConfig::default(), |key| env::var(key).ok()),
            path: None,
            format: None,
        }),
    }
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    let config = parse_config_content(&content, format)?;
    let config = apply_env_fallbacks(expand_env_vars(config), |key| env::var(key).ok());

    Ok(ResolvedConfig {
        config,
        path: Some(path.to_path_buf()),
        format: Some(format),
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<FocusbotConfig> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

const CONFIG_CANDIDATES: &[&str] = &[
    "focusbot.jsonc",
    "focusbot.json",
    "focusbot.yml",
    "focusbot.yaml",
    ".focusbot.jsonc",
    ".focusbot.json",
    ".focusbot.yml",
    ".focusbot.yaml",
];

pub fn find_config_file() -> Option<PathBuf> {
    for candidate in CONFIG_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    let config_dir = dirs::home_dir()?.join(".config").join("focusbot");
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| config_dir.join(candidate))
        .find(|path| path.exists())
}

fn expand_env_vars(mut config: FocusbotConfig) -> FocusbotConfig {
    config.telegram.bot_token = expand_env_string(&config.telegram.bot_token);
    config.calendar.access_token = config.calendar.access_token.map(|t| expand_env_string(&t));
    config.openai.api_key = config.openai.api_key.map(|k| expand_env_string(&k));
    config.mail.access_token = config.mail.access_token.map(|t| expand_env_string(&t));
    config.mail.report_recipient = config
        .mail
        .report_recipient
        .map(|r| expand_env_string(&r));
    config.timezone.utc_offset = expand_env_string(&config.timezone.utc_offset);
    config.progress.data_dir = config
        .progress
        .data_dir
        .map(|d| PathBuf::from(expand_env_string(&d.to_string_lossy())));
    config
}

/// Fill empty secrets from the conventional environment variables.
///
/// A value left unexpanded (still containing `$`) counts as empty.
fn apply_env_fallbacks<F>(mut config: FocusbotConfig, lookup: F) -> FocusbotConfig
where
    F: Fn(&str) -> Option<String>,
{
    fn missing(value: Option<&str>) -> bool {
        value.map_or(true, |v| v.trim().is_empty() || v.contains('$'))
    }

    if missing(Some(&config.telegram.bot_token)) {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = token;
        }
    }
    if missing(config.openai.api_key.as_deref()) {
        config.openai.api_key = lookup("OPENAI_API_KEY").or(config.openai.api_key);
    }
    if missing(config.calendar.access_token.as_deref()) {
        config.calendar.access_token =
            lookup("GOOGLE_ACCESS_TOKEN").or(config.calendar.access_token);
    }
    if missing(config.mail.access_token.as_deref()) {
        config.mail.access_token = config.calendar.access_token.clone();
    }
    if let Some(offset) = lookup("FOCUSBOT_UTC_OFFSET") {
        config.timezone.utc_offset = offset;
    }
    config
}

fn expand_env_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            if chars.peek() == Some(&'{') {
                // ${VAR} syntax
                chars.next();
                let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if let Ok(value) = env::var(&var_name) {
                    result.push_str(&value);
                } else {
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                }
            } else {
                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        var_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    result.push('$');
                } else if let Ok(value) = env::var(&var_name) {
                    result.push_str(&value);
                } else {
                    result.push('$');
                    result.push_str(&var_name);
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}
