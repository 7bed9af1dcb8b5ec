//! Natural-language task extraction through an OpenAI-compatible chat endpoint.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone};
use focusbot_config::OpenAiSettings;
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_success, http_client, ServiceError};

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// A task ready to be put on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[async_trait]
pub trait TaskParser: Send + Sync {
    /// `now` anchors relative phrases like "tomorrow" and fixes the offset
    /// naive times are read in.
    async fn parse_task(
        &self,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<TaskDraft, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default)]
    title: String,
    start: String,
    #[serde(default)]
    end: Option<String>,
}

/// Pull the first `{...}` block out of a model reply and read it as a task.
pub fn extract_task(raw: &str, offset: FixedOffset) -> Result<TaskDraft, ServiceError> {
    let json = JSON_OBJECT
        .find(raw)
        .ok_or_else(|| ServiceError::InvalidResponse(format!("no JSON object in: {raw}")))?;
    let task: RawTask = serde_json::from_str(json.as_str())
        .map_err(|e| ServiceError::InvalidResponse(format!("bad task JSON: {e}")))?;

    let title = task.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::InvalidResponse("task has no title".to_string()));
    }

    let start = parse_local_datetime(&task.start, offset)
        .ok_or_else(|| ServiceError::InvalidResponse(format!("bad start time: {}", task.start)))?;
    let end = task
        .end
        .as_deref()
        .and_then(|end| parse_local_datetime(end, offset))
        .filter(|end| *end > start)
        .unwrap_or_else(|| start + Duration::hours(1));

    Ok(TaskDraft { title, start, end })
}

/// RFC 3339 keeps its own offset; naive times are read in `offset`.
pub fn parse_local_datetime(value: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&offset));
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
}

fn build_prompt(text: &str, now: DateTime<FixedOffset>) -> String {
    format!(
        r#"You are a date/time and task extraction assistant.
The current local time is {now}.
Input: "{text}"
Output JSON with fields:
{{
  "title": "<task title>",
  "start": "<YYYY-MM-DD HH:MM>",
  "end": "<YYYY-MM-DD HH:MM>"
}}
If end time not specified, set 1 hour after start.
Always return valid JSON only."#,
        now = now.format("%Y-%m-%d %H:%M (%A)"),
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiTaskParser {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiTaskParser {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, ServiceError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServiceError::Configuration("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            client: http_client(settings.timeout_secs)?,
            api_key: SecretString::from(api_key),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.task_model.clone(),
        })
    }
}

#[async_trait]
impl TaskParser for OpenAiTaskParser {
    async fn parse_task(
        &self,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<TaskDraft, ServiceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "system",
                content: build_prompt(text, now),
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let reply: ChatResponse = ensure_success("task parser", response).await?.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("empty completion".to_string()))?;

        debug!(reply = %content, "task parser reply");
        extract_task(&content, *now.offset())
    }
}
