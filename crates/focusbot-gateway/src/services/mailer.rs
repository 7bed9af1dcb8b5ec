//! Report delivery through the Gmail REST API.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use chrono::Utc;
use focusbot_config::MailSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

use super::{ensure_success, http_client, ServiceError};

const MIME_LINE_WIDTH: usize = 76;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), ServiceError>;
}

pub struct GmailMailer {
    client: Client,
    access_token: SecretString,
    base_url: String,
}

impl GmailMailer {
    pub fn new(settings: &MailSettings, timeout_secs: u64) -> Result<Self, ServiceError> {
        let access_token = settings
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::Configuration("mail access token is not set".to_string())
            })?;

        Ok(Self {
            client: http_client(timeout_secs)?,
            access_token: SecretString::from(access_token),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReportMailer for GmailMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), ServiceError> {
        let boundary = format!(
            "focusbot-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let raw = URL_SAFE.encode(build_mime(message, &boundary));

        let response = self
            .client
            .post(format!("{}/gmail/v1/users/me/messages/send", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "raw": raw }))
            .send()
            .await?;
        ensure_success("gmail", response).await?;

        info!(to = %message.to, attachments = message.attachments.len(), "report mailed");
        Ok(())
    }
}

/// RFC 2047 encoded-word so non-ASCII subjects survive.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(MIME_LINE_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Assemble a `multipart/mixed` message with a text body and attachments.
pub fn build_mime(message: &EmailMessage, boundary: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("To: {}\r\n", message.to));
    out.push_str(&format!("Subject: {}\r\n", encode_header(&message.subject)));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
    ));

    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
    out.push_str(&wrap_base64(message.body.as_bytes()));
    out.push_str("\r\n");

    for attachment in &message.attachments {
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!(
            "Content-Type: {}; name=\"{}\"\r\n",
            attachment.content_type, attachment.file_name
        ));
        out.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n",
            attachment.file_name
        ));
        out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        out.push_str(&wrap_base64(&attachment.data));
        out.push_str("\r\n");
    }

    out.push_str(&format!("--{boundary}--\r\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "me@example.com".to_string(),
            subject: "📊 Productivity Report".to_string(),
            body: "Attached is your latest report.".to_string(),
            attachments: vec![Attachment {
                file_name: "progress.jsonl".to_string(),
                content_type: "application/json".to_string(),
                data: b"{\"task\":\"a\"}\n".to_vec(),
            }],
        }
    }

    #[test]
    fn test_build_mime_structure() {
        let mime = build_mime(&message(), "b1");

        assert!(mime.starts_with("To: me@example.com\r\n"));
        assert!(mime.contains("Subject: =?UTF-8?B?"));
        assert!(mime.contains("Content-Type: multipart/mixed; boundary=\"b1\""));
        assert!(mime.contains("filename=\"progress.jsonl\""));
        assert!(mime.contains(&STANDARD.encode("Attached is your latest report.")));
        assert_eq!(mime.matches("--b1\r\n").count(), 2);
        assert!(mime.ends_with("--b1--\r\n"));
    }

    #[test]
    fn test_ascii_subject_is_not_encoded() {
        assert_eq!(encode_header("Weekly report"), "Weekly report");
    }

    #[test]
    fn test_wrap_base64_line_width() {
        let wrapped = wrap_base64(&[0u8; 200]);
        assert!(wrapped.split("\r\n").all(|line| line.len() <= MIME_LINE_WIDTH));
        assert_eq!(wrapped.replace("\r\n", ""), STANDARD.encode([0u8; 200]));
    }

    #[tokio::test]
    async fn test_send_posts_raw_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(bearer_token("ya29.mail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;

        let settings = MailSettings {
            access_token: Some("ya29.mail".to_string()),
            report_recipient: Some("me@example.com".to_string()),
            base_url: server.uri(),
        };
        let mailer = GmailMailer::new(&settings, 5).unwrap();
        mailer.send(&message()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let raw = URL_SAFE.decode(body["raw"].as_str().unwrap()).unwrap();
        assert!(String::from_utf8(raw).unwrap().contains("To: me@example.com"));
    }
}
