//! Speech-to-text through an OpenAI-compatible transcription endpoint.

use async_trait::async_trait;
use focusbot_config::OpenAiSettings;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{ensure_success, http_client, ServiceError};

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the trimmed transcript; empty when nothing intelligible was said.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, ServiceError>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Telegram voice notes are OGG/Opus, which the endpoint accepts as-is.
pub struct OpenAiTranscriber {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiTranscriber {
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
            model: settings.transcription_model.clone(),
        })
    }
}

fn mime_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("ogg") | Some("oga") | Some("opus") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, ServiceError> {
        let file = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new().text("model", self.model.clone()).part("file", file);

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let transcript: TranscriptionResponse =
            ensure_success("transcriber", response).await?.json().await?;
        Ok(transcript.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> OpenAiSettings {
        OpenAiSettings {
            api_key: Some("sk-test".to_string()),
            base_url,
            ..Default::default()
        }
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("voice.ogg"), "audio/ogg");
        assert_eq!(mime_for("VOICE.OGA"), "audio/ogg");
        assert_eq!(mime_for("clip.wav"), "audio/wav");
        assert_eq!(mime_for("noextension"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_transcribe_trims_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(bearer_token("sk-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "  buy milk tomorrow \n"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = OpenAiTranscriber::new(&settings(server.uri())).unwrap();
        let text = transcriber
            .transcribe(vec![0x4f, 0x67, 0x67, 0x53], "voice.ogg")
            .await
            .unwrap();
        assert_eq!(text, "buy milk tomorrow");
    }

    #[tokio::test]
    async fn test_transcribe_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let transcriber = OpenAiTranscriber::new(&settings(server.uri())).unwrap();
        let err = transcriber
            .transcribe(Vec::new(), "voice.ogg")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Api { status: 429, ref body, .. } if body == "slow down"
        ));
    }
}
