//! In-memory doubles for the transport and every collaborator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;

use crate::channels::{
    ChannelError, ConversationId, MediaSource, MessageId, SendOptions, SentMessage, Transport,
};
use crate::services::{
    CalendarEvent, CalendarService, EmailMessage, EventTime, NewEvent, ReportMailer,
    ServiceError, TaskDraft, TaskParser, Transcriber,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    Text,
    Animation,
    Photo,
    Document,
}

/// One successful send as the mock saw it. `text` is the caption for media.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRecord {
    pub kind: SentKind,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub text: String,
    pub media: Option<MediaSource>,
    pub options: SendOptions,
}

/// Assigns increasing message ids and records every call.
pub struct MockTransport {
    next_id: AtomicI32,
    sent: Mutex<Vec<SentRecord>>,
    send_error: Mutex<Option<ChannelError>>,
    delete_errors: Mutex<HashMap<MessageId, ChannelError>>,
    deleted: Mutex<Vec<MessageId>>,
    delete_delay: Mutex<Option<Duration>>,
    download: Mutex<Result<Vec<u8>, ChannelError>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            delete_errors: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            delete_delay: Mutex::new(None),
            download: Mutex::new(Ok(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Every delete sleeps for `delay` before answering.
    pub fn set_delete_delay(&self, delay: Duration) {
        *self.delete_delay.lock() = Some(delay);
    }

    /// The next send of any kind fails with `error`; later sends succeed.
    pub fn fail_next_send(&self, error: ChannelError) {
        *self.send_error.lock() = Some(error);
    }

    /// Every delete of `message_id` fails with `error`.
    pub fn fail_delete(&self, message_id: MessageId, error: ChannelError) {
        self.delete_errors.lock().insert(message_id, error);
    }

    /// Every delete attempt in call order, failed ones included.
    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().clone()
    }

    pub fn set_download(&self, data: Vec<u8>) {
        *self.download.lock() = Ok(data);
    }

    pub fn fail_download(&self, error: ChannelError) {
        *self.download.lock() = Err(error);
    }

    fn record(
        &self,
        kind: SentKind,
        conversation: ConversationId,
        text: &str,
        media: Option<&MediaSource>,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        if let Some(error) = self.send_error.lock().take() {
            return Err(error);
        }

        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().push(SentRecord {
            kind,
            conversation_id: conversation,
            message_id,
            text: text.to_string(),
            media: media.cloned(),
            options: options.clone(),
        });

        Ok(SentMessage {
            conversation_id: conversation,
            message_id,
            date: Utc::now(),
        })
    }

    fn record_media(
        &self,
        kind: SentKind,
        conversation: ConversationId,
        media: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let caption = options.caption.clone().unwrap_or_default();
        self.record(kind, conversation, &caption, Some(media), options)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        self.record(SentKind::Text, conversation, text, None, options)
    }

    async fn send_animation(
        &self,
        conversation: ConversationId,
        animation: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        self.record_media(SentKind::Animation, conversation, animation, options)
    }

    async fn send_photo(
        &self,
        conversation: ConversationId,
        photo: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        self.record_media(SentKind::Photo, conversation, photo, options)
    }

    async fn send_document(
        &self,
        conversation: ConversationId,
        document: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        self.record_media(SentKind::Document, conversation, document, options)
    }

    async fn delete_message(
        &self,
        _conversation: ConversationId,
        message_id: MessageId,
    ) -> Result<(), ChannelError> {
        let delay = *self.delete_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.deleted.lock().push(message_id);
        match self.delete_errors.lock().get(&message_id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>, ChannelError> {
        self.download.lock().clone()
    }
}

/// Returns the configured events for any range and records inserts.
#[derive(Default)]
pub struct MockCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    added: Mutex<Vec<NewEvent>>,
    last_range: Mutex<Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>>,
    error: Mutex<Option<ServiceError>>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_events(&self, events: Vec<CalendarEvent>) {
        *self.events.lock() = events;
    }

    /// ServiceError is not Clone, so the failure is single-use.
    pub fn fail_next(&self, error: ServiceError) {
        *self.error.lock() = Some(error);
    }

    pub fn added(&self) -> Vec<NewEvent> {
        self.added.lock().clone()
    }

    pub fn last_range(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        *self.last_range.lock()
    }
}

#[async_trait]
impl CalendarService for MockCalendar {
    async fn list_events_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, ServiceError> {
        *self.last_range.lock() = Some((start, end));
        if let Some(error) = self.error.lock().take() {
            return Err(error);
        }
        Ok(self.events.lock().clone())
    }

    async fn add_event(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError> {
        if let Some(error) = self.error.lock().take() {
            return Err(error);
        }
        self.added.lock().push(event.clone());
        Ok(CalendarEvent {
            id: Some(format!("mock-{}", self.added.lock().len())),
            summary: Some(event.title.clone()),
            description: Some(event.description.clone()),
            start: EventTime::at(event.start),
            end: EventTime::at(event.end),
        })
    }
}

/// Fails with `InvalidResponse` until a draft is configured.
#[derive(Default)]
pub struct MockTaskParser {
    draft: Mutex<Option<TaskDraft>>,
    requests: Mutex<Vec<String>>,
}

impl MockTaskParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_draft(&self, draft: TaskDraft) {
        *self.draft.lock() = Some(draft);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TaskParser for MockTaskParser {
    async fn parse_task(
        &self,
        text: &str,
        _now: DateTime<FixedOffset>,
    ) -> Result<TaskDraft, ServiceError> {
        self.requests.lock().push(text.to_string());
        self.draft
            .lock()
            .clone()
            .ok_or_else(|| ServiceError::InvalidResponse("no task configured".to_string()))
    }
}

/// Returns an empty transcript unless told otherwise.
#[derive(Default)]
pub struct MockTranscriber {
    transcript: Mutex<String>,
    received: Mutex<Vec<Vec<u8>>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transcript(&self, text: &str) {
        *self.transcript.lock() = text.to_string();
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, _file_name: &str) -> Result<String, ServiceError> {
        self.received.lock().push(audio);
        Ok(self.transcript.lock().clone())
    }
}

#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicUsize,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    /// The next `count` sends fail with an API error.
    pub fn fail_next(&self, count: usize) {
        self.fail.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportMailer for MockMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), ServiceError> {
        let failing = self
            .fail
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ServiceError::Api {
                service: "gmail",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_records_caption_for_media() {
        let transport = MockTransport::new();
        let options = SendOptions::default().with_caption("hi there");
        transport
            .send_animation(ConversationId(1), &MediaSource::url("https://x/a.gif"), &options)
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].kind, SentKind::Animation);
        assert_eq!(sent[0].text, "hi there");
        assert_eq!(sent[0].media, Some(MediaSource::url("https://x/a.gif")));
    }

    #[tokio::test]
    async fn test_mock_transport_download() {
        let transport = MockTransport::new();
        assert!(transport.download_file("f").await.unwrap().is_empty());

        transport.set_download(vec![1, 2, 3]);
        assert_eq!(transport.download_file("f").await.unwrap(), vec![1, 2, 3]);

        transport.fail_download(ChannelError::Download("gone".to_string()));
        assert!(matches!(
            transport.download_file("f").await,
            Err(ChannelError::Download(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_mailer_failure_is_counted() {
        let mailer = MockMailer::new();
        mailer.fail_next(1);
        let message = EmailMessage {
            to: "a@b.c".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
            attachments: Vec::new(),
        };

        assert!(mailer.send(&message).await.is_err());
        assert!(mailer.send(&message).await.is_ok());
        assert_eq!(mailer.sent().len(), 1);
    }
}
