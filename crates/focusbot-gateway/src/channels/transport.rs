use async_trait::async_trait;

use super::error::ChannelError;
use super::types::{ConversationId, MediaSource, MessageId, SendOptions, SentMessage};

/// The messaging capabilities the bot needs from a chat platform.
///
/// Every send returns the transport-assigned id so the message can be
/// retracted later; a failed send must return an error rather than an id.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError>;

    async fn send_animation(
        &self,
        conversation: ConversationId,
        animation: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError>;

    async fn send_photo(
        &self,
        conversation: ConversationId,
        photo: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError>;

    async fn send_document(
        &self,
        conversation: ConversationId,
        document: &MediaSource,
        options: &SendOptions,
    ) -> Result<SentMessage, ChannelError>;

    /// Any non-success outcome (already gone, forbidden, too old) is an error.
    async fn delete_message(
        &self,
        conversation: ConversationId,
        message_id: MessageId,
    ) -> Result<(), ChannelError>;

    /// Fetch the contents of an uploaded file, such as a voice note.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn test_mock_transport_assigns_increasing_ids() {
        let transport = MockTransport::new();
        let chat = ConversationId(7);

        let first = transport
            .send_text(chat, "one", &SendOptions::default())
            .await
            .unwrap();
        let second = transport
            .send_photo(
                chat,
                &MediaSource::url("https://example.com/a.png"),
                &SendOptions::default(),
            )
            .await
            .unwrap();

        assert!(second.message_id > first.message_id);
        assert_eq!(first.conversation_id, chat);
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_send_failure() {
        let transport = MockTransport::new();
        transport.fail_next_send(ChannelError::SendFailed("boom".to_string()));

        let result = transport
            .send_text(ConversationId(1), "hi", &SendOptions::default())
            .await;
        assert!(matches!(result, Err(ChannelError::SendFailed(_))));

        let result = transport
            .send_text(ConversationId(1), "hi", &SendOptions::default())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mock_transport_delete_failure_is_per_message() {
        let transport = MockTransport::new();
        transport.fail_delete(MessageId(2), ChannelError::MessageNotFound);

        assert!(transport
            .delete_message(ConversationId(1), MessageId(1))
            .await
            .is_ok());
        assert!(matches!(
            transport
                .delete_message(ConversationId(1), MessageId(2))
                .await,
            Err(ChannelError::MessageNotFound)
        ));
        assert_eq!(transport.deleted(), vec![MessageId(1), MessageId(2)]);
    }

    #[test]
    fn test_send_options_builders() {
        let options = SendOptions::markdown().with_caption("hello");
        assert_eq!(options.parse_mode, Some(crate::channels::ParseMode::Markdown));
        assert_eq!(options.caption.as_deref(), Some("hello"));
        assert!(options.keyboard.is_none());
    }
}
