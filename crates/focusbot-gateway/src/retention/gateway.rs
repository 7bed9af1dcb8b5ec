use std::sync::Arc;

use tracing::debug;

use super::store::RetentionStore;
use crate::channels::{
    ChannelError, ConversationId, MediaSource, SendOptions, SentMessage, Transport,
};

/// The only way the bot sends anything.
///
/// Each successful send is recorded in the [`RetentionStore`] so it can be
/// retracted later. A failed send returns the transport error untouched and
/// leaves the store alone.
#[derive(Clone)]
pub struct SendGateway {
    transport: Arc<dyn Transport>,
    store: Arc<RetentionStore>,
}

impl SendGateway {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<RetentionStore>) -> Self {
        Self { transport, store }
    }

    pub fn store(&self) -> &Arc<RetentionStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let sent = self
            .transport
            .send_text(conversation, text, &options)
            .await?;
        Ok(self.record(conversation, sent))
    }

    pub async fn send_animation(
        &self,
        conversation: ConversationId,
        animation: MediaSource,
        options: SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let sent = self
            .transport
            .send_animation(conversation, &animation, &options)
            .await?;
        Ok(self.record(conversation, sent))
    }

    pub async fn send_photo(
        &self,
        conversation: ConversationId,
        photo: MediaSource,
        options: SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let sent = self
            .transport
            .send_photo(conversation, &photo, &options)
            .await?;
        Ok(self.record(conversation, sent))
    }

    pub async fn send_document(
        &self,
        conversation: ConversationId,
        document: MediaSource,
        options: SendOptions,
    ) -> Result<SentMessage, ChannelError> {
        let sent = self
            .transport
            .send_document(conversation, &document, &options)
            .await?;
        Ok(self.record(conversation, sent))
    }

    fn record(&self, conversation: ConversationId, sent: SentMessage) -> SentMessage {
        self.store.remember(conversation, sent.message_id);
        debug!(
            conversation = %conversation,
            message_id = %sent.message_id,
            "remembered sent message"
        );
        sent
    }
}
