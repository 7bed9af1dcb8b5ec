use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::channels::{ConversationId, MessageId};

/// Messages remembered per conversation unless configured otherwise.
pub const DEFAULT_MAX_KEEP: usize = 300;

/// One message the bot sent, stamped when the send succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessageRecord {
    pub message_id: MessageId,
    pub sent_at: DateTime<Utc>,
}

/// Bounded, in-memory history of sent message ids per conversation.
///
/// One instance is built per application and shared by `Arc` between the
/// send gateway and the retraction policy. Histories are oldest-first and
/// never longer than `max_keep`. Nothing survives a restart.
///
/// The lock is only held for the duration of a single mutation or copy and
/// never across an `.await`.
#[derive(Debug)]
pub struct RetentionStore {
    max_keep: usize,
    histories: Mutex<HashMap<ConversationId, VecDeque<SentMessageRecord>>>,
}

impl RetentionStore {
    pub fn new() -> Self {
        Self::with_max_keep(DEFAULT_MAX_KEEP)
    }

    pub fn with_max_keep(max_keep: usize) -> Self {
        Self {
            max_keep,
            histories: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_keep(&self) -> usize {
        self.max_keep
    }

    /// Record a message sent just now.
    pub fn remember(&self, conversation: ConversationId, message_id: MessageId) {
        self.remember_at(conversation, message_id, Utc::now());
    }

    /// Record a message with an explicit send time, evicting the oldest
    /// entries until the history fits in `max_keep`.
    pub fn remember_at(
        &self,
        conversation: ConversationId,
        message_id: MessageId,
        sent_at: DateTime<Utc>,
    ) {
        let mut histories = self.histories.lock();
        let history = histories.entry(conversation).or_default();
        history.push_back(SentMessageRecord {
            message_id,
            sent_at,
        });
        while history.len() > self.max_keep {
            history.pop_front();
        }
    }

    /// Copy of the history, oldest first. Empty for unknown conversations.
    pub fn snapshot(&self, conversation: ConversationId) -> Vec<SentMessageRecord> {
        self.histories
            .lock()
            .get(&conversation)
            .map(|history| history.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget everything about a conversation. No-op if nothing is stored.
    pub fn clear(&self, conversation: ConversationId) {
        self.histories.lock().remove(&conversation);
    }

    /// Drop the given records from a conversation, keeping anything
    /// remembered since they were read.
    pub fn forget(&self, conversation: ConversationId, records: &[SentMessageRecord]) {
        let ids: HashSet<MessageId> = records.iter().map(|r| r.message_id).collect();
        let mut histories = self.histories.lock();
        if let Some(history) = histories.get_mut(&conversation) {
            history.retain(|record| !ids.contains(&record.message_id));
            if history.is_empty() {
                histories.remove(&conversation);
            }
        }
    }

    pub fn len(&self, conversation: ConversationId) -> usize {
        self.histories
            .lock()
            .get(&conversation)
            .map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, conversation: ConversationId) -> bool {
        self.len(conversation) == 0
    }

    /// Number of conversations with at least one remembered message.
    pub fn conversation_count(&self) -> usize {
        self.histories
            .lock()
            .values()
            .filter(|history| !history.is_empty())
            .count()
    }
}

impl Default for RetentionStore {
    fn default() -> Self {
        Self::new()
    }
}
