use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::store::RetentionStore;
use crate::channels::{ChannelError, ConversationId, MessageId, Transport};

/// How far back `/clear` reaches by default.
pub const DEFAULT_WINDOW_HOURS: i64 = 48;

/// Why a single delete did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetractionFailure {
    /// The message no longer exists on the platform.
    AlreadyGone,
    /// The platform refused: missing rights or past its own deletion deadline.
    NotDeletable(String),
    RateLimited(String),
    Transport(String),
}

impl From<&ChannelError> for RetractionFailure {
    fn from(err: &ChannelError) -> Self {
        match err {
            ChannelError::MessageNotFound => Self::AlreadyGone,
            ChannelError::MessageNotDeletable(reason) => Self::NotDeletable(reason.clone()),
            ChannelError::RateLimited(reason) => Self::RateLimited(reason.clone()),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetractionOutcome {
    Retracted,
    Failed(RetractionFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetractionAttempt {
    pub message_id: MessageId,
    pub outcome: RetractionOutcome,
}

/// Everything one retraction pass did, in the order deletes were issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetractionReport {
    pub attempts: Vec<RetractionAttempt>,
    /// Remembered messages older than the window, dropped without a delete.
    pub skipped: usize,
}

impl RetractionReport {
    pub fn retracted(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome == RetractionOutcome::Retracted)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (MessageId, &RetractionFailure)> {
        self.attempts.iter().filter_map(|a| match &a.outcome {
            RetractionOutcome::Failed(failure) => Some((a.message_id, failure)),
            RetractionOutcome::Retracted => None,
        })
    }
}

/// Deletes the recent part of a conversation's sent-message history.
///
/// Deletes go out one at a time, newest first, so the messages most likely
/// to still be deletable are tried before any platform deadline bites. A
/// failed delete never stops the pass. Whatever happens, every record read
/// at the start of the pass is forgotten afterwards, including entries that
/// were too old to attempt.
#[derive(Clone)]
pub struct BulkRetraction {
    transport: Arc<dyn Transport>,
    store: Arc<RetentionStore>,
}

impl BulkRetraction {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<RetentionStore>) -> Self {
        Self { transport, store }
    }

    /// Retract messages sent within the last `within_hours` hours and return
    /// how many deletes succeeded.
    /// A window too large to represent reaches back to the beginning.
    pub async fn clear_recent(&self, conversation: ConversationId, within_hours: i64) -> usize {
        let window = Duration::try_hours(within_hours).unwrap_or(Duration::MAX);
        self.retract(conversation, window).await.retracted()
    }

    pub async fn retract(
        &self,
        conversation: ConversationId,
        window: Duration,
    ) -> RetractionReport {
        self.retract_as_of(conversation, window, Utc::now()).await
    }

    /// Same as [`retract`](Self::retract) with an explicit "now".
    pub async fn retract_as_of(
        &self,
        conversation: ConversationId,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RetractionReport {
        let history = self.store.snapshot(conversation);
        if history.is_empty() {
            return RetractionReport::default();
        }

        // No cutoff when the window reaches past the representable range.
        let cutoff = now.checked_sub_signed(window);
        let mut report = RetractionReport::default();

        for record in history.iter().rev() {
            if cutoff.is_some_and(|cutoff| record.sent_at < cutoff) {
                report.skipped += 1;
                continue;
            }

            let outcome = match self
                .transport
                .delete_message(conversation, record.message_id)
                .await
            {
                Ok(()) => RetractionOutcome::Retracted,
                Err(err) => {
                    debug!(
                        conversation = %conversation,
                        message_id = %record.message_id,
                        error = %err,
                        "delete failed, continuing"
                    );
                    RetractionOutcome::Failed(RetractionFailure::from(&err))
                }
            };
            report.attempts.push(RetractionAttempt {
                message_id: record.message_id,
                outcome,
            });
        }

        // Out-of-window entries are dropped too; the history is not a retry queue.
        // Records remembered while the deletes were in flight stay.
        self.store.forget(conversation, &history);

        info!(
            conversation = %conversation,
            attempted = report.attempts.len(),
            retracted = report.retracted(),
            skipped = report.skipped,
            "retraction finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn setup() -> (BulkRetraction, Arc<MockTransport>, Arc<RetentionStore>) {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(RetentionStore::new());
        (
            BulkRetraction::new(transport.clone(), store.clone()),
            transport,
            store,
        )
    }

    #[tokio::test]
    async fn test_empty_history_contacts_nobody() {
        let (retraction, transport, _store) = setup();

        let count = retraction.clear_recent(ConversationId(1), 48).await;

        assert_eq!(count, 0);
        assert!(transport.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_window_and_newest_first_order() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        let now = Utc::now();
        store.remember_at(chat, MessageId(1), now - Duration::hours(72));
        store.remember_at(chat, MessageId(2), now - Duration::hours(10));
        store.remember_at(chat, MessageId(3), now - Duration::hours(1));

        let report = retraction
            .retract_as_of(chat, Duration::hours(48), now)
            .await;

        assert_eq!(transport.deleted(), vec![MessageId(3), MessageId(2)]);
        assert_eq!(report.retracted(), 2);
        assert_eq!(report.skipped, 1);
        assert!(store.snapshot(chat).is_empty());
    }

    #[tokio::test]
    async fn test_record_exactly_at_cutoff_is_eligible() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        let now = Utc::now();
        store.remember_at(chat, MessageId(1), now - Duration::hours(48));

        let report = retraction
            .retract_as_of(chat, Duration::hours(48), now)
            .await;

        assert_eq!(transport.deleted(), vec![MessageId(1)]);
        assert_eq!(report.retracted(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_absorbed_and_classified() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        let now = Utc::now();
        store.remember_at(chat, MessageId(1), now - Duration::hours(3));
        store.remember_at(chat, MessageId(2), now - Duration::hours(2));
        store.remember_at(chat, MessageId(3), now - Duration::hours(1));
        transport.fail_delete(MessageId(3), ChannelError::MessageNotFound);
        transport.fail_delete(
            MessageId(2),
            ChannelError::MessageNotDeletable("too old".to_string()),
        );

        let report = retraction
            .retract_as_of(chat, Duration::hours(48), now)
            .await;

        assert_eq!(
            transport.deleted(),
            vec![MessageId(3), MessageId(2), MessageId(1)]
        );
        assert_eq!(report.retracted(), 1);
        let failures: Vec<_> = report
            .failures()
            .map(|(id, f)| (id, f.clone()))
            .collect();
        assert_eq!(
            failures,
            vec![
                (MessageId(3), RetractionFailure::AlreadyGone),
                (
                    MessageId(2),
                    RetractionFailure::NotDeletable("too old".to_string())
                ),
            ]
        );
        assert!(store.snapshot(chat).is_empty());
    }

    #[tokio::test]
    async fn test_all_deletes_failing_still_clears() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        store.remember(chat, MessageId(1));
        transport.fail_delete(MessageId(1), ChannelError::Other("offline".to_string()));

        let count = retraction.clear_recent(chat, 48).await;

        assert_eq!(count, 0);
        assert!(store.is_empty(chat));
    }

    #[tokio::test]
    async fn test_other_conversations_untouched() {
        let (retraction, transport, store) = setup();
        store.remember(ConversationId(1), MessageId(1));
        store.remember(ConversationId(2), MessageId(2));

        let count = retraction.clear_recent(ConversationId(1), 48).await;

        assert_eq!(count, 1);
        assert_eq!(transport.deleted(), vec![MessageId(1)]);
        assert_eq!(store.len(ConversationId(2)), 1);
    }

    #[tokio::test]
    async fn test_clear_recent_counts_only_successes() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        store.remember(chat, MessageId(1));
        store.remember(chat, MessageId(2));
        transport.fail_delete(
            MessageId(2),
            ChannelError::MessageNotDeletable("message can't be deleted".to_string()),
        );

        let count = retraction.clear_recent(chat, 48).await;

        assert_eq!(count, 1);
        assert_eq!(transport.deleted(), vec![MessageId(2), MessageId(1)]);
        assert!(store.is_empty(chat));
    }

    #[tokio::test]
    async fn test_huge_window_reaches_everything() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        store.remember_at(chat, MessageId(1), Utc::now() - Duration::days(3650));
        store.remember(chat, MessageId(2));

        let count = retraction.clear_recent(chat, 100_000_000_000).await;

        assert_eq!(count, 2);
        assert_eq!(transport.deleted(), vec![MessageId(2), MessageId(1)]);
        assert!(store.is_empty(chat));
    }

    #[tokio::test]
    async fn test_window_past_min_datetime_has_no_cutoff() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        store.remember(chat, MessageId(1));

        let report = retraction
            .retract_as_of(chat, Duration::MAX, Utc::now())
            .await;

        assert_eq!(report.retracted(), 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(transport.deleted(), vec![MessageId(1)]);
        assert!(store.is_empty(chat));
    }

    #[tokio::test]
    async fn test_send_during_pass_is_kept_for_next_clear() {
        let (retraction, transport, store) = setup();
        let chat = ConversationId(1);
        store.remember(chat, MessageId(1));
        transport.set_delete_delay(std::time::Duration::from_millis(50));

        let pass = {
            let retraction = retraction.clone();
            tokio::spawn(async move { retraction.clear_recent(chat, 48).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        store.remember(chat, MessageId(2));

        assert_eq!(pass.await.unwrap(), 1);
        assert_eq!(transport.deleted(), vec![MessageId(1)]);
        let left: Vec<_> = store.snapshot(chat).iter().map(|r| r.message_id).collect();
        assert_eq!(left, vec![MessageId(2)]);

        assert_eq!(retraction.clear_recent(chat, 48).await, 1);
        assert!(store.is_empty(chat));
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            RetractionFailure::from(&ChannelError::RateLimited("retry in 3s".to_string())),
            RetractionFailure::RateLimited("retry in 3s".to_string())
        );
        assert_eq!(
            RetractionFailure::from(&ChannelError::ChannelClosed),
            RetractionFailure::Transport("Channel closed".to_string())
        );
    }
}
