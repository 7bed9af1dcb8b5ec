use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::handler::BotHandler;
use crate::channels::{ConversationId, InboundUpdate};

/// Drive `handler` until the update stream closes.
///
/// Each conversation gets its own worker, so updates for one chat are
/// handled one after another in arrival order while different chats proceed
/// in parallel. Workers drain their queues before this returns.
pub async fn run_updates(handler: Arc<BotHandler>, mut updates: mpsc::Receiver<InboundUpdate>) {
    let mut queues: HashMap<ConversationId, mpsc::UnboundedSender<InboundUpdate>> =
        HashMap::new();
    let mut workers = JoinSet::new();

    while let Some(update) = updates.recv().await {
        debug!(
            conversation = %update.conversation_id,
            sender = %update.sender,
            request = ?update.request,
            "inbound update"
        );

        let queue = queues.entry(update.conversation_id).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            workers.spawn(conversation_worker(handler.clone(), rx));
            tx
        });
        if let Err(mpsc::error::SendError(update)) = queue.send(update) {
            warn!(conversation = %update.conversation_id, "conversation worker gone");
        }
    }

    drop(queues);
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "conversation worker panicked");
        }
    }
    info!("update stream closed");
}

async fn conversation_worker(
    handler: Arc<BotHandler>,
    mut queue: mpsc::UnboundedReceiver<InboundUpdate>,
) {
    while let Some(update) = queue.recv().await {
        let conversation = update.conversation_id;
        if let Err(e) = handler.handle_update(update).await {
            warn!(conversation = %conversation, error = %e, "failed to reply");
        }
    }
}
