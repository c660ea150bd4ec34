//! Selection controller - which conversation the thread view is showing

use crate::models::Conversation;
use crate::sync::{MessageSync, ThreadSyncState};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// The one conversation targeted by the message synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversationHandle {
    pub conversation_id: String,
}

#[derive(Clone)]
pub struct SelectionController {
    sync: MessageSync,
    active: Arc<Mutex<Option<ActiveConversationHandle>>>,
}

impl SelectionController {
    pub fn new(sync: MessageSync) -> Self {
        Self {
            sync,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn sync(&self) -> &MessageSync {
        &self.sync
    }

    pub fn active(&self) -> Option<ActiveConversationHandle> {
        self.active.lock().ok().and_then(|guard| guard.clone())
    }

    pub async fn select(&self, conversation: &Conversation) -> bool {
        self.select_id(&conversation.id).await
    }

    /// Make `conversation_id` active; reselecting the running conversation is a no-op
    ///
    /// The selection is recorded even when the synchronizer cannot start for
    /// lack of a session. Returns whether thread polling is running.
    pub async fn select_id(&self, conversation_id: &str) -> bool {
        let already_selected = self
            .active()
            .is_some_and(|h| h.conversation_id == conversation_id);
        if already_selected
            && self.sync.state() == ThreadSyncState::Active(conversation_id.to_string())
        {
            debug!(conversation_id, "Conversation already active");
            return true;
        }

        if let Ok(mut guard) = self.active.lock() {
            *guard = Some(ActiveConversationHandle {
                conversation_id: conversation_id.to_string(),
            });
        }
        self.sync.activate(conversation_id).await
    }

    /// Drop the selection and stop thread polling (view dismissed)
    pub async fn deselect(&self) {
        if let Ok(mut guard) = self.active.lock() {
            guard.take();
        }
        self.sync.stop().await;
    }
}
