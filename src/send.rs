//! Send pipeline - validate, create on the server, then refresh both views
//!
//! By default nothing is shown until the server has the message: the follow-up
//! refresh brings it in. With optimistic sending enabled a pending entry is
//! shown immediately and reconciled by that same refresh.

use crate::api::MessagingApi;
use crate::conversations::ConversationSync;
use crate::credentials::CredentialProvider;
use crate::error::{Error, Result};
use crate::models::{Message, MessageKind, NewMessage, PendingMessage};
use crate::selection::SelectionController;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Result of a send that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Server created the message
    Sent(Message),
    /// No session token; nothing was sent
    Unauthenticated,
}

/// Text the user is composing
#[derive(Debug, Clone, Default)]
pub struct ComposeBuffer {
    text: Arc<Mutex<String>>,
}

impl ComposeBuffer {
    pub fn set(&self, text: impl Into<String>) {
        if let Ok(mut guard) = self.text.lock() {
            *guard = text.into();
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.text.lock() {
            guard.clear();
        }
    }
}

pub struct SendPipeline {
    api: Arc<dyn MessagingApi>,
    credentials: Arc<dyn CredentialProvider>,
    selection: SelectionController,
    conversations: ConversationSync,
    compose: ComposeBuffer,
    optimistic: bool,
    pending_seq: AtomicU64,
}

impl SendPipeline {
    pub fn new(
        api: Arc<dyn MessagingApi>,
        credentials: Arc<dyn CredentialProvider>,
        selection: SelectionController,
        conversations: ConversationSync,
        optimistic: bool,
    ) -> Self {
        Self {
            api,
            credentials,
            selection,
            conversations,
            compose: ComposeBuffer::default(),
            optimistic,
            pending_seq: AtomicU64::new(0),
        }
    }

    pub fn compose(&self) -> &ComposeBuffer {
        &self.compose
    }

    /// Send whatever is in the compose buffer; cleared once the server has it
    pub async fn send_draft(&self, conversation_id: &str) -> Result<SendOutcome> {
        let draft = self.compose.text();
        self.deliver(conversation_id, &draft, true).await
    }

    /// Create a message in `conversation_id`, which must be the active conversation
    ///
    /// Validation failures return an error without touching the network or any
    /// state. On success the thread and conversation list are refreshed before
    /// returning. The compose buffer is left alone; use `send_draft` to send
    /// and consume it.
    pub async fn send(&self, conversation_id: &str, content: &str) -> Result<SendOutcome> {
        self.deliver(conversation_id, content, false).await
    }

    async fn deliver(
        &self,
        conversation_id: &str,
        content: &str,
        from_draft: bool,
    ) -> Result<SendOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let is_active = self
            .selection
            .active()
            .is_some_and(|h| h.conversation_id == conversation_id);
        if !is_active {
            return Err(Error::NoActiveConversation);
        }
        if self.credentials.token().is_none() {
            info!(conversation_id, "No session token, message not sent");
            return Ok(SendOutcome::Unauthenticated);
        }

        let pending = if self.optimistic {
            self.show_pending(conversation_id, content).await
        } else {
            None
        };

        let body = NewMessage {
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
            kind: MessageKind::Text,
        };

        match self.api.create_message(&body).await {
            Ok(message) => {
                info!(conversation_id, message_id = %message.id, "Message sent");
                if from_draft {
                    self.compose.clear();
                }
                tokio::join!(
                    self.selection.sync().refresh_now(),
                    self.conversations.refresh_now()
                );
                Ok(SendOutcome::Sent(message))
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "Failed to send message");
                if let Some(pending) = pending {
                    self.selection
                        .sync()
                        .store()
                        .write()
                        .await
                        .mark_failed(&pending.provisional_id);
                }
                Err(e)
            }
        }
    }

    async fn show_pending(&self, conversation_id: &str, content: &str) -> Option<PendingMessage> {
        let n = self.pending_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = PendingMessage {
            provisional_id: format!("pending-{}", n),
            conversation_id: conversation_id.to_string(),
            sender_id: self.credentials.user_id(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let store = self.selection.sync().store();
        let inserted = store.write().await.insert_pending(&pending);
        inserted.then_some(pending)
    }
}
