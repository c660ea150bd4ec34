//! Message thread store - the ordered message list of the active conversation
//!
//! Merges are keyed by message id. Server payloads are the source of truth for
//! confirmed messages, but a status never moves backwards and locally pending
//! entries survive until the server confirms them or a failure is recorded.

use crate::models::{Message, MessageStatus, PendingMessage};
use tokio::sync::watch;
use tracing::debug;

/// Whether a merge should drive the loading indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Background poll
    Silent,
    /// Initial load or conversation switch
    Visible,
}

/// Summary of a single merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Pending entries replaced by their server-confirmed message
    pub reconciled: usize,
    /// True when the payload targeted another conversation and was dropped
    pub ignored: bool,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.reconciled > 0
    }
}

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    /// Arrival order, breaks timestamp ties
    seq: u64,
}

pub struct MessageThreadStore {
    conversation_id: Option<String>,
    entries: Vec<Entry>,
    next_seq: u64,
    loading: bool,
    version: watch::Sender<u64>,
}

impl Default for MessageThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageThreadStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            conversation_id: None,
            entries: Vec::new(),
            next_seq: 0,
            loading: false,
            version,
        }
    }

    /// Conversation the store currently holds
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Drop every message, pending ones included
    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.entries.clear();
        self.loading = false;
        self.bump();
    }

    /// Clear and start holding `conversation_id`
    pub fn reset(&mut self, conversation_id: &str) {
        self.clear();
        self.conversation_id = Some(conversation_id.to_string());
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Raise the loading signal for a visible fetch of the current conversation
    pub fn begin_visible_load(&mut self, conversation_id: &str) {
        if self.conversation_id.as_deref() == Some(conversation_id) && !self.loading {
            self.loading = true;
            self.bump();
        }
    }

    /// Lower the loading signal after a failed visible fetch
    pub fn end_visible_load(&mut self, conversation_id: &str) {
        if self.conversation_id.as_deref() == Some(conversation_id) && self.loading {
            self.loading = false;
            self.bump();
        }
    }

    /// Merge a server snapshot for `conversation_id`
    pub fn replace_or_merge(
        &mut self,
        conversation_id: &str,
        messages: Vec<Message>,
        mode: MergeMode,
    ) -> MergeOutcome {
        if self.conversation_id.as_deref() != Some(conversation_id) {
            debug!(
                conversation_id,
                current = ?self.conversation_id,
                "Dropping messages for inactive conversation"
            );
            return MergeOutcome {
                ignored: true,
                ..MergeOutcome::default()
            };
        }

        let mut outcome = MergeOutcome::default();

        for incoming in messages {
            if incoming.conversation_id != conversation_id {
                continue;
            }

            if let Some(entry) = self.entries.iter_mut().find(|e| e.message.id == incoming.id) {
                if apply_server_copy(&mut entry.message, incoming) {
                    outcome.updated += 1;
                }
                continue;
            }

            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| correlates(&e.message, &incoming))
            {
                // Keeps the pending entry's arrival slot
                entry.message = incoming;
                outcome.reconciled += 1;
                continue;
            }

            let seq = self.take_seq();
            self.entries.push(Entry {
                message: incoming,
                seq,
            });
            outcome.inserted += 1;
        }

        self.sort();

        let was_loading = self.loading;
        if mode == MergeMode::Visible {
            self.loading = false;
        }
        if outcome.changed() || was_loading != self.loading {
            self.bump();
        }

        outcome
    }

    /// Show a locally composed message before the server acknowledges it
    pub fn insert_pending(&mut self, pending: &PendingMessage) -> bool {
        if self.conversation_id.as_deref() != Some(pending.conversation_id.as_str()) {
            return false;
        }
        let seq = self.take_seq();
        self.entries.push(Entry {
            message: pending.to_message(),
            seq,
        });
        self.sort();
        self.bump();
        true
    }

    /// Record a send failure for a pending entry
    pub fn mark_failed(&mut self, provisional_id: &str) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.message.id == provisional_id)
        else {
            return false;
        };
        if !entry.message.status.can_advance_to(MessageStatus::Failed) {
            return false;
        }
        entry.message.status = MessageStatus::Failed;
        self.bump();
        true
    }

    /// Remove a pending or failed local entry
    pub fn discard(&mut self, provisional_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| {
            !(e.message.id == provisional_id
                && matches!(
                    e.message.status,
                    MessageStatus::Pending | MessageStatus::Failed
                ))
        });
        let removed = self.entries.len() != before;
        if removed {
            self.bump();
        }
        removed
    }

    /// Messages in display order
    pub fn messages(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.entries
            .iter()
            .map(|e| &e.message)
            .find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every observable change
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| (a.message.timestamp, a.seq).cmp(&(b.message.timestamp, b.seq)));
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

/// Overwrite with the server copy; status only ever moves forward
fn apply_server_copy(local: &mut Message, incoming: Message) -> bool {
    let status = local.status.advance(incoming.status);
    let changed = local.content != incoming.content
        || local.kind != incoming.kind
        || local.timestamp != incoming.timestamp
        || local.sender_id != incoming.sender_id
        || local.status != status;

    if changed {
        local.content = incoming.content;
        local.kind = incoming.kind;
        local.timestamp = incoming.timestamp;
        local.sender_id = incoming.sender_id;
        local.status = status;
    }
    changed
}

/// A server message confirms a pending entry with the same author and content
///
/// Without a known author only messages created after the pending entry count.
fn correlates(local: &Message, incoming: &Message) -> bool {
    if local.status != MessageStatus::Pending || local.content != incoming.content {
        return false;
    }
    if local.sender_id.is_empty() {
        incoming.timestamp >= local.timestamp
    } else {
        local.sender_id == incoming.sender_id
    }
}
