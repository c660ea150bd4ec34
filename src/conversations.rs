//! Conversation list - store and the synchronizer that keeps it fresh

use crate::api::MessagingApi;
use crate::credentials::CredentialProvider;
use crate::models::Conversation;
use crate::schedule::{spawn_poll_loop, PollPolicy, TickOutcome};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts from one snapshot replacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl UpsertSummary {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.changed == 0 && self.removed == 0
    }
}

/// Conversations visible to the current user, in server order
pub struct ConversationStore {
    conversations: Vec<Arc<Conversation>>,
    version: watch::Sender<u64>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            conversations: Vec::new(),
            version,
        }
    }

    /// Replace the contents with `snapshot`
    ///
    /// Unchanged entries keep their `Arc`, so subscribers can diff by pointer.
    /// An entry whose `updated_at` is older than the one already held is a late
    /// response and the held entry wins.
    pub fn upsert_all(&mut self, snapshot: Vec<Conversation>) -> UpsertSummary {
        let mut existing: HashMap<String, Arc<Conversation>> = self
            .conversations
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();

        let mut summary = UpsertSummary::default();
        let mut seen = HashSet::new();
        let mut next = Vec::with_capacity(snapshot.len());

        for mut conversation in snapshot {
            if !seen.insert(conversation.id.clone()) {
                debug!(conversation_id = %conversation.id, "Duplicate conversation in snapshot");
                continue;
            }

            conversation.dedup_participants();
            if conversation.participants.len() < 2 {
                warn!(
                    conversation_id = %conversation.id,
                    participants = conversation.participants.len(),
                    "Skipping conversation with fewer than two participants"
                );
                continue;
            }

            match existing.remove(&conversation.id) {
                Some(held) if *held == conversation || held.updated_at > conversation.updated_at => {
                    summary.unchanged += 1;
                    next.push(held);
                }
                Some(_) => {
                    summary.changed += 1;
                    next.push(Arc::new(conversation));
                }
                None => {
                    summary.added += 1;
                    next.push(Arc::new(conversation));
                }
            }
        }

        summary.removed = existing.len();
        let reordered = next.len() == self.conversations.len()
            && next
                .iter()
                .zip(&self.conversations)
                .any(|(a, b)| a.id != b.id);

        self.conversations = next;
        if !summary.is_noop() || reordered {
            self.version.send_modify(|v| *v += 1);
        }
        summary
    }

    pub fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        self.conversations.iter().find(|c| c.id == id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Conversation>> {
        self.conversations.clone()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

/// Synchronizer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Polling,
}

struct Inner {
    api: Arc<dyn MessagingApi>,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<RwLock<ConversationStore>>,
    policy: Arc<dyn PollPolicy>,
    generation: AtomicU64,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Polls `GET /conversations` into a [`ConversationStore`]
#[derive(Clone)]
pub struct ConversationSync {
    inner: Arc<Inner>,
}

impl ConversationSync {
    pub fn new(
        api: Arc<dyn MessagingApi>,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<RwLock<ConversationStore>>,
        policy: Arc<dyn PollPolicy>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                credentials,
                store,
                policy,
                generation: AtomicU64::new(0),
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> Arc<RwLock<ConversationStore>> {
        self.inner.store.clone()
    }

    pub fn state(&self) -> SyncState {
        match self.inner.cancel.lock() {
            Ok(guard) if guard.is_some() => SyncState::Polling,
            _ => SyncState::Idle,
        }
    }

    /// Fetch once, then keep polling; returns false when there is no session
    pub async fn start(&self) -> bool {
        if self.state() == SyncState::Polling {
            return true;
        }
        if self.inner.credentials.token().is_none() {
            info!("No session token, conversation sync not started");
            return false;
        }

        let cancel = CancellationToken::new();
        let generation = {
            let Ok(mut guard) = self.inner.cancel.lock() else {
                return false;
            };
            if guard.is_some() {
                return true;
            }
            *guard = Some(cancel.clone());
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(generation, "Conversation sync started");

        self.inner.fetch(generation).await;

        let inner = self.inner.clone();
        spawn_poll_loop(
            "conversations",
            self.inner.policy.clone(),
            cancel,
            move || {
                let inner = inner.clone();
                async move { inner.fetch(generation).await }
            },
        );
        true
    }

    /// Cancel the timer; a fetch already in flight is discarded when it lands
    pub fn stop(&self) {
        let token = match self.inner.cancel.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(token) = token {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            token.cancel();
            info!("Conversation sync stopped");
        }
    }

    /// Out-of-schedule refresh (after a send, on mount)
    pub async fn refresh_now(&self) -> TickOutcome {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.fetch(generation).await
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn fetch(&self, generation: u64) -> TickOutcome {
        if !self.is_current(generation) {
            return TickOutcome::Stale;
        }
        if self.credentials.token().is_none() {
            debug!("No session token, skipping conversation poll");
            return TickOutcome::Skipped;
        }

        let result = self.api.list_conversations().await;

        let mut store = self.store.write().await;
        if !self.is_current(generation) {
            debug!(generation, "Discarding stale conversation response");
            return TickOutcome::Stale;
        }

        match result {
            Ok(conversations) => {
                let summary = store.upsert_all(conversations);
                if !summary.is_noop() {
                    debug!(
                        added = summary.added,
                        changed = summary.changed,
                        removed = summary.removed,
                        "Conversation list updated"
                    );
                }
                TickOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, "Failed to poll conversations");
                TickOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn conversation(id: &str, updated: i64) -> Conversation {
        Conversation {
            id: id.to_string(),
            participants: vec![
                Participant {
                    id: "u1".to_string(),
                    display_name: "Ada".to_string(),
                },
                Participant {
                    id: "u2".to_string(),
                    display_name: "Grace".to_string(),
                },
            ],
            last_message_summary: None,
            created_at: at(0),
            updated_at: at(updated),
        }
    }

    fn ids(store: &ConversationStore) -> Vec<String> {
        store.list().iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_upsert_preserves_server_order() {
        let mut store = ConversationStore::new();
        let summary = store.upsert_all(vec![conversation("c2", 5), conversation("c1", 3)]);
        assert_eq!(summary.added, 2);
        assert_eq!(ids(&store), vec!["c2", "c1"]);
    }

    #[test]
    fn test_upsert_keeps_arc_for_unchanged() {
        let mut store = ConversationStore::new();
        store.upsert_all(vec![conversation("c1", 1), conversation("c2", 1)]);
        let before = store.get("c1").unwrap();

        let summary = store.upsert_all(vec![conversation("c1", 1), conversation("c2", 9)]);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.changed, 1);
        assert!(Arc::ptr_eq(&before, &store.get("c1").unwrap()));
        assert_eq!(store.get("c2").unwrap().updated_at, at(9));
    }

    #[test]
    fn test_upsert_drops_duplicates() {
        let mut store = ConversationStore::new();
        store.upsert_all(vec![conversation("c1", 2), conversation("c1", 7)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("c1").unwrap().updated_at, at(2));
    }

    #[test]
    fn test_upsert_removes_missing() {
        let mut store = ConversationStore::new();
        store.upsert_all(vec![conversation("c1", 1), conversation("c2", 1)]);
        let summary = store.upsert_all(vec![conversation("c2", 1)]);
        assert_eq!(summary.removed, 1);
        assert!(store.get("c1").is_none());
    }

    #[test]
    fn test_upsert_ignores_older_updated_at() {
        let mut store = ConversationStore::new();
        store.upsert_all(vec![conversation("c1", 10)]);
        store.upsert_all(vec![conversation("c1", 4)]);
        assert_eq!(store.get("c1").unwrap().updated_at, at(10));
    }

    #[test]
    fn test_upsert_skips_single_participant() {
        let mut store = ConversationStore::new();
        let mut lonely = conversation("c1", 1);
        lonely.participants.truncate(1);
        let mut duplicated = conversation("c2", 1);
        duplicated.participants[1].id = "u1".to_string();

        store.upsert_all(vec![lonely, duplicated, conversation("c3", 1)]);
        assert_eq!(ids(&store), vec!["c3"]);
    }

    #[test]
    fn test_version_tracks_changes() {
        let mut store = ConversationStore::new();
        store.upsert_all(vec![conversation("c1", 1), conversation("c2", 1)]);
        let v1 = store.version();

        store.upsert_all(vec![conversation("c1", 1), conversation("c2", 1)]);
        assert_eq!(store.version(), v1);

        store.upsert_all(vec![conversation("c2", 1), conversation("c1", 1)]);
        assert!(store.version() > v1);
        assert_eq!(ids(&store), vec!["c2", "c1"]);
    }
}
