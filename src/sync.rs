//! Message synchronizer - keeps the active thread fresh while it is selected

use crate::api::MessagingApi;
use crate::credentials::CredentialProvider;
use crate::schedule::{spawn_poll_loop, PollPolicy, TickOutcome};
use crate::thread::{MergeMode, MessageThreadStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadSyncState {
    Stopped,
    Active(String),
}

struct Active {
    conversation_id: String,
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    api: Arc<dyn MessagingApi>,
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<RwLock<MessageThreadStore>>,
    policy: Arc<dyn PollPolicy>,
    page_limit: u32,
    generation: AtomicU64,
    active: Mutex<Option<Active>>,
}

/// Polls `GET /conversations/{id}/messages` for exactly one conversation
#[derive(Clone)]
pub struct MessageSync {
    inner: Arc<Inner>,
}

impl MessageSync {
    pub fn new(
        api: Arc<dyn MessagingApi>,
        credentials: Arc<dyn CredentialProvider>,
        store: Arc<RwLock<MessageThreadStore>>,
        policy: Arc<dyn PollPolicy>,
        page_limit: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                credentials,
                store,
                policy,
                page_limit,
                generation: AtomicU64::new(0),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> Arc<RwLock<MessageThreadStore>> {
        self.inner.store.clone()
    }

    pub fn state(&self) -> ThreadSyncState {
        match self.current() {
            Some((conversation_id, _)) => ThreadSyncState::Active(conversation_id),
            None => ThreadSyncState::Stopped,
        }
    }

    /// Switch polling to `conversation_id`
    ///
    /// The previous timer is cancelled and the store cleared before the visible
    /// fetch of the new thread. Returns false when there is no session, in which
    /// case the synchronizer stays stopped.
    pub async fn activate(&self, conversation_id: &str) -> bool {
        if let Some((current, _)) = self.current() {
            if current == conversation_id {
                return true;
            }
        }

        let has_token = self.inner.credentials.token().is_some();
        let cancel = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let Ok(mut guard) = self.inner.active.lock() else {
                return false;
            };
            if let Some(previous) = guard.take() {
                previous.cancel.cancel();
                debug!(conversation_id = %previous.conversation_id, "Thread polling cancelled");
            }
            if has_token {
                *guard = Some(Active {
                    conversation_id: conversation_id.to_string(),
                    generation,
                    cancel: cancel.clone(),
                });
            }
        }

        {
            let mut store = self.inner.store.write().await;
            if !self.inner.is_current(generation) {
                return false;
            }
            if has_token {
                store.reset(conversation_id);
            } else {
                store.clear();
            }
        }

        if !has_token {
            info!(conversation_id, "No session token, thread sync not started");
            return false;
        }
        info!(conversation_id, generation, "Thread sync active");

        self.inner
            .fetch(conversation_id, generation, MergeMode::Visible)
            .await;

        let inner = self.inner.clone();
        let id = conversation_id.to_string();
        spawn_poll_loop("messages", self.inner.policy.clone(), cancel, move || {
            let inner = inner.clone();
            let id = id.clone();
            async move { inner.fetch(&id, generation, MergeMode::Silent).await }
        });
        true
    }

    /// Stop polling and drop the thread
    pub async fn stop(&self) {
        let previous = match self.inner.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = previous {
            previous.cancel.cancel();
            info!(conversation_id = %previous.conversation_id, "Thread sync stopped");
        }

        let mut store = self.inner.store.write().await;
        if self.inner.is_current(generation) {
            store.clear();
        }
    }

    /// Silent fetch of the active thread outside the schedule
    pub async fn refresh_now(&self) -> TickOutcome {
        match self.current() {
            Some((conversation_id, generation)) => {
                self.inner
                    .fetch(&conversation_id, generation, MergeMode::Silent)
                    .await
            }
            None => TickOutcome::Skipped,
        }
    }

    fn current(&self) -> Option<(String, u64)> {
        let guard = self.inner.active.lock().ok()?;
        guard
            .as_ref()
            .map(|a| (a.conversation_id.clone(), a.generation))
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn fetch(&self, conversation_id: &str, generation: u64, mode: MergeMode) -> TickOutcome {
        if !self.is_current(generation) {
            return TickOutcome::Stale;
        }
        if self.credentials.token().is_none() {
            debug!(conversation_id, "No session token, skipping thread poll");
            return TickOutcome::Skipped;
        }

        if mode == MergeMode::Visible {
            self.store.write().await.begin_visible_load(conversation_id);
        }

        let result = self
            .api
            .list_messages(conversation_id, self.page_limit)
            .await;

        let mut store = self.store.write().await;
        if !self.is_current(generation) {
            debug!(conversation_id, generation, "Discarding stale thread response");
            return TickOutcome::Stale;
        }

        match result {
            Ok(messages) => {
                let outcome = store.replace_or_merge(conversation_id, messages, mode);
                if outcome.changed() {
                    debug!(
                        conversation_id,
                        inserted = outcome.inserted,
                        updated = outcome.updated,
                        reconciled = outcome.reconciled,
                        "Thread updated"
                    );
                }
                TickOutcome::Applied
            }
            Err(e) => {
                if mode == MergeMode::Visible {
                    store.end_visible_load(conversation_id);
                }
                warn!(conversation_id, error = %e, "Failed to poll messages");
                TickOutcome::Failed
            }
        }
    }
}
