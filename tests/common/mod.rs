//! Shared fixtures: an in-memory backend and data builders

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use provider_inbox::api::MessagingApi;
use provider_inbox::config::Config;
use provider_inbox::credentials::MemoryCredentials;
use provider_inbox::models::{
    Conversation, Message, MessageKind, MessageStatus, NewMessage, Participant,
};
use provider_inbox::{Error, Inbox, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const SELF_ID: &str = "provider-1";
pub const OTHER_ID: &str = "client-7";

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn conversation(id: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        participants: vec![
            Participant {
                id: SELF_ID.to_string(),
                display_name: "Provider".to_string(),
            },
            Participant {
                id: OTHER_ID.to_string(),
                display_name: "Client".to_string(),
            },
        ],
        last_message_summary: None,
        created_at: at(0),
        updated_at: at(0),
    }
}

pub fn message(id: &str, conversation_id: &str, secs: i64, status: MessageStatus) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: OTHER_ID.to_string(),
        content: format!("text of {}", id),
        kind: MessageKind::Text,
        status,
        timestamp: at(secs),
    }
}

/// Backend double that records every call
#[derive(Default)]
pub struct FakeApi {
    conversations: Mutex<Vec<Conversation>>,
    threads: Mutex<HashMap<String, Vec<Message>>>,
    message_requests: Mutex<Vec<(String, u32)>>,
    pub conversation_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    next_id: AtomicUsize,
    fail_polls: AtomicBool,
    fail_sends: AtomicBool,
    paused: AtomicBool,
    resume: Notify,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        *self.conversations.lock().unwrap() = conversations;
    }

    pub fn set_thread(&self, conversation_id: &str, messages: Vec<Message>) {
        self.threads
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages);
    }

    pub fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Hold every list request until `resume` is called
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Stop holding new requests; held ones stay held until `release_held`
    pub fn unpause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn release_held(&self) {
        self.resume.notify_waiters();
    }

    pub fn message_calls(&self) -> usize {
        self.message_requests.lock().unwrap().len()
    }

    pub fn message_requests(&self) -> Vec<(String, u32)> {
        self.message_requests.lock().unwrap().clone()
    }

    pub fn conversation_calls(&self) -> usize {
        self.conversation_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    async fn hold_if_paused(&self) {
        let notified = self.resume.notified();
        if self.paused.load(Ordering::SeqCst) {
            notified.await;
        }
    }
}

#[async_trait]
impl MessagingApi for FakeApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.conversation_calls.fetch_add(1, Ordering::SeqCst);
        self.hold_if_paused().await;
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn list_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        self.message_requests
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), limit));
        self.hold_if_paused().await;
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let threads = self.threads.lock().unwrap();
        let messages = threads.get(conversation_id).cloned().unwrap_or_default();
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn create_message(&self, body: &NewMessage) -> Result<Message> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 500,
                body: "could not store message".to_string(),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = Message {
            id: format!("m{}", n),
            conversation_id: body.conversation_id.clone(),
            sender_id: SELF_ID.to_string(),
            content: body.content.clone(),
            kind: body.kind,
            status: MessageStatus::Sent,
            timestamp: at(1_000 + n as i64),
        };

        self.threads
            .lock()
            .unwrap()
            .entry(body.conversation_id.clone())
            .or_default()
            .push(created.clone());

        let mut conversations = self.conversations.lock().unwrap();
        if let Some(c) = conversations.iter_mut().find(|c| c.id == body.conversation_id) {
            c.updated_at = created.timestamp;
            c.last_message_summary = Some(provider_inbox::models::MessageSummary {
                content: created.content.clone(),
                sender_id: created.sender_id.clone(),
                timestamp: created.timestamp,
            });
        }

        Ok(created)
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub credentials: Arc<MemoryCredentials>,
    pub inbox: Inbox,
}

pub fn harness_with(config: Config, credentials: MemoryCredentials) -> Harness {
    let api = FakeApi::new();
    let credentials = Arc::new(credentials);
    let inbox = Inbox::new(&config, api.clone(), credentials.clone());
    Harness {
        api,
        credentials,
        inbox,
    }
}

pub fn harness() -> Harness {
    harness_with(
        Config::for_test(&std::env::temp_dir()),
        MemoryCredentials::new("token-1", SELF_ID),
    )
}
