//! Inbox - wires stores, synchronizers, selection and sending together

use crate::api::{HttpApi, MessagingApi};
use crate::config::Config;
use crate::conversations::{ConversationStore, ConversationSync};
use crate::credentials::{CredentialProvider, FileCredentials};
use crate::error::Result;
use crate::identity;
use crate::models::{Conversation, Message};
use crate::schedule::policy_for;
use crate::selection::SelectionController;
use crate::send::{SendOutcome, SendPipeline};
use crate::sync::MessageSync;
use crate::thread::MessageThreadStore;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct Inbox {
    credentials: Arc<dyn CredentialProvider>,
    conversation_store: Arc<RwLock<ConversationStore>>,
    thread_store: Arc<RwLock<MessageThreadStore>>,
    conversations: ConversationSync,
    selection: SelectionController,
    sender: SendPipeline,
}

impl Inbox {
    /// HTTP backend with the session file from `config`
    pub fn from_config(config: &Config) -> Self {
        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(FileCredentials::new(&config.session_file));
        let api: Arc<dyn MessagingApi> =
            Arc::new(HttpApi::new(&config.api_base_url, credentials.clone()));
        Self::new(config, api, credentials)
    }

    pub fn new(
        config: &Config,
        api: Arc<dyn MessagingApi>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let conversation_store = Arc::new(RwLock::new(ConversationStore::new()));
        let thread_store = Arc::new(RwLock::new(MessageThreadStore::new()));

        let conversations = ConversationSync::new(
            api.clone(),
            credentials.clone(),
            conversation_store.clone(),
            policy_for(config.conversation_poll_interval, config.max_backoff),
        );
        let message_sync = MessageSync::new(
            api.clone(),
            credentials.clone(),
            thread_store.clone(),
            policy_for(config.message_poll_interval, config.max_backoff),
            config.message_page_limit,
        );
        let selection = SelectionController::new(message_sync);
        let sender = SendPipeline::new(
            api,
            credentials.clone(),
            selection.clone(),
            conversations.clone(),
            config.optimistic_send,
        );

        Self {
            credentials,
            conversation_store,
            thread_store,
            conversations,
            selection,
            sender,
        }
    }

    pub fn conversations(&self) -> &ConversationSync {
        &self.conversations
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn sender(&self) -> &SendPipeline {
        &self.sender
    }

    pub fn conversation_store(&self) -> Arc<RwLock<ConversationStore>> {
        self.conversation_store.clone()
    }

    pub fn thread_store(&self) -> Arc<RwLock<MessageThreadStore>> {
        self.thread_store.clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.credentials.user_id()
    }

    pub async fn list_conversations(&self) -> Vec<Arc<Conversation>> {
        self.conversation_store.read().await.list()
    }

    /// Active thread with authorship flags
    pub async fn thread(&self) -> Vec<(bool, Message)> {
        let messages = self.thread_store.read().await.messages();
        let user = self.current_user_id();
        identity::annotate(user.as_deref(), &messages)
            .into_iter()
            .map(|(mine, m)| (mine, m.clone()))
            .collect()
    }

    pub async fn send(&self, conversation_id: &str, content: &str) -> Result<SendOutcome> {
        self.sender.send(conversation_id, content).await
    }

    /// Stop both synchronizers
    pub async fn shutdown(&self) {
        self.conversations.stop();
        self.selection.deselect().await;
    }
}
