//! REST backend - conversation list, thread fetch and message creation

use crate::credentials::CredentialProvider;
use crate::error::{Error, Result};
use crate::models::{Conversation, Message, NewMessage};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use std::sync::Arc;
use tracing::debug;

/// The three endpoints the messaging core consumes
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// `GET /conversations`, most recent first
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// `GET /conversations/{id}/messages?limit=N`
    async fn list_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>>;

    /// `POST /messages`
    async fn create_message(&self, message: &NewMessage) -> Result<Message>;
}

/// reqwest-backed client; the bearer token is looked up per request
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid API URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.credentials.token().ok_or(Error::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized(status.as_u16()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessagingApi for HttpApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let request = self.authorized(self.client.get(self.endpoint(&["conversations"])?))?;
        let response = Self::check(request.send().await?).await?;
        let conversations: Vec<Conversation> = response.json().await?;
        debug!(count = conversations.len(), "Fetched conversations");
        Ok(conversations)
    }

    async fn list_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        let url = self.endpoint(&["conversations", conversation_id, "messages"])?;
        let request = self.authorized(self.client.get(url).query(&[("limit", limit)]))?;
        let response = Self::check(request.send().await?).await?;
        let messages: Vec<Message> = response.json().await?;
        debug!(conversation_id, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    async fn create_message(&self, message: &NewMessage) -> Result<Message> {
        let request = self.authorized(self.client.post(self.endpoint(&["messages"])?).json(message))?;
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }
}
