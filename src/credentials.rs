//! Session credentials - bearer token and current user id, read fresh on every use

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Source of the authenticated session
pub trait CredentialProvider: Send + Sync {
    /// Bearer token for the next request, if signed in
    fn token(&self) -> Option<String>;

    /// Id of the signed-in user, used for authorship
    fn user_id(&self) -> Option<String>;
}

/// Session document persisted by the dashboard login flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Reads the session file on every call so a rotated token is picked up immediately
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<StoredSession> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No session file");
                return None;
            }
        };

        match serde_json::from_str::<StoredSession>(&content) {
            Ok(session) if !session.token.trim().is_empty() => Some(session),
            Ok(_) => None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Malformed session file");
                None
            }
        }
    }
}

impl CredentialProvider for FileCredentials {
    fn token(&self) -> Option<String> {
        self.read().map(|s| s.token)
    }

    fn user_id(&self) -> Option<String> {
        self.read().and_then(|s| s.user_id)
    }
}

/// In-process credentials, for embedding hosts and tests
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    session: RwLock<Option<StoredSession>>,
}

impl MemoryCredentials {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session: RwLock::new(Some(StoredSession {
                token: token.into(),
                user_id: Some(user_id.into()),
            })),
        }
    }

    /// No session at all
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set_session(&self, token: impl Into<String>, user_id: impl Into<String>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(StoredSession {
                token: token.into(),
                user_id: Some(user_id.into()),
            });
        }
    }

    /// Rotate the token, keeping the user
    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.session.write() {
            let user_id = guard.as_ref().and_then(|s| s.user_id.clone());
            *guard = Some(StoredSession {
                token: token.into(),
                user_id,
            });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.session.write() {
            *guard = None;
        }
    }
}

impl CredentialProvider for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.token.clone()))
    }

    fn user_id(&self) -> Option<String> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().and_then(|s| s.user_id.clone()))
    }
}
