//! Error types for provider-inbox

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unauthorized ({0})")]
    Unauthorized(u16),

    #[error("Not authenticated: no session token available")]
    NotAuthenticated,

    #[error("Message content is empty")]
    EmptyMessage,

    #[error("No active conversation selected")]
    NoActiveConversation,

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for send precondition failures (nothing was sent, nothing changed)
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyMessage | Error::NoActiveConversation)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_validation_errors() {
        assert!(Error::EmptyMessage.is_validation());
        assert!(Error::NoActiveConversation.is_validation());
        assert!(!Error::NotAuthenticated.is_validation());
        assert!(!Error::Unauthorized(401).is_validation());
    }
}
