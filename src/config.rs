//! Configuration and constants

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Conversation list refresh cadence
pub const DEFAULT_CONVERSATION_POLL_SECS: u64 = 15;

/// Active thread refresh cadence
pub const DEFAULT_MESSAGE_POLL_SECS: u64 = 3;

/// `limit` sent with every thread fetch
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// All configurable endpoints, paths and intervals
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub conversation_poll_interval: Duration,
    pub message_poll_interval: Duration,
    pub message_page_limit: u32,
    /// `None` keeps a fixed interval; `Some(cap)` backs off exponentially up to `cap`
    pub max_backoff: Option<Duration>,
    pub optimistic_send: bool,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            session_file: config_dir.join("provider-inbox/session.json"),
            conversation_poll_interval: Duration::from_secs(DEFAULT_CONVERSATION_POLL_SECS),
            message_poll_interval: Duration::from_secs(DEFAULT_MESSAGE_POLL_SECS),
            message_page_limit: DEFAULT_MESSAGE_LIMIT,
            max_backoff: None,
            optimistic_send: false,
        }
    }
}

impl Config {
    /// Defaults overridden by `PROVIDER_INBOX_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("PROVIDER_INBOX_API_URL") {
            config.api_base_url = url;
        }
        if let Some(path) = lookup("PROVIDER_INBOX_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        if let Some(secs) = lookup("PROVIDER_INBOX_CONVERSATION_POLL_SECS") {
            config.conversation_poll_interval =
                Duration::from_secs(parse_positive("PROVIDER_INBOX_CONVERSATION_POLL_SECS", &secs)?);
        }
        if let Some(secs) = lookup("PROVIDER_INBOX_MESSAGE_POLL_SECS") {
            config.message_poll_interval =
                Duration::from_secs(parse_positive("PROVIDER_INBOX_MESSAGE_POLL_SECS", &secs)?);
        }
        if let Some(limit) = lookup("PROVIDER_INBOX_MESSAGE_LIMIT") {
            let limit = parse_positive("PROVIDER_INBOX_MESSAGE_LIMIT", &limit)?;
            config.message_page_limit = u32::try_from(limit)
                .map_err(|_| Error::Config(format!("PROVIDER_INBOX_MESSAGE_LIMIT too large: {}", limit)))?;
        }
        if let Some(secs) = lookup("PROVIDER_INBOX_MAX_BACKOFF_SECS") {
            config.max_backoff = Some(Duration::from_secs(parse_positive(
                "PROVIDER_INBOX_MAX_BACKOFF_SECS",
                &secs,
            )?));
        }
        if let Some(flag) = lookup("PROVIDER_INBOX_OPTIMISTIC_SEND") {
            config.optimistic_send = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::Config(format!(
                        "PROVIDER_INBOX_OPTIMISTIC_SEND: expected a boolean, got '{}'",
                        other
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Create config for testing with custom paths
    pub fn for_test(temp_dir: &std::path::Path) -> Self {
        Self {
            api_base_url: "http://127.0.0.1:9/api".to_string(),
            session_file: temp_dir.join("session.json"),
            ..Self::default()
        }
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{}: expected a positive integer, got '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversation_poll_interval, Duration::from_secs(15));
        assert_eq!(config.message_poll_interval, Duration::from_secs(3));
        assert_eq!(config.message_page_limit, 50);
        assert!(config.max_backoff.is_none());
        assert!(!config.optimistic_send);
        assert!(config.session_file.to_string_lossy().contains("session.json"));
    }

    #[test]
    fn test_test_config() {
        let temp = std::env::temp_dir();
        let config = Config::for_test(&temp);
        assert_eq!(config.session_file, temp.join("session.json"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PROVIDER_INBOX_API_URL", "https://api.example.com"),
            ("PROVIDER_INBOX_MESSAGE_POLL_SECS", "5"),
            ("PROVIDER_INBOX_MESSAGE_LIMIT", "20"),
            ("PROVIDER_INBOX_MAX_BACKOFF_SECS", "120"),
            ("PROVIDER_INBOX_OPTIMISTIC_SEND", "true"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.message_poll_interval, Duration::from_secs(5));
        assert_eq!(config.conversation_poll_interval, Duration::from_secs(15));
        assert_eq!(config.message_page_limit, 20);
        assert_eq!(config.max_backoff, Some(Duration::from_secs(120)));
        assert!(config.optimistic_send);
    }

    #[test]
    fn test_env_rejects_zero_interval() {
        let err = Config::from_lookup(lookup_from(&[("PROVIDER_INBOX_MESSAGE_POLL_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_rejects_bad_bool() {
        let err = Config::from_lookup(lookup_from(&[("PROVIDER_INBOX_OPTIMISTIC_SEND", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }
}
