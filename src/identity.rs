//! Authorship resolution - decides which messages are "mine"

use crate::models::Message;

/// True iff `message` was authored by `current_user_id`; unknown user is never self
pub fn is_self(current_user_id: Option<&str>, message: &Message) -> bool {
    match current_user_id {
        Some(user) if !user.is_empty() => message.sender_id == user,
        _ => false,
    }
}

/// Pair each message with its authorship flag
pub fn annotate<'a>(
    current_user_id: Option<&str>,
    messages: &'a [Message],
) -> Vec<(bool, &'a Message)> {
    messages
        .iter()
        .map(|m| (is_self(current_user_id, m), m))
        .collect()
}
