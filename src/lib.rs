//! Provider Inbox - messaging core of the provider dashboard
//!
//! Keeps a conversation list and the active message thread fresh by polling the
//! REST backend, and sends messages without ever showing duplicates or letting
//! a message status move backwards.

pub mod api;
pub mod config;
pub mod conversations;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod inbox;
pub mod models;
pub mod schedule;
pub mod selection;
pub mod send;
pub mod sync;
pub mod thread;

pub use error::{Error, Result};
pub use inbox::Inbox;
