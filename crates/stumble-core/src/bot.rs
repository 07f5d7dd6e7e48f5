//! Bot trait.
//!
//! This module defines the `Bot` trait, the outbound half of a live
//! connection. Command handlers reply through it without knowing which
//! transport sits underneath.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SendResult;

/// An active connection that can send text messages.
///
/// Concrete implementations (e.g. the Mumble client) translate these calls
/// into protocol packets.
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Returns an identifier for this connection (e.g. the server address).
    fn id(&self) -> &str;

    /// Sends a private text message to the user with the given session id.
    async fn send_to_user(&self, session: u32, text: &str) -> SendResult<()>;

    /// Sends a text message to every user in a channel.
    async fn send_to_channel(&self, channel_id: u32, text: &str) -> SendResult<()>;
}

/// Shared handle to a bot.
pub type BoxedBot = Arc<dyn Bot>;
