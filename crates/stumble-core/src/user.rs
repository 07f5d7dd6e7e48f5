//! Connected user snapshots.

use serde::{Deserialize, Serialize};

use crate::bot::Bot;
use crate::error::SendResult;

/// A snapshot of a user connected to the voice server.
///
/// Snapshots are taken when a message arrives; later state changes on the
/// server are not reflected in an existing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned session id, unique while the user stays connected.
    pub session: u32,
    /// Display name.
    pub name: String,
    /// Registration id, present only for registered users.
    #[serde(default)]
    pub user_id: Option<u32>,
    /// Channel the user is currently in.
    #[serde(default)]
    pub channel_id: u32,
}

impl User {
    /// Creates an unregistered user in the root channel.
    pub fn new(session: u32, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
            user_id: None,
            channel_id: 0,
        }
    }

    /// Returns `true` when the user is registered on the server.
    pub fn is_registered(&self) -> bool {
        self.user_id.is_some()
    }

    /// Sends a private text message to this user through `bot`.
    pub async fn send_message(&self, bot: &dyn Bot, text: &str) -> SendResult<()> {
        bot.send_to_user(self.session, text).await
    }
}
