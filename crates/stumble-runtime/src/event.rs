//! Events published by the bot.

use stumble_core::User;
use stumble_mumble::MumbleError;

/// Something that happened to the bot.
///
/// Delivered to every subscriber of [`Stumble::subscribe`](crate::Stumble::subscribe).
#[derive(Debug, Clone)]
pub enum StumbleEvent {
    /// A chat message reached the bot, command or not.
    Message { text: String, user: User },
    /// The TLS connection is up and credentials were sent.
    Connect,
    /// Connecting failed. Always followed by [`StumbleEvent::Error`].
    ConnectError(MumbleError),
    Error(MumbleError),
    /// The server finished synchronising state.
    Ready,
    Disconnect,
}

impl StumbleEvent {
    /// Event name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Connect => "connect",
            Self::ConnectError(_) => "connect-error",
            Self::Error(_) => "error",
            Self::Ready => "ready",
            Self::Disconnect => "disconnect",
        }
    }
}
