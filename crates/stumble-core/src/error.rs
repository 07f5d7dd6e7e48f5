//! Unified error types for the Stumble extension framework.

use thiserror::Error;

// =============================================================================
// Core Errors
// =============================================================================

/// Errors raised while routing commands and executables.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// No command or alias is registered under this handle.
    #[error("command '{0}' not found")]
    CommandNotFound(String),

    /// No executable is registered under this qualified name.
    #[error("executable '{0}' not found")]
    ExecutableNotFound(String),

    /// An extension with the same handle is already registered.
    #[error("extension '{0}' is already registered")]
    DuplicateExtension(String),

    /// An extension declared a need that no registered extension satisfies.
    #[error("extension '{extension}' needs '{missing}', which is not loaded")]
    MissingDependency {
        /// The extension that could not be loaded.
        extension: String,
        /// The handle it needed.
        missing: String,
    },

    /// An extension's `init` hook returned an error.
    #[error("extension '{extension}' failed to initialise: {reason}")]
    InitFailed {
        /// The extension that failed.
        extension: String,
        /// The error reported by the hook.
        reason: String,
    },
}

// =============================================================================
// Send Errors
// =============================================================================

/// Errors that can occur when a bot sends a text message.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The bot has no live connection.
    #[error("bot is not connected")]
    NotConnected,

    /// The target user session is not known to the bot.
    #[error("user session {0} is unknown")]
    UnknownSession(u32),

    /// The transport rejected the message.
    #[error("failed to send message: {0}")]
    Failed(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for framework operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for outbound messages.
pub type SendResult<T> = Result<T, SendError>;
