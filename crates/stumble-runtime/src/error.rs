//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

use stumble_core::CoreError;
use stumble_mumble::MumbleError;

use crate::config::ConfigError;

/// Errors that can occur while building or running the bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extension(#[from] CoreError),

    #[error(transparent)]
    Mumble(#[from] MumbleError),

    /// A selected user extension is neither compiled in nor present in the
    /// extension directory.
    #[error("User extension [ {name} ] not found (searched: {searched:?})")]
    ExtensionNotFound { name: String, searched: Vec<PathBuf> },

    /// A declarative extension file could not be parsed.
    #[error("Invalid extension file {path}: {reason}")]
    InvalidExtension { path: PathBuf, reason: String },

    /// An operation needed a live connection.
    #[error("Not connected")]
    NotConnected,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
