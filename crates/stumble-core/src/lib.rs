//! # Stumble Core
//!
//! Extension framework for the Stumble Mumble bot.
//!
//! This layer provides:
//! - [`Extension`]s bundling commands, executables and lifecycle hooks
//! - [`ExtensionManager`] for dependency-ordered loading and command routing
//! - [`Space`], the key/value store extensions share
//! - The [`Bot`] trait handlers reply through, and the [`User`] snapshot
//!
//! It knows nothing about the network; transports implement [`Bot`].

pub mod bot;
pub mod command;
pub mod error;
pub mod extension;
pub mod manager;
pub mod space;
pub mod user;

pub use bot::{Bot, BoxedBot};
pub use command::{
    BoxedCommandService, Command, CommandContext, CommandData, Executable, Invocation,
    parse_invocation,
};
pub use error::{CoreError, CoreResult, SendError, SendResult};
pub use extension::{Extension, ExtensionBuilder, ExtensionDescriptor, ExtensionLoadContext};
pub use manager::{CommandInfo, ExtensionLoadState, ExtensionManager, ExtensionSummary};
pub use space::Space;
pub use user::User;

/// Re-exported so handler signatures can name the error type.
pub use tower::BoxError;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Bot, BoxError, BoxedBot, Command, CommandContext, CommandData, Extension,
        ExtensionDescriptor, ExtensionLoadContext, ExtensionManager, Space, User,
    };
    pub use std::sync::Arc;
}
