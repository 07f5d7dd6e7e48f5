//! # Stumble Runtime
//!
//! Everything between a configuration file and a running Mumble bot:
//!
//! - Layered configuration (`stumble.toml`, `STUMBLE_*` env vars)
//! - Logging setup
//! - Selection of standard and user extensions
//! - The [`Stumble`] bot: connection handling, events and command dispatch
//!
//! ```rust,ignore
//! use stumble_runtime::Stumble;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Stumble::builder().build().await?;
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Events
//!
//! [`Stumble::subscribe`] yields every [`StumbleEvent`]: chat messages,
//! connect / ready / disconnect and connection errors. Errors are only
//! reported there; the bot never reconnects on its own.

pub mod config;
pub mod error;
pub mod event;
pub mod ext;
pub mod logging;
pub mod stumble;

#[cfg(test)]
mod test_support;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, ExtensionsConfig, LoggingConfig, MumbleConfig,
    StumbleConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use event::StumbleEvent;
pub use ext::{Selection, is_standard, select_extensions};
pub use logging::{LoggingBuilder, SpanEvents};
pub use stumble::{Stumble, StumbleBuilder};

// Re-export tracing for use by extension crates
pub use tracing;

/// Logging macros for extension code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
