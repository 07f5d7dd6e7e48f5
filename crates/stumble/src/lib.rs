//! # Stumble
//!
//! A Mumble chat bot built around extensions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ClientEvent  ┌──────────┐  invoke / execute  ┌────────────────────┐
//! │ MumbleClient │──────────────▶│ Stumble  │───────────────────▶│ ExtensionManager   │
//! │  (TLS task)  │◀──────────────│ observe  │                    │  commands, aliases │
//! └──────────────┘  text replies └──────────┘                    │  executables,space │
//!                                     │ StumbleEvent             └────────────────────┘
//!                                     ▼
//!                                subscribers
//! ```
//!
//! - **stumble-core**: extensions, commands, the shared space
//! - **stumble-mumble**: the Mumble control-channel client
//! - **stumble-runtime**: configuration, logging, the `system` and
//!   `permissions` extensions and the [`Stumble`](prelude::Stumble) bot
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stumble::prelude::*;
//!
//! fn dice() -> Extension {
//!     Extension::builder("dice")
//!         .command(Command::new("roll", |ctx: Arc<CommandContext>| async move {
//!             ctx.reply("4").await?;
//!             Ok(())
//!         }))
//!         .build()
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Stumble::builder()
//!         .extension(ExtensionDescriptor::new("dice", dice))
//!         .build()
//!         .await?;
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration and extension files
//! - `yaml-config`: YAML configuration and extension files
//! - `json-log`: JSON log output

pub use stumble_core as core;
pub use stumble_mumble as mumble;
pub use stumble_runtime as runtime;

/// Commonly used types for writing extensions and running the bot.
///
/// ```rust,ignore
/// use stumble::prelude::*;
/// ```
pub mod prelude {
    pub use stumble_core::prelude::*;
    pub use stumble_core::{CommandInfo, ExtensionBuilder};

    pub use stumble_runtime::{Stumble, StumbleBuilder, StumbleConfig, StumbleEvent};
}
