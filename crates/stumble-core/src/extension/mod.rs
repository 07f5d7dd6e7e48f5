//! Extension system.
//!
//! # Architecture
//!
//! Extensions are the unit of bot behaviour. Each [`Extension`] bundles:
//!
//! - chat **commands** (with aliases and an optional required permission group),
//! - **executables**, named functions other code calls as `<extension>::<name>`,
//! - optional **lifecycle hooks** (`init`, `term`),
//! - **needs**, the handles of extensions that must be loaded first.
//!
//! An [`ExtensionDescriptor`] is the static, `Copy` handle to an extension:
//! a handle plus a factory function. Bundled extensions are listed as
//! descriptors so they can be looked up by name before being instantiated.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use stumble_core::prelude::*;
//!
//! fn dice() -> Extension {
//!     Extension::builder("dice")
//!         .info("Dice rolling")
//!         .command(
//!             Command::new("roll", |ctx: Arc<CommandContext>| async move {
//!                 ctx.reply("4").await?;
//!                 Ok(())
//!             })
//!             .info("Rolls a fair die"),
//!         )
//!         .build()
//! }
//!
//! pub static DICE: ExtensionDescriptor = ExtensionDescriptor::new("dice", dice);
//! ```
//!
//! # Settings
//!
//! The `init` hook receives the extension's section from the `settings`
//! table of the bot configuration (an empty object when absent):
//!
//! ```toml
//! [settings.dice]
//! sides = 20
//! ```

pub mod core;
pub mod descriptor;

pub use core::{Extension, ExtensionBuilder, ExtensionLoadContext, InitFn, TermFn};
pub use descriptor::ExtensionDescriptor;
