//! # Stumble Mumble
//!
//! Text-only Mumble client for the Stumble bot.
//!
//! - [`MumbleCodec`] frames the TLS control channel
//! - [`MumbleClient`] owns one connection and implements [`stumble_core::Bot`]
//! - [`ClientEvent`]s report readiness, messages and disconnects
//!
//! Voice is not decoded; `UDPTunnel` packets are carried opaquely.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod proto;
pub mod users;

pub use client::{ClientEvent, DEFAULT_PORT, MumbleClient, address};
pub use codec::{ControlPacket, MumbleCodec};
pub use config::ConnectOptions;
pub use error::{MumbleError, MumbleResult};
pub use users::UserTable;
