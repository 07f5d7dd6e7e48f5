//! Stumble Bot Example
//!
//! Connects to a Mumble server and answers chat commands.
//!
//! Loaded extensions come from `stumble.toml`:
//!
//! - `system` and `permissions` ship with the runtime
//! - `dice` is compiled in below
//! - `greeter` is declared in `extensions/greeter.toml`
//!
//! # Usage
//!
//! ```bash
//! cd demos/stumble-bot
//! cargo run --package stumble-bot -- --config stumble.toml
//! ```
//!
//! Then type `!help`, `!roll 2` or `!hi` in the server's chat.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use stumble::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "stumble-bot", about = "A Mumble chat bot")]
struct Args {
    /// Configuration file. Searched for in the current and user config
    /// directories when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `dev` loads `stumble.dev.toml` first.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Dice extension
// ============================================================================

const SIDES_KEY: &str = "dice.sides";

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct DiceSettings {
    sides: u64,
}

impl Default for DiceSettings {
    fn default() -> Self {
        Self { sides: 6 }
    }
}

fn dice() -> Extension {
    Extension::builder("dice")
        .info("Rolls dice.")
        .command(
            Command::new("roll", roll)
                .info("Rolls dice: roll [count]")
                .alias("r"),
        )
        .on_init(|ctx: ExtensionLoadContext| async move {
            let settings: DiceSettings = ctx.get_settings()?;
            info!(sides = settings.sides, "Dice ready");
            ctx.space().insert(SIDES_KEY, Value::from(settings.sides.max(2)));
            Ok(())
        })
        .build()
}

async fn roll(ctx: Arc<CommandContext>) -> Result<(), BoxError> {
    let sides = ctx
        .space()
        .get(SIDES_KEY)
        .and_then(|v| v.as_u64())
        .unwrap_or(6);
    let count = ctx
        .args()
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(1)
        .clamp(1, 10);

    let rolls: Vec<String> = throw(count, sides).iter().map(u64::to_string).collect();

    ctx.reply(&format!("{} rolled {}", ctx.user().name, rolls.join(", ")))
        .await?;
    Ok(())
}

/// Rolls `count` dice with `sides` faces each.
fn throw(count: u64, sides: u64) -> Vec<u64> {
    // Randomly seeded hasher as a dependency-free die; the modulo bias is
    // negligible for small `sides`.
    let state = RandomState::new();
    (0..count).map(|i| state.hash_one(i) % sides.max(1) + 1).collect()
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Stumble::builder().extension(ExtensionDescriptor::new("dice", dice));
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }

    let bot = builder.build().await?;
    bot.run().await?;

    Ok(())
}
