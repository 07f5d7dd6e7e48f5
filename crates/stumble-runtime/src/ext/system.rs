//! `system`: help, extension listing and version.

use std::sync::Arc;

use stumble_core::{
    BoxError, Command, CommandContext, CommandInfo, Extension, ExtensionDescriptor,
    ExtensionLoadState,
};

pub const HANDLE: &str = "system";

pub const DESCRIPTOR: ExtensionDescriptor = ExtensionDescriptor::new(HANDLE, extension);

pub fn extension() -> Extension {
    Extension::builder(HANDLE)
        .info("Built-in help and bot information.")
        .command(
            Command::new("help", help)
                .info("Lists commands, or describes one: help [command]")
                .alias("h"),
        )
        .command(Command::new("extensions", extensions).info("Lists loaded extensions."))
        .command(Command::new("version", version).info("Shows the bot version."))
        .build()
}

async fn help(ctx: Arc<CommandContext>) -> Result<(), BoxError> {
    let manager = ctx.manager();
    let text = match ctx.args().next() {
        None => {
            let handles: Vec<String> = manager.commands().into_iter().map(|c| c.handle).collect();
            format!("Commands: {}", handles.join(", "))
        }
        Some(topic) => match manager.command(topic) {
            Some(info) => describe(&info),
            None => format!("Command [ {topic} ] not found."),
        },
    };
    ctx.reply(&text).await?;
    Ok(())
}

fn describe(info: &CommandInfo) -> String {
    let mut text = info.handle.clone();
    if !info.aliases.is_empty() {
        text.push_str(&format!(" ({})", info.aliases.join(", ")));
    }
    if info.info.is_empty() {
        text.push_str(": No description.");
    } else {
        text.push_str(": ");
        text.push_str(&info.info);
    }
    if let Some(group) = &info.requires {
        text.push_str(&format!(" [requires {group}]"));
    }
    text
}

async fn extensions(ctx: Arc<CommandContext>) -> Result<(), BoxError> {
    let list: Vec<String> = ctx
        .manager()
        .extensions()
        .await
        .into_iter()
        .map(|ext| {
            let state = match ext.state {
                ExtensionLoadState::Registered => "registered",
                ExtensionLoadState::Active => "active",
                ExtensionLoadState::Failed => "failed",
            };
            format!("{} ({state})", ext.handle)
        })
        .collect();
    ctx.reply(&format!("Extensions: {}", list.join(", "))).await?;
    Ok(())
}

async fn version(ctx: Arc<CommandContext>) -> Result<(), BoxError> {
    ctx.reply(&format!("Stumble {}", env!("CARGO_PKG_VERSION")))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingBot, context, started};
    use std::collections::HashMap;
    use stumble_core::User;

    async fn run(handle: &str, message: &str) -> Vec<String> {
        let manager = started(vec![extension()], HashMap::new()).await;
        let bot = RecordingBot::new();
        let ctx = context(&manager, &bot, User::new(3, "alice"), handle, message);
        manager.invoke(handle, ctx).await.unwrap();
        bot.texts()
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        assert_eq!(
            run("help", "").await,
            vec!["Commands: extensions, help, version"]
        );
    }

    #[tokio::test]
    async fn test_help_describes_command_by_alias() {
        assert_eq!(
            run("h", "h").await,
            vec!["help (h): Lists commands, or describes one: help [command]"]
        );
        assert_eq!(
            run("help", "nope").await,
            vec!["Command [ nope ] not found."]
        );
    }

    #[tokio::test]
    async fn test_extensions_and_version() {
        assert_eq!(run("extensions", "").await, vec!["Extensions: system (active)"]);
        let version = run("version", "").await;
        assert!(version[0].starts_with("Stumble "));
    }
}
