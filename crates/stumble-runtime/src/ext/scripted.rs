//! Declarative user extensions.
//!
//! A user extension that is not compiled in is looked up as
//! `<directory>/<name>.toml` (or `.yaml` / `.yml` with the `yaml-config`
//! feature):
//!
//! ```toml
//! info = "Friendly greetings"
//! needs = ["system"]
//!
//! [[commands]]
//! handle = "hello"
//! info = "Say hello"
//! aliases = ["hi"]
//! reply = "Hello, {user}!"
//! ```
//!
//! `{user}`, `{handle}` and `{message}` in `reply` are replaced with the
//! caller's name, the typed handle and the argument text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use serde::Deserialize;
use tracing::debug;

use stumble_core::{BoxError, Command, CommandContext, Extension};

use crate::error::{RuntimeError, RuntimeResult};

/// File extensions searched, in order.
pub const FILE_EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionFile {
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub commands: Vec<CommandEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandEntry {
    pub handle: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub requires: Option<String>,
    pub reply: String,
}

/// Candidate paths for `name` inside `directory`.
pub fn candidates(directory: &Path, name: &str) -> Vec<PathBuf> {
    FILE_EXTENSIONS
        .iter()
        .map(|ext| directory.join(format!("{name}.{ext}")))
        .collect()
}

/// First existing extension file for `name`.
pub fn find(directory: &Path, name: &str) -> Option<PathBuf> {
    candidates(directory, name).into_iter().find(|p| p.is_file())
}

/// Parses an extension file.
pub fn parse(path: &Path) -> RuntimeResult<ExtensionFile> {
    let invalid = |reason: String| RuntimeError::InvalidExtension {
        path: path.to_path_buf(),
        reason,
    };
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let figment = match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Figment::from(Toml::file(path)),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Figment::from(Yaml::file(path)),
        _ => return Err(invalid(format!("unsupported format .{ext}"))),
    };
    figment.extract().map_err(|e| invalid(e.to_string()))
}

/// Loads the extension `name` from `path`.
pub fn load(name: &str, path: &Path) -> RuntimeResult<Extension> {
    let file = parse(path)?;
    debug!(extension = name, path = %path.display(), commands = file.commands.len(), "Loading extension file");
    Ok(build(name, file))
}

/// Builds the extension described by `file`.
pub fn build(name: &str, file: ExtensionFile) -> Extension {
    let mut builder = Extension::builder(name).info(file.info);
    for need in file.needs {
        builder = builder.needs(need);
    }
    for entry in file.commands {
        let template: Arc<str> = entry.reply.into();
        let mut command = Command::new(entry.handle, move |ctx: Arc<CommandContext>| {
            let template = Arc::clone(&template);
            async move { reply(ctx, &template).await }
        })
        .info(entry.info);
        for alias in entry.aliases {
            command = command.alias(alias);
        }
        if let Some(group) = entry.requires {
            command = command.requires(group);
        }
        builder = builder.command(command);
    }
    builder.build()
}

async fn reply(ctx: Arc<CommandContext>, template: &str) -> Result<(), BoxError> {
    let text = render(template, &ctx.user().name, ctx.handle(), ctx.message());
    ctx.reply(&text).await?;
    Ok(())
}

/// Substitutes the placeholders of a reply template.
///
/// One left-to-right pass: substituted values are copied verbatim and never
/// expanded again. Unknown `{...}` sequences are kept as written.
pub fn render(template: &str, user: &str, handle: &str, message: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let placeholder = [("{user}", user), ("{handle}", handle), ("{message}", message)]
            .into_iter()
            .find(|(name, _)| tail.starts_with(name));
        match placeholder {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingBot, context, started};
    use std::collections::HashMap;
    use stumble_core::User;

    #[test]
    fn test_render() {
        assert_eq!(
            render("{user} said {handle}: {message}", "alice", "echo", "hi there"),
            "alice said echo: hi there"
        );
    }

    #[test]
    fn test_render_does_not_expand_values() {
        assert_eq!(
            render("Hello, {user}!", "{message}", "hello", "SECRET-ARG"),
            "Hello, {message}!"
        );
        assert_eq!(
            render("{handle}: {message}", "bob", "{user}", "{handle}"),
            "{user}: {handle}"
        );
        assert_eq!(render("{unknown} {{user}}", "bob", "h", "m"), "{unknown} {bob}}");
    }

    #[test]
    fn test_find_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find(dir.path(), "greeter").is_none());
    }

    #[cfg(feature = "toml-config")]
    #[tokio::test]
    async fn test_load_toml_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("greeter.toml"),
            r#"
            info = "Greetings"

            [[commands]]
            handle = "hello"
            aliases = ["hi"]
            requires = "friends"
            reply = "Hello, {user}! ({message})"
            "#,
        )
        .unwrap();

        let path = find(dir.path(), "greeter").unwrap();
        let extension = load("greeter", &path).unwrap();
        assert_eq!(extension.handle(), "greeter");
        assert_eq!(extension.info(), "Greetings");
        assert_eq!(extension.commands()[0].required_group(), Some("friends"));

        let manager = started(vec![extension], HashMap::new()).await;
        let bot = RecordingBot::new();
        let ctx = context(&manager, &bot, User::new(4, "bob"), "hi", "there");
        manager.invoke("hi", ctx).await.unwrap();
        assert_eq!(bot.sent(), vec![(4, "Hello, bob! (there)".to_string())]);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[commands]]\nhandle = \"x\"\n").unwrap();

        assert!(matches!(
            load("broken", &path),
            Err(RuntimeError::InvalidExtension { .. })
        ));
    }
}
