//! `permissions`: group-based gating of commands.
//!
//! While loaded, the dispatcher routes every command through the
//! [`INVOKE`] executable instead of invoking it directly. The settings are
//! published in the space under [`SPACE_KEY`]; their presence is what turns
//! the gate on.
//!
//! ```toml
//! [settings.permissions]
//! default = "user"
//!
//! [settings.permissions.groups]
//! admin = ["alice"]
//!
//! [settings.permissions.commands]
//! extensions = "admin"
//! ```
//!
//! A member is either a display name or `#<id>` for a registered user id.
//! Display names are not reserved on servers that allow unregistered
//! users, so privileged groups should list ids.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stumble_core::{
    BoxError, Command, CommandContext, Extension, ExtensionDescriptor, ExtensionLoadContext,
    Space, User,
};

pub const HANDLE: &str = "permissions";

pub const DESCRIPTOR: ExtensionDescriptor = ExtensionDescriptor::new(HANDLE, extension);

/// Space key holding the active [`PermissionSettings`].
pub const SPACE_KEY: &str = "_STANDARD_PERMISSIONS_";

/// Qualified name of the gate executable.
pub const INVOKE: &str = "permissions::invoke";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// Group every user belongs to.
    #[serde(default = "default_group")]
    pub default: String,

    /// Group name to member user names.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,

    /// Command handle to required group. Overrides the command's own
    /// requirement.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            default: default_group(),
            groups: BTreeMap::new(),
            commands: BTreeMap::new(),
        }
    }
}

fn default_group() -> String {
    "user".to_string()
}

impl PermissionSettings {
    /// Groups `user` belongs to, default group first.
    pub fn groups_of(&self, user: &User) -> Vec<String> {
        let mut groups = vec![self.default.clone()];
        groups.extend(
            self.groups
                .iter()
                .filter(|(name, members)| {
                    **name != self.default && members.iter().any(|m| is_member_entry(m, user))
                })
                .map(|(name, _)| name.clone()),
        );
        groups
    }

    pub fn is_member(&self, user: &User, group: &str) -> bool {
        group == self.default
            || self
                .groups
                .get(group)
                .is_some_and(|members| members.iter().any(|m| is_member_entry(m, user)))
    }

    /// Whether `user` may run the command `canonical`, whose own
    /// requirement is `requires`.
    pub fn allows(&self, user: &User, canonical: &str, requires: Option<&str>) -> bool {
        match self.commands.get(canonical).map(String::as_str).or(requires) {
            Some(group) => self.is_member(user, group),
            None => true,
        }
    }

    /// Reads the active settings from the space.
    pub fn from_space(space: &Space) -> serde_json::Result<Option<Self>> {
        space.get_as(SPACE_KEY)
    }
}

/// Whether a group member entry refers to `user`.
fn is_member_entry(entry: &str, user: &User) -> bool {
    match entry.strip_prefix('#') {
        Some(id) => id
            .parse::<u32>()
            .is_ok_and(|id| user.user_id == Some(id)),
        None => entry == user.name,
    }
}

pub fn extension() -> Extension {
    // Space handle kept for the term hook.
    let loaded: Arc<Mutex<Option<Space>>> = Arc::default();
    let on_term = Arc::clone(&loaded);

    Extension::builder(HANDLE)
        .info("Restricts commands to permission groups.")
        .executable("invoke", invoke)
        .command(Command::new("groups", groups).info("Lists your permission groups."))
        .on_init(move |ctx: ExtensionLoadContext| {
            let loaded = Arc::clone(&loaded);
            async move {
                let settings: PermissionSettings = ctx.get_settings()?;
                info!(
                    default = %settings.default,
                    groups = settings.groups.len(),
                    gated = settings.commands.len(),
                    "Permissions loaded"
                );
                ctx.space().insert(SPACE_KEY, serde_json::to_value(&settings)?);
                *loaded.lock() = Some(ctx.space().clone());
                Ok(())
            }
        })
        .on_term(move || {
            let space = on_term.lock().take();
            async move {
                if let Some(space) = space {
                    space.remove(SPACE_KEY);
                }
            }
        })
        .build()
}

/// The gate: runs the command in `ctx` if the caller may use it.
async fn invoke(ctx: Arc<CommandContext>) -> Result<(), BoxError> {
    let settings = PermissionSettings::from_space(ctx.space())?.unwrap_or_default();
    let manager = Arc::clone(ctx.manager());
    let Some(command) = manager.command(ctx.handle()) else {
        ctx.reply(&format!("Command [ {} ] not found.", ctx.handle()))
            .await?;
        return Ok(());
    };

    if settings.allows(ctx.user(), &command.handle, command.requires.as_deref()) {
        manager.invoke(ctx.handle(), Arc::clone(&ctx)).await?;
    } else {
        debug!(command = %command.handle, user = %ctx.user().name, "Permission denied");
        ctx.reply(&format!(
            "You do not have permission to use [ {} ].",
            ctx.handle()
        ))
        .await?;
    }
    Ok(())
}

async fn groups(ctx: Arc<CommandContext>) -> Result<(), BoxError> {
    let settings = PermissionSettings::from_space(ctx.space())?.unwrap_or_default();
    let groups = settings.groups_of(ctx.user());
    ctx.reply(&format!("Your groups: {}", groups.join(", ")))
        .await?;
    Ok(())
}
