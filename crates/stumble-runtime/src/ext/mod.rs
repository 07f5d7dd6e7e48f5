//! Bundled extensions and extension selection.
//!
//! Standard extensions ship with the runtime and are picked by name. Every
//! other enabled name is a user extension: either compiled in and handed to
//! [`StumbleBuilder::extension`](crate::StumbleBuilder::extension), or a
//! declarative file in the configured directory (see [`scripted`]).

pub mod permissions;
pub mod scripted;
pub mod system;

use stumble_core::ExtensionDescriptor;

use crate::config::ExtensionsConfig;

/// Reserved key inside `[extensions]`; never an extension name.
pub const CONFIG_KEY: &str = "config";

/// Extensions bundled with the runtime.
pub static STANDARD_EXTENSIONS: &[ExtensionDescriptor] =
    &[system::DESCRIPTOR, permissions::DESCRIPTOR];

/// Looks up a bundled extension by name.
pub fn standard(name: &str) -> Option<&'static ExtensionDescriptor> {
    STANDARD_EXTENSIONS.iter().find(|d| d.handle == name)
}

pub fn is_standard(name: &str) -> bool {
    standard(name).is_some()
}

/// Enabled extension names split into standard and user extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub standards: Vec<String>,
    pub users: Vec<String>,
}

impl Selection {
    /// Whether user extensions should be loaded at all.
    pub fn loads_users(&self, extensions: &ExtensionsConfig) -> bool {
        !self.users.is_empty() && !extensions.config.onlystandards
    }
}

/// Splits the enabled names of `extensions`, in key order.
pub fn select_extensions(extensions: &ExtensionsConfig) -> Selection {
    let (standards, users) = extensions
        .enabled
        .iter()
        .filter(|(name, enabled)| **enabled && name.as_str() != CONFIG_KEY)
        .map(|(name, _)| name.clone())
        .partition(|name| is_standard(name));
    Selection { standards, users }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_standard() {
        assert!(is_standard("system"));
        assert!(is_standard("permissions"));
        assert!(!is_standard("greeter"));
        assert!(!is_standard(CONFIG_KEY));
    }

    #[test]
    fn test_default_selection_is_system() {
        let selection = select_extensions(&ExtensionsConfig::default());
        assert_eq!(selection.standards, vec!["system"]);
        assert!(selection.users.is_empty());
    }

    #[test]
    fn test_selection_filters_disabled_and_splits() {
        let extensions = ExtensionsConfig::none()
            .with("system", true)
            .with("permissions", false)
            .with("greeter", true)
            .with("dice", true)
            .with("weather", false)
            .with(CONFIG_KEY, true);

        let selection = select_extensions(&extensions);
        assert_eq!(selection.standards, vec!["system"]);
        assert_eq!(selection.users, vec!["dice", "greeter"]);
        assert!(selection.loads_users(&extensions));
    }

    #[test]
    fn test_onlystandards_skips_users() {
        let mut extensions = ExtensionsConfig::none().with("greeter", true);
        extensions.config.onlystandards = true;

        let selection = select_extensions(&extensions);
        assert_eq!(selection.users, vec!["greeter"]);
        assert!(!selection.loads_users(&extensions));
    }
}
