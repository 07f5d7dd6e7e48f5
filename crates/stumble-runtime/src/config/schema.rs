//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stumble_mumble::{ConnectOptions, DEFAULT_PORT};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StumbleConfig {
    /// Extension selection. Absent means `{ system = true }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ExtensionsConfig>,

    /// Server connection settings.
    #[serde(default)]
    pub mumble: MumbleConfig,

    /// Command prefix. Commands are disabled when unset or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-extension settings, keyed by extension handle.
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl StumbleConfig {
    /// The effective extension selection.
    pub fn extensions(&self) -> ExtensionsConfig {
        self.extensions.clone().unwrap_or_default()
    }

    /// The operator, if it enables dispatch.
    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref().filter(|op| !op.is_empty())
    }
}

// =============================================================================
// Extensions
// =============================================================================

/// Extension names mapped to their enabled flag, plus the reserved `config`
/// key.
///
/// ```toml
/// [extensions]
/// system = true
/// permissions = true
/// greeter = true
///
/// [extensions.config]
/// onlystandards = false
/// directory = "./extensions"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    /// Options under the reserved `config` key.
    #[serde(default)]
    pub config: ExtensionOptions,

    /// Enabled flag per extension name.
    #[serde(flatten)]
    pub enabled: BTreeMap<String, bool>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            config: ExtensionOptions::default(),
            enabled: BTreeMap::from([("system".to_string(), true)]),
        }
    }
}

impl ExtensionsConfig {
    /// An empty selection; nothing is loaded.
    pub fn none() -> Self {
        Self {
            config: ExtensionOptions::default(),
            enabled: BTreeMap::new(),
        }
    }

    /// Adds or overrides one flag.
    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.enabled.insert(name.into(), enabled);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionOptions {
    /// Skip every user extension.
    #[serde(default)]
    pub onlystandards: bool,

    /// Directory holding declarative user extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

// =============================================================================
// Mumble
// =============================================================================

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MumbleConfig {
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Path to the PEM private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,

    /// Path to the PEM certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,

    /// Access tokens sent with the credentials.
    #[serde(default)]
    pub tokens: Vec<String>,

    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for MumbleConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            username: default_username(),
            password: None,
            key: None,
            cert: None,
            tokens: Vec::new(),
            accept_invalid_certs: true,
            ping_interval_secs: default_ping_interval(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl MumbleConfig {
    /// Connection options without credentials files; those are read by the
    /// bot builder.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            accept_invalid_certs: self.accept_invalid_certs,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            ..Default::default()
        }
    }

    /// `mumble://server:port`.
    pub fn address(&self) -> String {
        stumble_mumble::address(&self.server, self.port)
    }
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_username() -> String {
    "stumble".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ping_interval() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    10
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact otherwise.
    Json,
}

/// Output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the log call.
    #[serde(default)]
    pub file_location: bool,

    /// Log file path when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// When the log file rolls over.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Rolled files kept on disk.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-module levels, e.g. `stumble_mumble = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: BTreeMap::new(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions_default_is_system_only() {
        let config = StumbleConfig::default();
        let extensions = config.extensions();
        assert_eq!(
            extensions.enabled,
            BTreeMap::from([("system".to_string(), true)])
        );
        assert!(!extensions.config.onlystandards);
    }

    #[test]
    fn test_extensions_config_key_is_reserved() {
        let json = serde_json::json!({
            "system": true,
            "greeter": false,
            "config": { "onlystandards": true, "directory": "ext" }
        });
        let extensions: ExtensionsConfig = serde_json::from_value(json).unwrap();

        assert!(extensions.config.onlystandards);
        assert_eq!(extensions.config.directory, Some(PathBuf::from("ext")));
        assert!(!extensions.enabled.contains_key("config"));
        assert_eq!(extensions.enabled.get("greeter"), Some(&false));
    }

    #[test]
    fn test_empty_operator_disables_dispatch() {
        let mut config = StumbleConfig::default();
        assert_eq!(config.operator(), None);
        config.operator = Some(String::new());
        assert_eq!(config.operator(), None);
        config.operator = Some("!".into());
        assert_eq!(config.operator(), Some("!"));
    }

    #[test]
    fn test_connect_options_from_config() {
        let mumble = MumbleConfig {
            ping_interval_secs: 5,
            accept_invalid_certs: false,
            ..Default::default()
        };
        let options = mumble.connect_options();
        assert_eq!(options.ping_interval, Duration::from_secs(5));
        assert!(!options.accept_invalid_certs);
        assert!(options.key.is_none());
        assert_eq!(mumble.address(), "mumble://localhost:64738");
    }
}
