//! Configuration for the Stumble runtime.
//!
//! Layered loading with figment, the schema of the configuration file and
//! a validation pass run after loading.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile, load_config, load_config_from_file};
pub use schema::{
    ExtensionOptions, ExtensionsConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    MumbleConfig, SpanEventConfig, StumbleConfig,
};
pub use validation::validate_config;
