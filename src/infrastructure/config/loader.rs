//! Configuration loading: embedded TOML defaults layered under
//! environment-variable overrides (spec §6).
//!
//! Grounded on the teacher's `infrastructure/config/loader.rs`
//! `ConfigLoader`, trimmed to the two layers this crate needs (no
//! XDG user-config file or hot-reload watcher).

use super::types::Config;
use crate::domain::error::{Error, Result};
use config::{Config as ConfigBuilder, Environment, FileFormat};
use validator::Validate;

/// Embedded default configuration, compiled into the binary so it works
/// from any working directory.
const DEFAULT_CONFIG_TOML: &str = include_str!("../../../config/default.toml");

/// Return the embedded default config TOML, exposed for tests that
/// verify the defaults parse and validate.
pub fn default_config_toml() -> &'static str {
    DEFAULT_CONFIG_TOML
}

/// Loads [`Config`] from embedded defaults and `SAGA__`-prefixed
/// environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from embedded defaults, overridden by
    /// environment variables (e.g. `SAGA__EMBEDDING__PROVIDER=http`).
    pub async fn load(&self) -> Result<Config> {
        let builder = ConfigBuilder::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG_TOML, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("SAGA")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| Error::generic(format!("failed to build configuration: {e}")))?;

        let config: Config = config
            .try_deserialize()
            .map_err(|e| Error::generic(format!("failed to deserialize configuration: {e}")))?;

        config
            .validate()
            .map_err(|e| Error::validation(format!("configuration validation failed: {e}")))?;

        Ok(config)
    }
}
