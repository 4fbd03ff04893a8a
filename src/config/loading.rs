use std::{fs, path::Path};

use tracing::{debug, info};

use super::{BridgeConfig, ConfigPaths};
use crate::{BridgeError, Result};

impl BridgeConfig {
    /// Loads the configuration from the default config file.
    ///
    /// A missing file is not an error; defaults are returned instead.
    ///
    /// # Errors
    /// Returns error if the config directory cannot be resolved, or if the file
    /// exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = ConfigPaths::main_config().map_err(|e| BridgeError::Config(e.to_string()))?;
        Self::load_from(&path)
    }

    /// Loads the configuration from an explicit path.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| BridgeError::io(e, path))?;

        toml::from_str(&content).map_err(|e| BridgeError::toml_parse(e, Some(path)))
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    /// Returns `BridgeError::TomlParseError` if the text is not valid TOML or
    /// does not match the schema.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BridgeError::toml_parse(e, None))
    }
}
