//! Weave configuration
//!
//! Markers on the IR select *what* gets instrumented. The configuration
//! binds the names of the external collaborators the instrumentation calls
//! into (disposal contract, tracking container, registration helper, command
//! capability) and of the markers themselves. Every key is optional in the
//! TOML form; missing keys fall back to the defaults of [`crate::magic`].
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    magic::*,
    utils::error::{WeaveError, WeaveResult},
};

/// A type looked up by full name inside a referenced assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub name: String,
    pub assembly: String,
}

impl SymbolConfig {
    pub fn new(name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assembly: assembly.into(),
        }
    }
}

/// A method looked up by name on a type of a referenced assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    pub member: String,
    pub assembly: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Type/constructor/method marker of the handle-tracking family.
    pub track_handles: String,
    /// Type/property marker of the command-release family.
    pub release_commands: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            track_handles: TRACK_HANDLES_MARKER.to_string(),
            release_commands: RELEASE_COMMANDS_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub field_prefix: String,
    pub handle_call_fragment: String,
    pub release_method: String,
    pub disposal_contract: SymbolConfig,
    pub tracking_container: SymbolConfig,
    pub registration_helper: MemberConfig,
    pub command_capability: SymbolConfig,
    pub markers: MarkerConfig,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            field_prefix: DEFAULT_FIELD_PREFIX.to_string(),
            handle_call_fragment: DEFAULT_HANDLE_CALL_FRAGMENT.to_string(),
            release_method: DEFAULT_RELEASE_METHOD.to_string(),
            disposal_contract: SymbolConfig::new(DISPOSAL_CONTRACT_NAME, DISPOSAL_CONTRACT_ASSEMBLY),
            tracking_container: SymbolConfig::new(
                TRACKING_CONTAINER_NAME,
                TRACKING_CONTAINER_ASSEMBLY,
            ),
            registration_helper: MemberConfig {
                type_name: REGISTRATION_HELPER_TYPE.to_string(),
                member: REGISTRATION_HELPER_METHOD.to_string(),
                assembly: REGISTRATION_HELPER_ASSEMBLY.to_string(),
            },
            command_capability: SymbolConfig::new(
                COMMAND_CAPABILITY_NAME,
                COMMAND_CAPABILITY_ASSEMBLY,
            ),
            markers: MarkerConfig::default(),
        }
    }
}

impl WeaveConfig {
    /// Path of the configuration file: `$SWEEP_CONFIG_PATH` when set,
    /// otherwise `Sweep.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => path.into(),
            Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn from_toml_str(source: &str) -> WeaveResult<Self> {
        toml::from_str(source).map_err(|e| WeaveError::ConfigParse {
            source: e,
            file: "<inline>".to_string(),
        })
    }

    pub fn to_toml_string(&self) -> WeaveResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> WeaveResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| WeaveError::ConfigParse {
            source: e,
            file: path.display().to_string(),
        })
    }

    /// Load from `path` when the file exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> WeaveResult<Self> {
        if path.exists() {
            Self::load_from_toml(path)
        } else {
            log::debug!(
                "no weave configuration at `{}`, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_toml(&self, path: &Path) -> WeaveResult<()> {
        let toml_str = self.to_toml_string()?;

        // Attempt to create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
