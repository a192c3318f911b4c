//! YAML configuration for a calculator session.

use crate::RuntimeError;
use cod_core::SliderPositions;
use cod_econ::CurrencyStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Session settings. Every field is optional in the file.
///
/// Example:
/// positions: { revenue: 4, delay: 3 }
/// currency_style: grouped
/// store_dir: ./saves
/// session_seed: 42
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Slider indices the session starts from.
    pub positions: SliderPositions,
    pub currency_style: CurrencyStyle,
    /// Directory for the file-backed store.
    pub store_dir: PathBuf,
    /// Fixes the random part of the analytics session id.
    pub session_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            positions: SliderPositions::default(),
            currency_style: CurrencyStyle::default(),
            store_dir: PathBuf::from(persistence::default_store_dir()),
            session_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, RuntimeError> {
        let config: RuntimeConfig =
            serde_yaml::from_str(text).map_err(|e| RuntimeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Self::from_yaml_str(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Slider positions must all lie on their ladders.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.positions.to_input()?;
        Ok(())
    }
}
