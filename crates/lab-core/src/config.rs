//! Engine policy configuration.
//!
//! Loaded once at composition time, usually from a TOML file:
//!
//! ```toml
//! marginal_ratio = 0.8
//! delta_threshold_percent = 50.0
//! validator_roles = ["pathologist", "administrator"]
//! require_critical_ack = true
//! ```

use std::path::{Path, PathBuf};

use lab_model::ActorRole;
use lab_validate::DEFAULT_DELTA_THRESHOLD_PERCENT;
use serde::{Deserialize, Serialize};

/// Fraction of the required volume below which a draw is insufficient.
pub const DEFAULT_MARGINAL_RATIO: f64 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Collected/required ratio at or above which a short draw is still usable.
    pub marginal_ratio: f64,
    pub delta_threshold_percent: f64,
    /// Roles allowed to validate, reject and acknowledge results.
    pub validator_roles: Vec<ActorRole>,
    /// Block validation while critical flags are unacknowledged.
    pub require_critical_ack: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marginal_ratio: DEFAULT_MARGINAL_RATIO,
            delta_threshold_percent: DEFAULT_DELTA_THRESHOLD_PERCENT,
            validator_roles: vec![ActorRole::Pathologist, ActorRole::Administrator],
            require_critical_ack: true,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.marginal_ratio > 0.0 && self.marginal_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "marginal_ratio must be in (0, 1], got {}",
                    self.marginal_ratio
                ),
            });
        }
        if !(self.delta_threshold_percent.is_finite() && self.delta_threshold_percent > 0.0) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "delta_threshold_percent must be positive, got {}",
                    self.delta_threshold_percent
                ),
            });
        }
        if self.validator_roles.is_empty() {
            return Err(ConfigError::Invalid {
                message: "validator_roles cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn may_validate(&self, role: ActorRole) -> bool {
        self.validator_roles.contains(&role)
    }
}
