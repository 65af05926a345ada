//! Engine configuration with validation and defaults.

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Default session lifetime before the timeout-close path opens (10 minutes).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identity of this engine deployment. Mixed into every session seed,
    /// so two engines with different ids never derive the same digest chain.
    pub engine_id: String,
    /// Seconds of inactivity after which a session is expired and may be
    /// closed by anyone.
    pub session_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_id: "croupier".to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.engine_id.is_empty() {
            return Err(EngineError::InvalidConfig(
                "engine_id must not be empty".to_string(),
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "session_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loader: TOML file, then `CROUPIER_*` environment overrides,
/// then validation.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn load(&self) -> EngineResult<EngineConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            Self::load_from_file(path)?
        } else {
            EngineConfig::default()
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> EngineResult<EngineConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| EngineError::InvalidConfig(format!("failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(config: &mut EngineConfig) -> EngineResult<()> {
        if let Ok(id) = env::var("CROUPIER_ENGINE_ID") {
            config.engine_id = id;
        }
        if let Ok(ttl) = env::var("CROUPIER_SESSION_TTL_SECS") {
            config.session_ttl_secs = ttl.parse().map_err(|_| {
                EngineError::InvalidConfig(format!(
                    "CROUPIER_SESSION_TTL_SECS: invalid value {:?}",
                    ttl
                ))
            })?;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let config = EngineConfig {
            session_ttl_secs: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_engine_id_fails_validation() {
        let config = EngineConfig {
            engine_id: String::new(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn loads_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine_id = \"house\"\nsession_ttl_secs = 120").unwrap();

        let config = ConfigLoader::new().with_path(file.path()).load().unwrap();
        assert_eq!(config.engine_id, "house");
        assert_eq!(config.session_ttl_secs, 120);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session_ttl_secs = \"not a number\"").unwrap();

        assert!(matches!(
            ConfigLoader::new().with_path(file.path()).load(),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
