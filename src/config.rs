use crate::checkpoint::DEFAULT_NAMESPACE;
use crate::error::{AutomationError, Result};
use crate::executor::TimingConfig;
use crate::logging::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine settings, usually read from a TOML file
///
/// ```toml
/// logHistory = 1000
/// checkpointNamespace = "connections"
///
/// [timing.throttle]
/// minMs = 1000
/// maxMs = 2500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Records kept in the in-memory log history
    pub log_history: usize,

    pub checkpoint_namespace: String,

    pub timing: TimingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_history: DEFAULT_HISTORY_CAPACITY,
            checkpoint_namespace: DEFAULT_NAMESPACE.to_string(),
            timing: TimingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| AutomationError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| AutomationError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&input)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AutomationError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DelayRange;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_toml_str(
            r#"
            checkpointNamespace = "connections"

            [timing.throttle]
            minMs = 1000
            maxMs = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.checkpoint_namespace, "connections");
        assert_eq!(config.log_history, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(config.timing.throttle, DelayRange::new(1000, 2500));
        assert_eq!(config.timing.keystroke, TimingConfig::default().keystroke);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = EngineConfig::from_toml_str("logHistroy = 5");
        assert!(matches!(result, Err(AutomationError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = EngineConfig::default();
        config.log_history = 42;
        config.timing = TimingConfig::instant();
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        assert!(EngineConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
