//! TOML-based engine configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;

/// Engine configuration loaded from a TOML file or built from defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of concurrent peripheral links. Default: 5.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_connections: usize,
    /// Seconds before an unanswered connect attempt is abandoned. Default: 8.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Path-loss exponent for distance estimation, valid in [2.0, 4.0].
    /// Default: 2.0.
    #[serde(default = "default_environmental_factor")]
    pub environmental_factor: f64,
    /// Capacity of the bridged-peer dedup cache. Default: 65536.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Depth of the transport event queue. Default: 1024.
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_connect_timeout() -> u64 {
    8
}

fn default_environmental_factor() -> f64 {
    2.0
}

fn default_dedup_capacity() -> usize {
    65536
}

fn default_event_queue_depth() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections: default_max_concurrent(),
            connect_timeout_secs: default_connect_timeout(),
            environmental_factor: default_environmental_factor(),
            dedup_capacity: default_dedup_capacity(),
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(format!("failed to parse config: {e}")))
    }

    /// Preset for severely resource-constrained radios: two concurrent links.
    pub fn constrained() -> Self {
        Self {
            max_concurrent_connections: 2,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_connections, 5);
        assert_eq!(config.connect_timeout_secs, 8);
        assert_eq!(config.environmental_factor, 2.0);
        assert_eq!(config.dedup_capacity, 65536);
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config.max_concurrent_connections, 5);
        assert_eq!(config.event_queue_depth, 1024);
    }

    #[test]
    fn test_parse_overrides() {
        let config = EngineConfig::parse(
            r#"
            max_concurrent_connections = 3
            connect_timeout_secs = 12
            environmental_factor = 3.5
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_connections, 3);
        assert_eq!(config.connect_timeout_secs, 12);
        assert_eq!(config.environmental_factor, 3.5);
        assert_eq!(config.dedup_capacity, 65536);
    }

    #[test]
    fn test_parse_invalid_toml_fails() {
        let result = EngineConfig::parse("max_concurrent_connections = \"many\"");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_constrained_preset() {
        let config = EngineConfig::constrained();
        assert_eq!(config.max_concurrent_connections, 2);
        assert_eq!(config.connect_timeout_secs, 8);
    }
}
