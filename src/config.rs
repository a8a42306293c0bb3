//! Runtime configuration
//!
//! Defaults can be overridden from the environment and then by the builder
//! methods (the CLI applies its flags last).

use std::path::PathBuf;

use crate::permissions::DEFAULT_STORAGE_KEY;

/// Environment variable for the rule store file
pub const STORE_ENV: &str = "TOOLGATE_STORE";
/// Environment variable for the storage key
pub const STORAGE_KEY_ENV: &str = "TOOLGATE_STORAGE_KEY";
/// Environment variable for the log directory
pub const LOG_DIR_ENV: &str = "TOOLGATE_LOG_DIR";

/// Configuration for the permission store and logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// JSON file holding the rules
    pub store_path: PathBuf,
    /// Key the rule list is stored under
    pub storage_key: String,
    /// Directory for log files
    pub log_dir: PathBuf,
}

impl GateConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            store_path: PathBuf::from("permissions.json"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }

    /// Defaults overridden by `TOOLGATE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_empty(STORE_ENV) {
            config.store_path = PathBuf::from(path);
        }
        if let Some(key) = non_empty(STORAGE_KEY_ENV) {
            config.storage_key = key;
        }
        if let Some(dir) = non_empty(LOG_DIR_ENV) {
            config.log_dir = PathBuf::from(dir);
        }
        config
    }

    /// Set the rule store file
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the storage key
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GateConfig::new();
        assert_eq!(config.store_path, PathBuf::from("permissions.json"));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (STORE_ENV, "/tmp/rules.json"),
            (STORAGE_KEY_ENV, ""),
            (LOG_DIR_ENV, "/var/log/toolgate"),
        ]);
        let config = GateConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.store_path, PathBuf::from("/tmp/rules.json"));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/toolgate"));
    }

    #[test]
    fn test_builder_wins() {
        let config = GateConfig::new()
            .with_store_path("a.json")
            .with_storage_key("rules")
            .with_log_dir("out");
        assert_eq!(config.store_path, PathBuf::from("a.json"));
        assert_eq!(config.storage_key, "rules");
        assert_eq!(config.log_dir, PathBuf::from("out"));
    }
}
