//! Configuration management for the daemon.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Redis connection URL for the pub/sub bus.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Document database path. Defaults to the path under the base dir.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            db_path: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables override whatever the file says.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let config_path = paths.config_file();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Resolve the database path, defaulting to the base-dir location.
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| paths.database_file())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("GRIDD_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(redis_url) = std::env::var("GRIDD_REDIS_URL") {
            self.redis_url = redis_url;
        }
        if let Ok(db_path) = std::env::var("GRIDD_DB_PATH") {
            self.db_path = Some(PathBuf::from(db_path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "debug".to_string();
        config.redis_url = "redis://example:6380".to_string();
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.redis_url, "redis://example:6380");
    }

    #[test]
    fn test_config_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("missing"));

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
    }

    #[test]
    fn test_config_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log_level": "trace"}"#).unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
    }

    #[test]
    fn test_database_path_default_and_override() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        assert_eq!(config.database_path(&paths), paths.database_file());

        config.db_path = Some(PathBuf::from("/custom/grid.sqlite"));
        assert_eq!(
            config.database_path(&paths),
            PathBuf::from("/custom/grid.sqlite")
        );
    }
}
