use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection settings for [`crate::Database::open`].
///
/// ```yaml
/// path: data/world.db
/// busy_timeout_ms: 2000
/// migrate: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file. Absent means a private in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    /// Apply additive migrations to existing tables on open.
    #[serde(default = "default_migrate")]
    pub migrate: bool,
}

fn default_busy_timeout() -> u64 {
    5000
}

fn default_migrate() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: None,
            busy_timeout_ms: default_busy_timeout(),
            migrate: default_migrate(),
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        DatabaseConfig {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a YAML file. Relative database paths resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_yaml_str(&content)?;
        if let (Some(db_path), Some(dir)) = (&config.path, path.parent()) {
            if db_path.is_relative() {
                config.path = Some(dir.join(db_path));
            }
        }
        Ok(config)
    }
}
