//! Database configuration, stored as `config.toml` in the database
//! directory.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, DatabaseResult};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Branch targeted by [`Database::commit`](crate::Database::commit).
    pub default_branch: String,
    /// zstd level for loose objects.
    pub compression_level: i32,
    /// `fsync` objects and references before they become visible.
    pub sync_writes: bool,
    pub author: AuthorConfig,
}

/// Identity recorded as author and committer of new commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".into(),
            compression_level: relaxo_store::file::DEFAULT_COMPRESSION_LEVEL,
            sync_writes: false,
            author: AuthorConfig::default(),
        }
    }
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "relaxo".into(),
            email: "relaxo@localhost".into(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_toml(text: &str) -> DatabaseResult<Self> {
        toml::from_str(text).map_err(|e| DatabaseError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> DatabaseResult<String> {
        toml::to_string_pretty(self).map_err(|e| DatabaseError::Config(e.to_string()))
    }

    /// Read `config.toml` from `dir`, writing the defaults first if the file
    /// does not exist.
    pub fn load_or_init(dir: &Path) -> DatabaseResult<Self> {
        let path = dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                fs::write(&path, config.to_toml()?)?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, dir: &Path) -> DatabaseResult<()> {
        fs::write(dir.join(CONFIG_FILE), self.to_toml()?)?;
        Ok(())
    }
}
