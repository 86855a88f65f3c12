//! Configuration for the engine and the file synchronizer
//!
//! Configuration is read from YAML into a [`ConfigBuilder`], where every field is optional. Fields
//! that aren't given take their defaults, so an empty file (or no file at all) is a valid
//! configuration:
//!
//! ```yaml
//! reload_chunk_size: 65536
//! undo_limit: 1000
//! coalesce_pieces: true
//! log_level: Warn
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The default number of bytes read at a time while reloading from a file
pub const DEFAULT_RELOAD_CHUNK_SIZE: usize = 64 * 1024;

/// The complete configuration, with every value filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// The number of bytes read per chunk when reloading. Cancellation is checked between chunks.
    pub reload_chunk_size: usize,
    /// The maximum number of edits kept for undo; `None` is unlimited
    pub undo_limit: Option<usize>,
    /// Whether contiguous pieces are joined as edits are made
    pub coalesce_pieces: bool,
    pub log_level: log::LevelFilter,
}

/// A partial [`Config`], as it appears in a configuration file
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigBuilder {
    pub reload_chunk_size: Option<usize>,
    pub undo_limit: Option<usize>,
    pub coalesce_pieces: Option<bool>,
    pub log_level: Option<log::LevelFilter>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reload_chunk_size: DEFAULT_RELOAD_CHUNK_SIZE,
            undo_limit: None,
            coalesce_pieces: true,
            log_level: log::LevelFilter::Warn,
        }
    }
}

impl Config {
    /// Parses a configuration from YAML, filling in defaults for anything missing
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as "null", which isn't a map
        if s.trim().is_empty() {
            return Ok(Config::default());
        }

        let builder: ConfigBuilder = serde_yaml::from_str(s)?;
        builder.build()
    }

    /// Reads and parses the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|cause| ConfigError::Read {
            path: path.to_owned(),
            cause,
        })?;

        log::debug!("loaded config from {}", path.display());
        Self::from_yaml_str(&contents)
    }

    /// Overwrites the fields given in the builder, leaving the rest as they were
    pub fn update(&mut self, builder: ConfigBuilder) -> Result<(), ConfigError> {
        let mut new = self.clone();

        if let Some(size) = builder.reload_chunk_size {
            new.reload_chunk_size = size;
        }
        if let Some(limit) = builder.undo_limit {
            new.undo_limit = Some(limit);
        }
        if let Some(coalesce) = builder.coalesce_pieces {
            new.coalesce_pieces = coalesce;
        }
        if let Some(level) = builder.log_level {
            new.log_level = level;
        }

        new.validate()?;
        *self = new;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reload_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "`reload_chunk_size` must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

impl ConfigBuilder {
    /// Produces the full configuration, using defaults for any missing fields
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        config.update(self)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn partial_fields() {
        let config = Config::from_yaml_str("undo_limit: 50\nlog_level: Debug\n").unwrap();

        assert_eq!(config.undo_limit, Some(50));
        assert_eq!(config.log_level, log::LevelFilter::Debug);
        assert_eq!(config.reload_chunk_size, DEFAULT_RELOAD_CHUNK_SIZE);
        assert!(config.coalesce_pieces);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = Config::from_yaml_str("reload_chunk_size: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = Config::from_yaml_str("chunk_size: 10").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn failed_update_leaves_config() {
        let mut config = Config::default();
        let builder = ConfigBuilder {
            reload_chunk_size: Some(0),
            coalesce_pieces: Some(false),
            ..Default::default()
        };

        assert!(config.update(builder).is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piecebuf.yml");
        fs::write(&path, "reload_chunk_size: 4096\ncoalesce_pieces: false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.reload_chunk_size, 4096);
        assert!(!config.coalesce_pieces);
    }
}
