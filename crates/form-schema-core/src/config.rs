//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default token that lets a field's conditions refer to its own value.
pub const DEFAULT_SELF_REFERENCE: &str = "this";

/// Default limit on nested recomputation passes per field.
pub const DEFAULT_MAX_PASS_DEPTH: u32 = 16;

/// Settings shared by every node of a tree.
///
/// ```toml
/// self_reference = "this"
/// max_pass_depth = 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Dependency name bound to the field's own value in its conditions.
    #[serde(default = "default_self_reference")]
    pub self_reference: String,

    /// How many passes of the same field may be nested before further ones
    /// are skipped. Bounds `use_values_if` rules that assign each other.
    #[serde(default = "default_max_pass_depth")]
    pub max_pass_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            self_reference: default_self_reference(),
            max_pass_depth: default_max_pass_depth(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the self-reference token.
    #[must_use]
    pub fn with_self_reference(mut self, token: impl Into<String>) -> Self {
        self.self_reference = token.into();
        self
    }

    /// Overrides the nested pass limit.
    #[must_use]
    pub fn with_max_pass_depth(mut self, depth: u32) -> Self {
        self.max_pass_depth = depth;
        self
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the self-reference token is
    /// empty.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        if config.self_reference.trim().is_empty() {
            return Err(ConfigError::Parse {
                message: "self_reference must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}

fn default_self_reference() -> String {
    DEFAULT_SELF_REFERENCE.to_string()
}

fn default_max_pass_depth() -> u32 {
    DEFAULT_MAX_PASS_DEPTH
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse configuration.
    #[error("failed to parse config: {message}")]
    Parse {
        /// Error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.self_reference, "this");
        assert_eq!(config.max_pass_depth, 16);
    }

    #[test]
    fn test_parse_overrides() {
        let config = EngineConfig::parse(
            r#"
self_reference = "self"
max_pass_depth = 4
"#,
        )
        .unwrap();
        assert_eq!(config.self_reference, "self");
        assert_eq!(config.max_pass_depth, 4);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let err = EngineConfig::parse("max_depth = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_parse_rejects_empty_self_reference() {
        let err = EngineConfig::parse(r#"self_reference = " ""#).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"failed to parse config: self_reference must not be empty");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_pass_depth = 2").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_pass_depth, 2);
        assert_eq!(config.self_reference, "this");
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(&dir.path().join("engine.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
