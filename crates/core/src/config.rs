//! Engine configuration: parser limits, run options, and JSON loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pl2b_diagnostics::UNKNOWN_FILE;

/// Default bound on parts per logical line.
pub const DEFAULT_PARTS_PER_LINE: usize = 512;
/// Default diagnostic message capacity in bytes.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 512;

/// Errors that can occur when loading or validating an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// JSON deserialization failed.
    #[error("invalid config JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// Tokenizer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParseOptions {
    /// File identifier attached to every command and diagnostic.
    pub file_name: String,
    /// Maximum number of parts (command name included) on one logical line.
    pub parts_per_line: usize,
    /// Maximum message length of a parse diagnostic, in bytes.
    pub message_capacity: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            file_name: UNKNOWN_FILE.to_string(),
            parts_per_line: DEFAULT_PARTS_PER_LINE,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

impl ParseOptions {
    /// Default options for a named file.
    pub fn for_file(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Override the parts-per-line bound (builder pattern).
    pub fn with_parts_per_line(mut self, parts_per_line: usize) -> Self {
        self.parts_per_line = parts_per_line;
        self
    }
}

/// Execution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunOptions {
    /// Maximum message length of the run diagnostic, in bytes.
    pub message_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

/// Complete engine configuration, as loaded from a JSON file.
///
/// Every field is optional; missing fields take their defaults.
///
/// ```
/// let cfg = pl2b_core::EngineConfig::from_json(r#"{"parse":{"parts_per_line":8}}"#).unwrap();
/// assert_eq!(cfg.parse.parts_per_line, 8);
/// assert_eq!(cfg.run.message_capacity, 512);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Tokenizer settings.
    pub parse: ParseOptions,
    /// Execution settings.
    pub run: RunOptions,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse, and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parse.parts_per_line == 0 {
            return Err(ConfigError::InvalidField {
                field: "parse.parts_per_line".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.parse.file_name.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "parse.file_name".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
