//! Errors for configuration loading.

use thiserror::Error;

/// Errors that can occur when loading [`crate::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: String, error: std::io::Error },

	#[error("TOML parse error in {path}: {error}")]
	Toml { path: String, error: toml::de::Error },

	#[error("missing required setting: {0}")]
	MissingField(String),

	#[error("invalid value for {field}: {reason}")]
	InvalidValue { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
