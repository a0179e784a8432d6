//! Errors for crash storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrashMgrError {
	#[error("i/o error handling crash at {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
}

pub type Result<T> = std::result::Result<T, CrashMgrError>;
