//! Errors for filesystem watching.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchdogError {
	#[error("failed to watch {path}: {source}")]
	Watch {
		path: String,
		#[source]
		source: notify::Error,
	},
}

pub type Result<T> = std::result::Result<T, WatchdogError>;
