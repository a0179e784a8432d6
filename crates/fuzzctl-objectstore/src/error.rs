//! Errors for artifact download, extraction, and patching.

use fuzzctl_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
	#[error("download of {url} failed: {source}")]
	Download {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("sha256 mismatch for {url}: expected {expected}, got {actual}")]
	HashMismatch {
		url: String,
		expected: String,
		actual: String,
	},

	#[error("archive at {path} has an unrecognized format")]
	UnknownArchiveFormat { path: String },

	#[error("archive extraction failed: {0}")]
	Extract(#[source] std::io::Error),

	#[error("patch {path} did not apply: {stderr}")]
	PatchRejected { path: String, stderr: String },

	#[error("process supervision error: {0}")]
	ProcSup(#[from] fuzzctl_procsup::ProcSupError),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

impl Classify for ObjectStoreError {
	fn kind(&self) -> ErrorKind {
		match self {
			ObjectStoreError::Download { .. } => ErrorKind::Transient,
			ObjectStoreError::HashMismatch { .. } => ErrorKind::Integrity,
			ObjectStoreError::UnknownArchiveFormat { .. } => ErrorKind::Integrity,
			ObjectStoreError::Extract(_) => ErrorKind::Integrity,
			ObjectStoreError::PatchRejected { .. } => ErrorKind::Validation,
			ObjectStoreError::ProcSup(_) => ErrorKind::Transient,
			ObjectStoreError::Io(_) => ErrorKind::Transient,
		}
	}
}

pub type Result<T> = std::result::Result<T, ObjectStoreError>;
