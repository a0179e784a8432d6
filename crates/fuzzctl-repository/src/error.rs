//! Errors for repository operations.

use fuzzctl_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("malformed row for {entity}: {reason}")]
	MalformedRow { entity: String, reason: String },

	#[error("invalid status transition for task {task_id}: {from:?} -> {to:?}")]
	InvalidTransition {
		task_id: String,
		from: fuzzctl_core::TaskStatus,
		to: fuzzctl_core::TaskStatus,
	},
}

impl Classify for RepositoryError {
	fn kind(&self) -> ErrorKind {
		match self {
			RepositoryError::Database(_) => ErrorKind::Transient,
			RepositoryError::MalformedRow { .. } => ErrorKind::Integrity,
			RepositoryError::InvalidTransition { .. } => ErrorKind::Validation,
		}
	}
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
