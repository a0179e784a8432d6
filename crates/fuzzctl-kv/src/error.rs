//! Errors for KV operations.

use fuzzctl_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
	#[error("redis connection error: {0}")]
	Connection(#[source] redis::RedisError),

	#[error("redis command error: {0}")]
	Command(#[source] redis::RedisError),
}

impl Classify for KvError {
	fn kind(&self) -> ErrorKind {
		match self {
			KvError::Connection(_) => ErrorKind::Transient,
			KvError::Command(_) => ErrorKind::Transient,
		}
	}
}

pub type Result<T> = std::result::Result<T, KvError>;
