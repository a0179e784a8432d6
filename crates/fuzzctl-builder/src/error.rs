//! Errors for the build pipeline.

use fuzzctl_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("patch application failed: {0}")]
	Patch(#[from] fuzzctl_objectstore::ObjectStoreError),

	#[error("compile for sanitizer {sanitizer} failed after {attempts} attempts: exit code {exit_code}")]
	CompileFailed {
		sanitizer: String,
		attempts: u32,
		exit_code: i32,
	},

	#[error("process supervision error: {0}")]
	ProcSup(#[from] fuzzctl_procsup::ProcSupError),

	#[error("no harnesses discovered under {0}")]
	NoHarnesses(String),

	#[error("broker error: {0}")]
	Broker(#[from] fuzzctl_broker::BrokerError),

	#[error("kv error: {0}")]
	Kv(#[from] fuzzctl_kv::KvError),

	#[error("invalid project.yaml: {0}")]
	ProjectYaml(#[from] serde_yaml::Error),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

impl Classify for BuilderError {
	fn kind(&self) -> ErrorKind {
		match self {
			BuilderError::Patch(inner) => inner.kind(),
			BuilderError::CompileFailed { .. } => ErrorKind::ResourceExhaustion,
			BuilderError::ProcSup(_) => ErrorKind::Transient,
			BuilderError::NoHarnesses(_) => ErrorKind::Validation,
			BuilderError::Broker(_) => ErrorKind::Transient,
			BuilderError::Kv(_) => ErrorKind::Transient,
			BuilderError::ProjectYaml(_) => ErrorKind::Validation,
			BuilderError::Io(_) => ErrorKind::Transient,
		}
	}
}

pub type Result<T> = std::result::Result<T, BuilderError>;
