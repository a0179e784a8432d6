//! Errors for the fuzzing runner.

use fuzzctl_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
	#[error("fuzzlet references unknown task {0}")]
	UnknownTask(String),

	#[error("process supervision error: {0}")]
	ProcSup(#[from] fuzzctl_procsup::ProcSupError),

	#[error("corpus aggregation error: {0}")]
	Corpus(#[from] fuzzctl_corpus::CorpusError),

	#[error("repository error: {0}")]
	Repository(#[from] fuzzctl_repository::RepositoryError),

	#[error("broker error: {0}")]
	Broker(#[from] fuzzctl_broker::BrokerError),

	#[error("kv error: {0}")]
	Kv(#[from] fuzzctl_kv::KvError),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

impl Classify for RunnerError {
	fn kind(&self) -> ErrorKind {
		match self {
			RunnerError::UnknownTask(_) => ErrorKind::Validation,
			RunnerError::ProcSup(_) => ErrorKind::Transient,
			RunnerError::Corpus(_) => ErrorKind::Transient,
			RunnerError::Repository(_) => ErrorKind::Transient,
			RunnerError::Broker(_) => ErrorKind::Transient,
			RunnerError::Kv(_) => ErrorKind::Transient,
			RunnerError::Io(_) => ErrorKind::Transient,
		}
	}
}

pub type Result<T> = std::result::Result<T, RunnerError>;
