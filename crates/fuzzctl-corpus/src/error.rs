//! Errors for dictionary/corpus aggregation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("walking {root}: {source}")]
	Walk {
		root: String,
		#[source]
		source: walkdir::Error,
	},
}

pub type Result<T> = std::result::Result<T, CorpusError>;
