//! Errors for process supervision.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcSupError {
	#[error("failed to spawn {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to open log file {path}: {source}")]
	LogFile {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("i/o error waiting on child: {0}")]
	Wait(#[from] std::io::Error),

	#[error("failed to signal pid {pid}: {source}")]
	Signal { pid: u32, source: nix::Error },
}

pub type Result<T> = std::result::Result<T, ProcSupError>;
