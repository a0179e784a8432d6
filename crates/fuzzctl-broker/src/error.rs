//! Errors for broker publish/consume operations.

use fuzzctl_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
	#[error("amqp connection error: {0}")]
	Connection(#[source] lapin::Error),

	#[error("amqp channel error on {exchange}: {source}")]
	Publish {
		exchange: String,
		#[source]
		source: lapin::Error,
	},

	#[error("amqp consume error on {queue}: {source}")]
	Consume {
		queue: String,
		#[source]
		source: lapin::Error,
	},

	#[error("failed to serialize message: {0}")]
	Serialize(#[from] serde_json::Error),

	#[error("broker management api error: {0}")]
	Management(#[source] reqwest::Error),
}

impl Classify for BrokerError {
	fn kind(&self) -> ErrorKind {
		match self {
			BrokerError::Connection(_) => ErrorKind::Transient,
			BrokerError::Publish { .. } => ErrorKind::Transient,
			BrokerError::Consume { .. } => ErrorKind::Transient,
			BrokerError::Serialize(_) => ErrorKind::Programming,
			BrokerError::Management(_) => ErrorKind::Transient,
		}
	}
}

pub type Result<T> = std::result::Result<T, BrokerError>;
