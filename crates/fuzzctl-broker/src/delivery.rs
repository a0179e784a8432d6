//! A received message plus the means to settle it, independent of transport.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Acker: Send + Sync {
	async fn ack(&self) -> Result<()>;
	async fn nack(&self, requeue: bool) -> Result<()>;
}

/// One message pulled off a queue, not yet acknowledged.
pub struct Delivery {
	pub payload: Vec<u8>,
	pub routing_key: String,
	/// Value of [`crate::topology::HEADER_RETRY_COUNT`], 0 if absent.
	pub retry_count: u32,
	acker: Box<dyn Acker>,
}

impl Delivery {
	pub fn new(payload: Vec<u8>, routing_key: String, retry_count: u32, acker: Box<dyn Acker>) -> Self {
		Delivery {
			payload,
			routing_key,
			retry_count,
			acker,
		}
	}

	pub async fn ack(&self) -> Result<()> {
		self.acker.ack().await
	}

	pub async fn nack(&self, requeue: bool) -> Result<()> {
		self.acker.nack(requeue).await
	}
}
