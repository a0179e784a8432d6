//! A thin client for the broker's HTTP management API, used only for queue
//! depth introspection (`GET /queue` on the scheduler's control surface).
//! Distinct from [`crate::BrokerClient`]: this talks HTTP, not AMQP, and has
//! no fake counterpart since depth reporting is advisory, never load-bearing.

use serde::Deserialize;

use crate::error::{BrokerError, Result};

#[derive(Debug, Deserialize)]
struct QueueInfo {
	#[serde(default)]
	messages_ready: u64,
	#[serde(default)]
	messages_unacknowledged: u64,
}

pub struct ManagementClient {
	client: reqwest::Client,
	base_url: String,
}

impl ManagementClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		ManagementClient {
			client: reqwest::Client::new(),
			base_url: base_url.into(),
		}
	}

	/// `messages_unacknowledged + messages_ready` for `queue` on the default vhost.
	pub async fn queue_depth(&self, queue: &str) -> Result<u64> {
		let url = format!("{}/api/queues/%2f/{queue}", self.base_url.trim_end_matches('/'));
		let info: QueueInfo = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(BrokerError::Management)?
			.error_for_status()
			.map_err(BrokerError::Management)?
			.json()
			.await
			.map_err(BrokerError::Management)?;
		Ok(info.messages_ready + info.messages_unacknowledged)
	}
}
