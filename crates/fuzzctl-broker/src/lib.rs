//! Broker client abstraction over AMQP exchanges.
//!
//! Generalizes the editor workspace's `BrokerCore` (an in-process
//! register/send/broadcast registry) into a trait with two implementations: a
//! `lapin`-backed one for production, and an in-process fake for tests that
//! keeps the same register/broadcast shape the editor crate used.

mod delivery;
mod error;
mod fake;
mod management;
mod real;
mod topology;

use async_trait::async_trait;
use fuzzctl_core::{SarifMessage, TaskBroadcast, TriageMessage};

pub use delivery::{Acker, Delivery};
pub use error::{BrokerError, Result};
pub use fake::FakeBroker;
pub use management::ManagementClient;
pub use real::LapinBroker;
pub use topology::{
	EXCHANGE_DEAD_LETTER, EXCHANGE_FUZZLET, EXCHANGE_INBOUND, EXCHANGE_SARIF, EXCHANGE_TASK_BROADCAST,
	EXCHANGE_TRIAGE, HEADER_RETRY_COUNT, MAX_REQUEUE_ATTEMPTS, PREFETCH_COUNT,
};

/// Publish/consume surface the scheduler, builder, and runner share.
#[async_trait]
pub trait BrokerClient: Send + Sync {
	async fn publish_task_broadcast(&self, msg: &TaskBroadcast, priority: u8) -> Result<()>;
	async fn publish_triage(&self, msg: &TriageMessage, priority: u8) -> Result<()>;
	async fn publish_sarif(&self, msg: &SarifMessage) -> Result<()>;
	async fn publish_fuzzlet(&self, routing_key: &str, payload: &[u8], priority: u8) -> Result<()>;

	/// Declares (if needed) and starts consuming `queue` with QoS prefetch 1.
	async fn consume(&self, queue: &str) -> Result<tokio::sync::mpsc::Receiver<Delivery>>;

	/// Declares a queue bound to [`EXCHANGE_FUZZLET`] under `project_name`'s
	/// routing key. A runner only cares about the projects it is configured
	/// to fuzz, so this is a separate method from [`BrokerClient::consume`]
	/// rather than overloading it with a queue name that then needs to
	/// disagree with its own binding key.
	async fn consume_fuzzlets(&self, project_name: &str) -> Result<tokio::sync::mpsc::Receiver<Delivery>>;

	/// Publishes `payload` back onto `exchange` under `routing_key`, carrying
	/// `retry_count` in the [`HEADER_RETRY_COUNT`] header so the next consumer
	/// (or this same method, on the next settle) knows how many times this
	/// delivery has already cycled.
	async fn republish(&self, exchange: &str, routing_key: &str, payload: &[u8], retry_count: u32) -> Result<()>;

	/// Republishes to `dead_letter_exchange` when `delivery` has already been
	/// nacked [`MAX_REQUEUE_ATTEMPTS`] times, otherwise requeues onto
	/// `requeue_exchange` with an incremented retry-count header. Either way,
	/// acks the original delivery: requeue is done by hand (a fresh publish)
	/// rather than relying on the broker's native redelivery, because AMQP
	/// only exposes a `redelivered` boolean, not a count.
	async fn settle_with_retry_policy(
		&self,
		delivery: Delivery,
		requeue_exchange: &str,
		dead_letter_exchange: &str,
	) -> Result<()> {
		let next_retry_count = delivery.retry_count + 1;
		if next_retry_count >= MAX_REQUEUE_ATTEMPTS {
			tracing::warn!(
				routing_key = %delivery.routing_key,
				retry_count = delivery.retry_count,
				"message exceeded max requeue attempts, dead-lettering"
			);
			self.republish(dead_letter_exchange, &delivery.routing_key, &delivery.payload, next_retry_count)
				.await
				.ok();
		} else {
			self.republish(requeue_exchange, &delivery.routing_key, &delivery.payload, next_retry_count)
				.await
				.ok();
		}
		delivery.ack().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fuzzctl_core::TaskType;

	fn sample_broadcast() -> TaskBroadcast {
		TaskBroadcast {
			task_id: "t1".into(),
			task_type: TaskType::Full,
			project_name: "libpng".into(),
			focus: "libpng".into(),
			repo: vec!["/tmp/t1/libpng".into()],
			fuzzing_tooling: "/tmp/t1/tooling".into(),
			diff: None,
		}
	}

	#[tokio::test]
	async fn fake_broker_round_trips_a_task_broadcast() {
		let broker = FakeBroker::new();
		let mut rx = broker.consume(EXCHANGE_TASK_BROADCAST).await.unwrap();
		broker.publish_task_broadcast(&sample_broadcast(), 5).await.unwrap();

		let delivery = rx.recv().await.unwrap();
		let decoded: TaskBroadcast = serde_json::from_slice(&delivery.payload).unwrap();
		assert_eq!(decoded.task_id, "t1");
		delivery.ack().await.unwrap();
	}

	#[tokio::test]
	async fn fake_broker_routes_fuzzlets_by_project_name() {
		let broker = FakeBroker::new();
		let mut libpng_rx = broker.consume_fuzzlets("libpng").await.unwrap();
		let mut other_rx = broker.consume_fuzzlets("other").await.unwrap();

		broker.publish_fuzzlet("libpng", b"payload", 0).await.unwrap();

		let delivery = libpng_rx.recv().await.unwrap();
		assert_eq!(delivery.payload, b"payload");
		assert!(other_rx.try_recv().is_err());
	}
}
