//! In-process broker for tests, shaped like the editor workspace's `BrokerCore`:
//! a registry of named channels instead of a real exchange/queue topology.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fuzzctl_core::{SarifMessage, TaskBroadcast, TriageMessage};
use tokio::sync::{Mutex, mpsc};

use crate::delivery::{Acker, Delivery};
use crate::error::Result;
use crate::topology::{EXCHANGE_FUZZLET, EXCHANGE_SARIF, EXCHANGE_TASK_BROADCAST, EXCHANGE_TRIAGE};
use crate::BrokerClient;

#[derive(Default)]
pub struct FakeBroker {
	queues: Mutex<HashMap<String, mpsc::Sender<Delivery>>>,
}

impl FakeBroker {
	pub fn new() -> Arc<Self> {
		Arc::new(FakeBroker::default())
	}

	async fn publish_raw(&self, queue: &str, payload: Vec<u8>, retry_count: u32) -> Result<()> {
		let queues = self.queues.lock().await;
		if let Some(sender) = queues.get(queue) {
			let delivery = Delivery::new(payload, queue.to_string(), retry_count, Box::new(NoopAcker));
			sender.send(delivery).await.ok();
		}
		Ok(())
	}
}

struct NoopAcker;

#[async_trait]
impl Acker for NoopAcker {
	async fn ack(&self) -> Result<()> {
		Ok(())
	}

	async fn nack(&self, _requeue: bool) -> Result<()> {
		Ok(())
	}
}

#[async_trait]
impl BrokerClient for FakeBroker {
	async fn publish_task_broadcast(&self, msg: &TaskBroadcast, _priority: u8) -> Result<()> {
		self.publish_raw(EXCHANGE_TASK_BROADCAST, serde_json::to_vec(msg)?, 0).await
	}

	async fn publish_triage(&self, msg: &TriageMessage, _priority: u8) -> Result<()> {
		self.publish_raw(EXCHANGE_TRIAGE, serde_json::to_vec(msg)?, 0).await
	}

	async fn publish_sarif(&self, msg: &SarifMessage) -> Result<()> {
		self.publish_raw(EXCHANGE_SARIF, serde_json::to_vec(msg)?, 0).await
	}

	async fn publish_fuzzlet(&self, routing_key: &str, payload: &[u8], _priority: u8) -> Result<()> {
		let queue = if routing_key.is_empty() { EXCHANGE_FUZZLET } else { routing_key };
		self.publish_raw(queue, payload.to_vec(), 0).await
	}

	async fn republish(&self, exchange: &str, routing_key: &str, payload: &[u8], retry_count: u32) -> Result<()> {
		let queue = if exchange == EXCHANGE_FUZZLET {
			if routing_key.is_empty() { EXCHANGE_FUZZLET } else { routing_key }
		} else {
			exchange
		};
		self.publish_raw(queue, payload.to_vec(), retry_count).await
	}

	async fn consume(&self, queue: &str) -> Result<mpsc::Receiver<Delivery>> {
		let (tx, rx) = mpsc::channel(64);
		self.queues.lock().await.insert(queue.to_string(), tx);
		Ok(rx)
	}

	async fn consume_fuzzlets(&self, project_name: &str) -> Result<mpsc::Receiver<Delivery>> {
		self.consume(project_name).await
	}
}
