//! Production [`BrokerClient`], backed by `lapin`.

use async_trait::async_trait;
use fuzzctl_core::{SarifMessage, TaskBroadcast, TriageMessage};
use lapin::options::{
	BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
	ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongLongInt};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::delivery::{Acker, Delivery};
use crate::error::{BrokerError, Result};
use crate::topology::{
	EXCHANGE_DEAD_LETTER, EXCHANGE_FUZZLET, EXCHANGE_INBOUND, EXCHANGE_SARIF, EXCHANGE_TASK_BROADCAST,
	EXCHANGE_TRIAGE, HEADER_RETRY_COUNT, PREFETCH_COUNT,
};
use crate::BrokerClient;

pub struct LapinBroker {
	channel: Channel,
}

impl LapinBroker {
	pub async fn connect(url: &str) -> Result<Self> {
		let connection = Connection::connect(url, ConnectionProperties::default())
			.await
			.map_err(BrokerError::Connection)?;
		let channel = connection.create_channel().await.map_err(BrokerError::Connection)?;
		channel
			.basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
			.await
			.map_err(BrokerError::Connection)?;

		for (exchange, kind) in [
			(EXCHANGE_TASK_BROADCAST, ExchangeKind::Fanout),
			(EXCHANGE_TRIAGE, ExchangeKind::Fanout),
			(EXCHANGE_SARIF, ExchangeKind::Fanout),
			(EXCHANGE_FUZZLET, ExchangeKind::Direct),
			(EXCHANGE_DEAD_LETTER, ExchangeKind::Fanout),
			(EXCHANGE_INBOUND, ExchangeKind::Fanout),
		] {
			channel
				.exchange_declare(
					exchange,
					kind,
					ExchangeDeclareOptions {
						durable: true,
						..Default::default()
					},
					FieldTable::default(),
				)
				.await
				.map_err(BrokerError::Connection)?;
		}

		Ok(LapinBroker { channel })
	}

	async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8], priority: u8) -> Result<()> {
		self.publish_with_headers(exchange, routing_key, payload, priority, FieldTable::default())
			.await
	}

	async fn publish_with_headers(
		&self,
		exchange: &str,
		routing_key: &str,
		payload: &[u8],
		priority: u8,
		headers: FieldTable,
	) -> Result<()> {
		self.channel
			.basic_publish(
				exchange,
				routing_key,
				BasicPublishOptions::default(),
				payload,
				BasicProperties::default()
					.with_delivery_mode(2) // persistent
					.with_priority(priority)
					.with_headers(headers),
			)
			.await
			.map_err(|source| BrokerError::Publish {
				exchange: exchange.to_string(),
				source,
			})?
			.await
			.map_err(|source| BrokerError::Publish {
				exchange: exchange.to_string(),
				source,
			})?;
		Ok(())
	}
}

#[async_trait]
impl BrokerClient for LapinBroker {
	async fn publish_task_broadcast(&self, msg: &TaskBroadcast, priority: u8) -> Result<()> {
		self.publish(EXCHANGE_TASK_BROADCAST, "", &serde_json::to_vec(msg)?, priority)
			.await
	}

	async fn publish_triage(&self, msg: &TriageMessage, priority: u8) -> Result<()> {
		self.publish(EXCHANGE_TRIAGE, "", &serde_json::to_vec(msg)?, priority).await
	}

	async fn publish_sarif(&self, msg: &SarifMessage) -> Result<()> {
		self.publish(EXCHANGE_SARIF, "", &serde_json::to_vec(msg)?, 0).await
	}

	async fn publish_fuzzlet(&self, routing_key: &str, payload: &[u8], priority: u8) -> Result<()> {
		self.publish(EXCHANGE_FUZZLET, routing_key, payload, priority).await
	}

	async fn republish(&self, exchange: &str, routing_key: &str, payload: &[u8], retry_count: u32) -> Result<()> {
		self.publish_with_headers(exchange, routing_key, payload, 0, retry_header(retry_count))
			.await
	}

	async fn consume(&self, queue: &str) -> Result<mpsc::Receiver<Delivery>> {
		self.bind_and_consume(queue, queue, queue).await
	}

	async fn consume_fuzzlets(&self, project_name: &str) -> Result<mpsc::Receiver<Delivery>> {
		let queue = format!("fuzzlet.{project_name}");
		self.bind_and_consume(&queue, EXCHANGE_FUZZLET, project_name).await
	}
}

impl LapinBroker {
	/// Declares `queue`, binds it to `exchange` under `routing_key`, and
	/// starts consuming. For the three fanout exchanges, `queue`/`exchange`/
	/// `routing_key` are all the same string (routing key is ignored by a
	/// fanout bind). `EXCHANGE_FUZZLET` is a direct exchange keyed by project,
	/// so its queue name and routing key necessarily differ.
	async fn bind_and_consume(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<mpsc::Receiver<Delivery>> {
		self.channel
			.queue_declare(
				queue,
				QueueDeclareOptions {
					durable: true,
					..Default::default()
				},
				FieldTable::default(),
			)
			.await
			.map_err(|source| BrokerError::Consume {
				queue: queue.to_string(),
				source,
			})?;
		self.channel
			.queue_bind(
				queue,
				exchange,
				routing_key,
				QueueBindOptions::default(),
				FieldTable::default(),
			)
			.await
			.ok();

		let mut consumer = self
			.channel
			.basic_consume(
				queue,
				queue,
				BasicConsumeOptions::default(),
				FieldTable::default(),
			)
			.await
			.map_err(|source| BrokerError::Consume {
				queue: queue.to_string(),
				source,
			})?;

		let (tx, rx) = mpsc::channel(64);
		let queue_name = queue.to_string();
		tokio::spawn(async move {
			while let Some(delivery) = consumer.next().await {
				let Ok(delivery) = delivery else { continue };
				let retry_count = delivery
					.properties
					.headers()
					.as_ref()
					.and_then(|headers| headers.inner().get(HEADER_RETRY_COUNT))
					.and_then(|value| match value {
						AMQPValue::LongLongInt(n) => Some(*n as u32),
						_ => None,
					})
					.unwrap_or(0);
				let routing_key = delivery.routing_key.to_string();
				let payload = delivery.data.clone();
				let acker = LapinAcker { delivery };
				if tx
					.send(Delivery::new(payload, routing_key, retry_count, Box::new(acker)))
					.await
					.is_err()
				{
					tracing::warn!(queue = %queue_name, "consumer receiver dropped, stopping");
					break;
				}
			}
		});

		Ok(rx)
	}
}

struct LapinAcker {
	delivery: lapin::message::Delivery,
}

#[async_trait]
impl Acker for LapinAcker {
	async fn ack(&self) -> Result<()> {
		self.delivery
			.ack(BasicAckOptions::default())
			.await
			.map_err(BrokerError::Connection)
	}

	async fn nack(&self, requeue: bool) -> Result<()> {
		self.delivery
			.nack(BasicNackOptions {
				requeue,
				..Default::default()
			})
			.await
			.map_err(BrokerError::Connection)
	}
}

fn retry_header(count: u32) -> FieldTable {
	let mut headers = FieldTable::default();
	headers.insert(HEADER_RETRY_COUNT.into(), AMQPValue::LongLongInt(count as LongLongInt));
	headers
}
