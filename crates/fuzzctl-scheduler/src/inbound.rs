//! Consumes the gateway's inbound control exchange and acts on cancellations.

use fuzzctl_broker::{Delivery, EXCHANGE_INBOUND};
use fuzzctl_core::{InboundMessage, TaskStatus};

use crate::state::SchedulerState;

/// Subscribes to [`EXCHANGE_INBOUND`] and handles messages until the channel
/// closes (broker shutdown) or `shutdown` fires.
pub async fn run(state: std::sync::Arc<SchedulerState>, shutdown: tokio_util::sync::CancellationToken) {
	let mut rx = match state.broker.consume(EXCHANGE_INBOUND).await {
		Ok(rx) => rx,
		Err(error) => {
			tracing::error!(%error, "failed to subscribe to inbound exchange");
			return;
		}
	};

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				tracing::info!("inbound consumer received shutdown signal, stopping");
				break;
			}
			delivery = rx.recv() => {
				let Some(delivery) = delivery else {
					tracing::warn!("inbound exchange channel closed, stopping consumer");
					break;
				};
				handle_delivery(&state, delivery).await;
			}
		}
	}
}

async fn handle_delivery(state: &SchedulerState, delivery: Delivery) {
	let message: InboundMessage = match serde_json::from_slice(&delivery.payload) {
		Ok(message) => message,
		Err(error) => {
			tracing::error!(%error, "failed to parse inbound message, dropping");
			delivery.ack().await.ok();
			return;
		}
	};

	if let InboundMessage::Cancel { task_id } = message {
		if let Err(error) = state.repo.update_task_status(&task_id, TaskStatus::Canceled).await {
			tracing::error!(%error, task_id, "failed to cancel task");
		} else {
			tracing::info!(task_id, "task canceled via inbound message");
		}
	}

	delivery.ack().await.ok();
}
