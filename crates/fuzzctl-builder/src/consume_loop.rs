//! The builder's top-level loop: consume `task_broadcast`, build, settle.

use std::sync::Arc;

use fuzzctl_broker::{BrokerClient, EXCHANGE_DEAD_LETTER, EXCHANGE_TASK_BROADCAST};
use fuzzctl_core::TaskBroadcast;
use fuzzctl_kv::KvClient;
use fuzzctl_procsup::ProcessSupervisor;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{build_task, BuildConfig};

/// Consumes `task_broadcast` deliveries until `shutdown` is cancelled,
/// building each task and acking (or dead-lettering, on repeated failure)
/// the delivery once the build pipeline is done with it.
pub async fn run(
	supervisor: Arc<dyn ProcessSupervisor>,
	broker: Arc<dyn BrokerClient>,
	kv: Arc<dyn KvClient>,
	config: Arc<BuildConfig>,
	shutdown: CancellationToken,
) -> anyhow::Result<()> {
	let mut deliveries = broker.consume(EXCHANGE_TASK_BROADCAST).await?;

	loop {
		let delivery = tokio::select! {
			_ = shutdown.cancelled() => break,
			next = deliveries.recv() => match next {
				Some(delivery) => delivery,
				None => break,
			},
		};

		let broadcast: TaskBroadcast = match serde_json::from_slice(&delivery.payload) {
			Ok(broadcast) => broadcast,
			Err(error) => {
				tracing::error!(%error, "dropping malformed task_broadcast delivery");
				delivery.ack().await.ok();
				continue;
			}
		};

		tracing::info!(task_id = %broadcast.task_id, "starting build");
		match build_task(supervisor.as_ref(), broker.as_ref(), kv.as_ref(), &config, &broadcast).await {
			Ok(fuzzlets) => {
				tracing::info!(task_id = %broadcast.task_id, count = fuzzlets.len(), "build complete");
				delivery.ack().await.ok();
			}
			Err(error) => {
				tracing::error!(task_id = %broadcast.task_id, %error, "build failed");
				broker
					.settle_with_retry_policy(delivery, EXCHANGE_TASK_BROADCAST, EXCHANGE_DEAD_LETTER)
					.await
					.ok();
			}
		}
	}

	Ok(())
}
