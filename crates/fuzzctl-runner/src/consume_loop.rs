//! The runner's top-level loop: consume `fuzzlet` deliveries for one project, fuzz, settle.

use std::sync::Arc;

use fuzzctl_broker::{BrokerClient, EXCHANGE_DEAD_LETTER, EXCHANGE_FUZZLET};
use fuzzctl_core::Fuzzlet;
use fuzzctl_crashmgr::CrashManager;
use fuzzctl_kv::KvClient;
use fuzzctl_procsup::ProcessSupervisor;
use fuzzctl_repository::TaskRepository;
use tokio_util::sync::CancellationToken;

use crate::fuzzer::Fuzzer;
use crate::pipeline::{run_fuzzlet, RunnerConfig};

/// Consumes `project_name`'s fuzzlet deliveries until `shutdown` is cancelled,
/// running each fuzzlet and acking (or dead-lettering, on repeated failure)
/// the delivery once the run is done with it.
#[allow(clippy::too_many_arguments)]
pub async fn run(
	supervisor: Arc<dyn ProcessSupervisor>,
	fuzzer: Arc<dyn Fuzzer>,
	broker: Arc<dyn BrokerClient>,
	kv: Arc<dyn KvClient>,
	repo: Arc<dyn TaskRepository>,
	crash_manager: CrashManager,
	config: Arc<RunnerConfig>,
	project_name: String,
	shutdown: CancellationToken,
) -> anyhow::Result<()> {
	let mut deliveries = broker.consume_fuzzlets(&project_name).await?;

	loop {
		let delivery = tokio::select! {
			_ = shutdown.cancelled() => break,
			next = deliveries.recv() => match next {
				Some(delivery) => delivery,
				None => break,
			},
		};

		let fuzzlet: Fuzzlet = match serde_json::from_slice(&delivery.payload) {
			Ok(fuzzlet) => fuzzlet,
			Err(error) => {
				tracing::error!(%error, "dropping malformed fuzzlet delivery");
				delivery.ack().await.ok();
				continue;
			}
		};

		tracing::info!(task_id = %fuzzlet.task_id, harness = %fuzzlet.harness, "starting fuzzing run");
		let result = run_fuzzlet(
			supervisor.as_ref(),
			fuzzer.as_ref(),
			kv.as_ref(),
			repo.as_ref(),
			&crash_manager,
			&config,
			&fuzzlet,
			&shutdown,
		)
		.await;

		match result {
			Ok(()) => {
				tracing::info!(task_id = %fuzzlet.task_id, "fuzzing run complete");
				delivery.ack().await.ok();
			}
			Err(error) => {
				tracing::error!(task_id = %fuzzlet.task_id, %error, "fuzzing run failed");
				broker
					.settle_with_retry_policy(delivery, EXCHANGE_FUZZLET, EXCHANGE_DEAD_LETTER)
					.await
					.ok();
			}
		}
	}

	Ok(())
}
