//! The single shipped [`Fuzzer`] implementation, driving `afl-fuzz`.

use async_trait::async_trait;
use fuzzctl_core::FuzzEngine;
use fuzzctl_procsup::{ProcessSpec, ProcessSupervisor, SupervisedProcess};
use tokio_util::sync::CancellationToken;

use crate::env;
use crate::error::Result;
use crate::fuzzer::{FuzzRunSpec, Fuzzer};

/// `-t <ms>+`: the trailing `+` tells AFL++ to skip a timing out input rather
/// than treat it as a hang, which matters for harnesses with a wide natural
/// runtime variance.
const TIMEOUT_ARG: &str = "1000+";

pub struct AflFuzzer;

#[async_trait]
impl Fuzzer for AflFuzzer {
	async fn run_fuzz(
		&self,
		supervisor: &dyn ProcessSupervisor,
		spec: &FuzzRunSpec<'_>,
		shutdown: &CancellationToken,
	) -> Result<()> {
		tokio::fs::create_dir_all(spec.output_dir).await?;

		let mut instances = Vec::with_capacity(spec.instance_count);
		for index in 0..spec.instance_count {
			let is_master = index == 0;
			let name = if is_master { "master".to_string() } else { format!("slave{index}") };
			let handle = supervisor.spawn(instance_spec(spec, is_master, &name)).await?;
			instances.push(handle);
		}

		tokio::select! {
			_ = tokio::time::sleep(spec.graceful_budget) => {
				tracing::info!("graceful shutdown budget expired, signalling afl-fuzz instances");
			}
			_ = shutdown.cancelled() => {
				tracing::info!("cancelled before graceful shutdown budget expired, signalling afl-fuzz instances");
			}
		}

		for instance in &mut instances {
			instance.interrupt().await.ok();
		}

		// The runner must not return while any child is alive: every instance
		// is waited on, escalating to a hard kill only if cancellation fires
		// again (e.g. the operator gives up on the graceful window) while
		// we're still draining.
		for mut instance in instances {
			tokio::select! {
				result = instance.wait() => {
					if let Err(error) = result {
						tracing::warn!(%error, "afl-fuzz instance exited with error");
					}
				}
				_ = shutdown.cancelled() => {
					instance.kill().await.ok();
				}
			}
		}

		Ok(())
	}

	fn supported_engines(&self) -> &'static [FuzzEngine] {
		&[FuzzEngine::Afl]
	}
}

fn instance_spec(spec: &FuzzRunSpec<'_>, is_master: bool, name: &str) -> ProcessSpec {
	let mut process_spec = ProcessSpec::new("afl-fuzz")
		.arg("-i")
		.arg(spec.seeds_dir.display().to_string())
		.arg("-o")
		.arg(spec.output_dir.display().to_string())
		.arg(if is_master { "-M" } else { "-S" })
		.arg(name)
		.arg("-t")
		.arg(TIMEOUT_ARG);

	if let Some(dict) = spec.dict_path {
		process_spec = process_spec.arg("-x").arg(dict.display().to_string());
	}

	process_spec = process_spec.arg("--").arg(spec.harness_bin.display().to_string());

	for (key, value) in env::instance_env(is_master) {
		process_spec = process_spec.env(key, value);
	}

	process_spec
}
