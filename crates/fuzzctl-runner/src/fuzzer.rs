//! The pluggable fuzzing-engine seam: one trait, one shipped implementation,
//! so a second engine is added by implementing this trait rather than
//! branching on [`fuzzctl_core::FuzzEngine`] inside the runner's supervision
//! loop.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fuzzctl_core::FuzzEngine;
use fuzzctl_procsup::ProcessSupervisor;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Inputs to one fuzzing run, already resolved to concrete filesystem paths.
pub struct FuzzRunSpec<'a> {
	pub harness_bin: &'a Path,
	pub seeds_dir: &'a Path,
	pub output_dir: &'a Path,
	pub dict_path: Option<&'a Path>,
	/// 1 master + (instance_count - 1) slaves.
	pub instance_count: usize,
	pub graceful_budget: Duration,
}

#[async_trait]
pub trait Fuzzer: Send + Sync {
	/// Spawns every instance, waits out `spec.graceful_budget` (or an earlier
	/// `shutdown`), requests graceful termination, and does not return while
	/// any instance is still alive.
	async fn run_fuzz(
		&self,
		supervisor: &dyn ProcessSupervisor,
		spec: &FuzzRunSpec<'_>,
		shutdown: &CancellationToken,
	) -> Result<()>;

	fn supported_engines(&self) -> &'static [FuzzEngine];
}
