//! Runs one fuzzlet end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fuzzctl_core::Fuzzlet;
use fuzzctl_corpus::{aggregate_seed_corpus, merge_dictionaries};
use fuzzctl_crashmgr::{CrashInput, CrashManager};
use fuzzctl_kv::KvClient;
use fuzzctl_procsup::ProcessSupervisor;
use fuzzctl_repository::TaskRepository;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RunnerError};
use crate::fuzzer::{FuzzRunSpec, Fuzzer};
use crate::layout::{builder_seed_dir, corpus_store_dir, harness_copy_paths, RunLayout};
use crate::stats;
use crate::watchdogs;

pub struct RunnerConfig {
	pub storage_root: PathBuf,
	pub work_root: PathBuf,
	/// Total fuzzer cores: 1 master + core_count - 1 slaves.
	pub core_count: usize,
	/// On-disk copies of the harness binary to place before fuzzing, to spread
	/// the instances' I/O across separate inodes. Only the primary copy
	/// (`layout.harness_bin`) is ever handed to the fuzzer.
	pub harness_copies: usize,
	pub graceful_ratio: f64,
}

/// Runs one fuzzlet to completion: assembles seeds and dictionary, runs the
/// fuzzer under the task's graceful-shutdown budget, forwards discovered
/// crashes to `crash_manager`, and replenishes the shared corpus store with
/// whatever the run's queue directories picked up.
pub async fn run_fuzzlet(
	supervisor: &dyn ProcessSupervisor,
	fuzzer: &dyn Fuzzer,
	kv: &dyn KvClient,
	repo: &dyn TaskRepository,
	crash_manager: &CrashManager,
	config: &RunnerConfig,
	fuzzlet: &Fuzzlet,
	shutdown: &CancellationToken,
) -> Result<()> {
	let layout = RunLayout::new(&config.work_root, fuzzlet);
	if let Some(parent) = layout.harness_bin.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}
	for copy_path in harness_copy_paths(&layout.harness_bin, &fuzzlet.harness, config.harness_copies) {
		tokio::fs::copy(&fuzzlet.artifact_path, &copy_path).await?;
	}
	tokio::fs::create_dir_all(&layout.output_dir).await?;

	let builder_seeds = builder_seed_dir(&config.storage_root, &fuzzlet.task_id, &fuzzlet.harness);
	let corpus_store = corpus_store_dir(&config.storage_root, &fuzzlet.task_id, &fuzzlet.harness);
	tokio::fs::create_dir_all(&corpus_store).await?;
	aggregate_seed_corpus(&[builder_seeds.as_path(), corpus_store.as_path()], &layout.seeds_dir)?;

	let dict_path = assemble_dictionary(kv, &layout.merged_dict, &fuzzlet.task_id, &fuzzlet.harness).await?;

	let task = repo
		.get_task_by_id(&fuzzlet.task_id)
		.await?
		.ok_or_else(|| RunnerError::UnknownTask(fuzzlet.task_id.clone()))?;
	let graceful_budget = graceful_shutdown_budget(task.deadline, config.graceful_ratio);

	let watchdog_shutdown = CancellationToken::new();
	let mut crash_rx = watchdogs::spawn_crash_watchdog(&layout.output_dir, watchdog_shutdown.clone());
	let mut seed_rx = watchdogs::spawn_seed_watchdog(&layout.output_dir, watchdog_shutdown.clone());

	let forward_task_id = fuzzlet.task_id.clone();
	let forward_harness = fuzzlet.harness.clone();
	let forward_sanitizer = fuzzlet.sanitizer.clone();
	let crash_manager = crash_manager.clone();
	let forward_crashes = tokio::spawn(async move {
		while let Some(path) = crash_rx.recv().await {
			crash_manager
				.submit(CrashInput {
					task_id: forward_task_id.clone(),
					harness_name: forward_harness.clone(),
					sanitizer: forward_sanitizer.clone(),
					architecture: std::env::consts::ARCH.to_string(),
					source_path: path,
				})
				.await;
		}
	});
	let discard_seeds = tokio::spawn(async move { while seed_rx.recv().await.is_some() {} });

	let spec = FuzzRunSpec {
		harness_bin: &layout.harness_bin,
		seeds_dir: &layout.seeds_dir,
		output_dir: &layout.output_dir,
		dict_path: dict_path.as_deref(),
		instance_count: config.core_count.max(1),
		graceful_budget,
	};
	let run_result = fuzzer.run_fuzz(supervisor, &spec, shutdown).await;

	watchdog_shutdown.cancel();
	forward_crashes.await.ok();
	discard_seeds.await.ok();

	run_result?;

	stats::log_fuzzer_stats(&layout.output_dir, &fuzzlet.task_id);
	replenish_corpus_store(&layout.output_dir, &corpus_store)?;

	Ok(())
}

async fn assemble_dictionary(kv: &dyn KvClient, dest: &Path, task_id: &str, harness: &str) -> Result<Option<PathBuf>> {
	let dict_paths = kv.smembers(&fuzzctl_kv::keys::harness_dicts(task_id, harness)).await?;
	if dict_paths.is_empty() {
		return Ok(None);
	}
	let count = merge_dictionaries(&dict_paths, dest)?;
	Ok(if count > 0 { Some(dest.to_path_buf()) } else { None })
}

/// `0.9 × (deadline − now)`, floored at zero for a deadline already in the past.
fn graceful_shutdown_budget(deadline: chrono::DateTime<Utc>, graceful_ratio: f64) -> Duration {
	let remaining_secs = (deadline - Utc::now()).num_seconds().max(0) as f64;
	Duration::from_secs_f64((remaining_secs * graceful_ratio).max(0.0))
}

/// Copies every file under each instance's `queue/` into the shared corpus
/// store, deduplicated by content, so a later run (of this or another
/// sanitizer for the same harness) starts from what this run discovered.
fn replenish_corpus_store(output_dir: &Path, corpus_store: &Path) -> Result<()> {
	let Ok(entries) = std::fs::read_dir(output_dir) else {
		return Ok(());
	};
	let queue_dirs: Vec<PathBuf> = entries
		.flatten()
		.map(|entry| entry.path().join("queue"))
		.filter(|path| path.is_dir())
		.collect();
	if queue_dirs.is_empty() {
		return Ok(());
	}
	aggregate_seed_corpus(&queue_dirs, corpus_store)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;
	use fuzzctl_core::FuzzEngine;
	use fuzzctl_kv::FakeKv;
	use fuzzctl_procsup::FakeProcessSupervisor;
	use fuzzctl_repository::SqlRepository;

	use super::*;

	struct CountingFuzzer {
		calls: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl Fuzzer for CountingFuzzer {
		async fn run_fuzz(
			&self,
			_supervisor: &dyn ProcessSupervisor,
			spec: &FuzzRunSpec<'_>,
			_shutdown: &CancellationToken,
		) -> Result<()> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			tokio::fs::create_dir_all(spec.output_dir.join("master").join("queue")).await?;
			tokio::fs::write(
				spec.output_dir.join("master").join("queue").join("id:000000,src:000000"),
				b"discovered-seed",
			)
			.await?;
			Ok(())
		}

		fn supported_engines(&self) -> &'static [FuzzEngine] {
			&[FuzzEngine::Afl]
		}
	}

	fn sample_fuzzlet(artifact_path: &Path) -> Fuzzlet {
		Fuzzlet {
			task_id: "t1".into(),
			harness: "fuzz_parse".into(),
			sanitizer: "address".into(),
			fuzz_engine: FuzzEngine::Afl,
			artifact_path: artifact_path.display().to_string(),
		}
	}

	// Minimal direct insert matching the schema, mirroring how the repository's
	// own tests seed a row without a public `insert_task` API.
	async fn insert_task(repo: &SqlRepository, task_id: &str, deadline: chrono::DateTime<Utc>) {
		sqlx::query(
			"INSERT INTO tasks (task_id, task_type, project_name, focus, deadline, status, metadata, message_id, user_id) \
			 VALUES (?, 'full', 'libpng', 'libpng', ?, 'pending', '{}', 'm1', 'u1')",
		)
		.bind(task_id)
		.bind(deadline.to_rfc3339())
		.execute(repo.pool())
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn runs_the_fuzzer_and_replenishes_the_corpus_store() {
		let storage = tempfile::tempdir().unwrap();
		let harness_bin = storage.path().join("built").join("fuzz_parse");
		tokio::fs::create_dir_all(harness_bin.parent().unwrap()).await.unwrap();
		tokio::fs::write(&harness_bin, b"#!/bin/sh\n").await.unwrap();

		let config = RunnerConfig {
			storage_root: storage.path().join("storage"),
			work_root: storage.path().join("work"),
			core_count: 2,
			harness_copies: 1,
			graceful_ratio: 0.9,
		};

		let repo = SqlRepository::connect("sqlite::memory:").await.unwrap();
		insert_task(&repo, "t1", Utc::now() + chrono::Duration::hours(1)).await;

		let supervisor = FakeProcessSupervisor::new(0);
		let kv = FakeKv::new();
		let (crash_manager, _crash_rx, _handle) = CrashManager::spawn(storage.path().join("crashes"), 8);
		let calls = Arc::new(AtomicUsize::new(0));
		let fuzzer = CountingFuzzer { calls: calls.clone() };
		let shutdown = CancellationToken::new();

		run_fuzzlet(
			&supervisor,
			&fuzzer,
			&kv,
			&repo,
			&crash_manager,
			&config,
			&sample_fuzzlet(&harness_bin),
			&shutdown,
		)
		.await
		.unwrap();

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		let corpus_store = corpus_store_dir(&config.storage_root, "t1", "fuzz_parse");
		let stored: Vec<_> = std::fs::read_dir(&corpus_store).unwrap().collect();
		assert_eq!(stored.len(), 1);
	}

	#[tokio::test]
	async fn unknown_task_is_rejected_before_any_fuzzer_is_spawned() {
		let storage = tempfile::tempdir().unwrap();
		let harness_bin = storage.path().join("built").join("fuzz_parse");
		tokio::fs::create_dir_all(harness_bin.parent().unwrap()).await.unwrap();
		tokio::fs::write(&harness_bin, b"#!/bin/sh\n").await.unwrap();

		let config = RunnerConfig {
			storage_root: storage.path().join("storage"),
			work_root: storage.path().join("work"),
			core_count: 1,
			harness_copies: 1,
			graceful_ratio: 0.9,
		};

		let repo = SqlRepository::connect("sqlite::memory:").await.unwrap();
		let supervisor = FakeProcessSupervisor::new(0);
		let kv = FakeKv::new();
		let (crash_manager, _crash_rx, _handle) = CrashManager::spawn(storage.path().join("crashes"), 8);
		let fuzzer = CountingFuzzer { calls: Arc::new(AtomicUsize::new(0)) };
		let shutdown = CancellationToken::new();

		let error = run_fuzzlet(
			&supervisor,
			&fuzzer,
			&kv,
			&repo,
			&crash_manager,
			&config,
			&sample_fuzzlet(&harness_bin),
			&shutdown,
		)
		.await
		.unwrap_err();

		assert!(matches!(error, RunnerError::UnknownTask(ref id) if id == "t1"));
	}

	#[tokio::test]
	async fn harness_copies_greater_than_one_places_extra_copies_on_disk() {
		let storage = tempfile::tempdir().unwrap();
		let harness_bin = storage.path().join("built").join("fuzz_parse");
		tokio::fs::create_dir_all(harness_bin.parent().unwrap()).await.unwrap();
		tokio::fs::write(&harness_bin, b"#!/bin/sh\n").await.unwrap();

		let config = RunnerConfig {
			storage_root: storage.path().join("storage"),
			work_root: storage.path().join("work"),
			core_count: 1,
			harness_copies: 3,
			graceful_ratio: 0.9,
		};

		let repo = SqlRepository::connect("sqlite::memory:").await.unwrap();
		insert_task(&repo, "t1", Utc::now() + chrono::Duration::hours(1)).await;

		let supervisor = FakeProcessSupervisor::new(0);
		let kv = FakeKv::new();
		let (crash_manager, _crash_rx, _handle) = CrashManager::spawn(storage.path().join("crashes"), 8);
		let fuzzer = CountingFuzzer { calls: Arc::new(AtomicUsize::new(0)) };
		let shutdown = CancellationToken::new();

		run_fuzzlet(
			&supervisor,
			&fuzzer,
			&kv,
			&repo,
			&crash_manager,
			&config,
			&sample_fuzzlet(&harness_bin),
			&shutdown,
		)
		.await
		.unwrap();

		let layout = RunLayout::new(&config.work_root, &sample_fuzzlet(&harness_bin));
		let bin_dir = layout.harness_bin.parent().unwrap();
		assert!(layout.harness_bin.is_file());
		assert!(bin_dir.join("fuzz_parse.1").is_file());
		assert!(bin_dir.join("fuzz_parse.2").is_file());
	}
}
