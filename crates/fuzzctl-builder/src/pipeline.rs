//! The build pipeline: patch, compile per sanitizer, discover, publish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fuzzctl_broker::BrokerClient;
use fuzzctl_core::{FuzzEngine, Fuzzlet, SeedMessage, TaskBroadcast};
use fuzzctl_kv::KvClient;
use fuzzctl_procsup::ProcessSupervisor;

use crate::compile::compile_with_retry;
use crate::discover::{discover_harnesses, HarnessArtifact};
use crate::dockerfile::rewrite_for_cmin;
use crate::error::{BuilderError, Result};
use crate::project;

pub struct BuildConfig {
	pub storage_root: PathBuf,
	pub build_timeout: Duration,
	pub build_retries: u32,
}

/// Runs the whole pipeline for one dispatched task: apply the diff (if any),
/// skip entirely for JVM targets, compile once per configured sanitizer,
/// discover harnesses, publish each harness's seed corpus and dictionary, and
/// publish one [`Fuzzlet`] per harness × sanitizer.
pub async fn build_task(
	supervisor: &dyn ProcessSupervisor,
	broker: &dyn BrokerClient,
	kv: &dyn KvClient,
	config: &BuildConfig,
	broadcast: &TaskBroadcast,
) -> Result<Vec<Fuzzlet>> {
	let repo_dir = broadcast
		.repo
		.first()
		.map(PathBuf::from)
		.unwrap_or_else(|| config.storage_root.join(&broadcast.task_id).join("repo"));
	let tooling_dir = PathBuf::from(&broadcast.fuzzing_tooling);

	let trace_ctx = kv
		.get(&fuzzctl_kv::keys::trace_context(&broadcast.task_id))
		.await
		.ok()
		.flatten()
		.and_then(|raw| fuzzctl_telemetry::TraceContext::import(&raw))
		.unwrap_or_default()
		.child();
	kv.set(
		&fuzzctl_kv::keys::artifacts_trace_context(&broadcast.task_id),
		&trace_ctx.export(),
		None,
	)
	.await
	.ok();
	let span = tracing::info_span!(
		"build_task",
		task_id = %broadcast.task_id,
		trace_id = %trace_ctx.trace_id,
		span_id = trace_ctx.span_id,
	);
	let _guard = span.enter();

	if let Some(diff_dir) = &broadcast.diff {
		fuzzctl_objectstore::apply_patches(supervisor, Path::new(diff_dir), &repo_dir).await?;
	}

	let project = project::load(&tooling_dir, &broadcast.project_name)?;
	if project.is_jvm() {
		tracing::info!(task_id = %broadcast.task_id, "jvm project, skipping compile");
		kv.set(&fuzzctl_kv::keys::cmin_failed(&broadcast.task_id), "true", None)
			.await?;
		return Ok(Vec::new());
	}

	let mut published = Vec::new();
	for sanitizer in project.sanitizers() {
		// Each sanitizer compiles against its own copy of the task tree so a
		// build for one sanitizer can never clobber another's in-progress output.
		let out_dir = config
			.storage_root
			.join(&broadcast.task_id)
			.join("isolated")
			.join(&sanitizer)
			.join("build")
			.join("out")
			.join(&broadcast.project_name);

		let out_dir = compile_with_retry(
			supervisor,
			&repo_dir,
			&tooling_dir,
			&out_dir,
			&broadcast.project_name,
			&sanitizer,
			&[("AFL_LLVM_DICT2FILE".to_string(), "/out/b3yond.dict".to_string())],
			config.build_timeout,
			config.build_retries,
		)
		.await?;

		let harnesses = discover_harnesses(&out_dir)?;
		for harness in &harnesses {
			let artifact_path = publish_artifact(kv, config, &broadcast.task_id, &sanitizer, harness).await?;
			publish_dictionary(kv, config, &broadcast.task_id, harness).await?;
			extract_seed_corpus(config, &broadcast.task_id, harness)?;
			kv.sadd(&fuzzctl_kv::keys::harnesses(&broadcast.task_id), &harness.name).await?;

			let fuzzlet = fuzzlet_for(broadcast, &sanitizer, &artifact_path, harness);
			let payload = serde_json::to_vec(&fuzzlet).map_err(|source| BuilderError::Io(source.into()))?;
			kv.sadd(fuzzctl_kv::keys::FUZZLETS, &fuzzlet.identity()).await?;
			broker.publish_fuzzlet(&broadcast.project_name, &payload, 0).await?;
			published.push(fuzzlet);
		}
	}

	run_seed_minimization(supervisor, kv, config, &repo_dir, &tooling_dir, broadcast).await;

	Ok(published)
}

/// Best-effort seed-minimization build: rewrites the project's Dockerfile to
/// link the bundled minimization engine, compiles once, and records
/// completion in the KV regardless of outcome. A failure here never prevents
/// the primary sanitizer builds above, which have already published by the
/// time this runs.
async fn run_seed_minimization(
	supervisor: &dyn ProcessSupervisor,
	kv: &dyn KvClient,
	config: &BuildConfig,
	repo_dir: &Path,
	tooling_dir: &Path,
	broadcast: &TaskBroadcast,
) {
	let result = try_seed_minimization(supervisor, config, repo_dir, tooling_dir, broadcast).await;
	if let Err(error) = &result {
		tracing::warn!(task_id = %broadcast.task_id, %error, "seed minimization build failed, continuing");
	}
	kv.set(&fuzzctl_kv::keys::cmin_failed(&broadcast.task_id), "true", None)
		.await
		.ok();
}

async fn try_seed_minimization(
	supervisor: &dyn ProcessSupervisor,
	config: &BuildConfig,
	repo_dir: &Path,
	tooling_dir: &Path,
	broadcast: &TaskBroadcast,
) -> Result<()> {
	let src_dockerfile = tooling_dir
		.join("projects")
		.join(&broadcast.project_name)
		.join("Dockerfile");
	let cmin_dockerfile = src_dockerfile.with_extension("cmin");
	rewrite_for_cmin(&src_dockerfile, &cmin_dockerfile, tooling_dir, &broadcast.project_name)?;

	let out_dir = config
		.storage_root
		.join(&broadcast.task_id)
		.join("isolated")
		.join("cmin")
		.join("build")
		.join("out")
		.join(&broadcast.project_name);

	compile_with_retry(
		supervisor,
		repo_dir,
		tooling_dir,
		&out_dir,
		&broadcast.project_name,
		"cmin",
		&[
			("CFLAGS".to_string(), "-DFUZZING_BUILD_MODE_UNSAFE_FOR_PRODUCTION".to_string()),
			("CXXFLAGS".to_string(), "-DFUZZING_BUILD_MODE_UNSAFE_FOR_PRODUCTION".to_string()),
		],
		config.build_timeout,
		config.build_retries,
	)
	.await?;
	Ok(())
}

/// Copies a harness's compiled binary to the content-addressed artifact tree
/// and records its path under the per-(harness, sanitizer, engine) KV key.
/// Returns the storage path the fuzzlet should reference.
async fn publish_artifact(
	kv: &dyn KvClient,
	config: &BuildConfig,
	task_id: &str,
	sanitizer: &str,
	harness: &HarnessArtifact,
) -> Result<PathBuf> {
	let dest = config
		.storage_root
		.join("artifacts")
		.join(task_id)
		.join(&harness.name)
		.join(sanitizer)
		.join("afl")
		.join(&harness.name);
	if let Some(parent) = dest.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}
	tokio::fs::copy(&harness.binary_path, &dest).await?;
	kv.set(
		&fuzzctl_kv::keys::artifact_after(task_id, &harness.name, sanitizer, "afl"),
		&dest.display().to_string(),
		None,
	)
	.await?;
	Ok(dest)
}

/// Copies a harness's resolved dictionary under the content tree and
/// registers its path in the per-harness KV set.
async fn publish_dictionary(
	kv: &dyn KvClient,
	config: &BuildConfig,
	task_id: &str,
	harness: &HarnessArtifact,
) -> Result<()> {
	let Some(dict_path) = &harness.dict_path else {
		return Ok(());
	};
	let file_name = dict_path.file_name().and_then(|n| n.to_str()).unwrap_or("default.dict");
	let dest = config
		.storage_root
		.join("artifacts")
		.join(task_id)
		.join(&harness.name)
		.join("dict")
		.join("default")
		.join(file_name);
	if let Some(parent) = dest.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}
	tokio::fs::copy(dict_path, &dest).await?;
	kv.sadd(
		&fuzzctl_kv::keys::harness_dicts(task_id, &harness.name),
		&dest.display().to_string(),
	)
	.await?;
	Ok(())
}

/// Unzips a harness's seed corpus zip, when present, into a scratch directory
/// under the task's seed tree, emitting one [`SeedMessage`] telemetry event
/// per inner file so forwarding can be observed without a broker round-trip.
fn extract_seed_corpus(config: &BuildConfig, task_id: &str, harness: &HarnessArtifact) -> Result<()> {
	let Some(zip_path) = &harness.seed_corpus_zip else {
		return Ok(());
	};
	let dest = config.storage_root.join(task_id).join("seeds").join(&harness.name);
	fuzzctl_objectstore::extract_archive(zip_path, &dest)?;

	for seed_path in list_files_recursive(&dest)? {
		let message = SeedMessage {
			task_id: task_id.to_string(),
			harness: harness.name.clone(),
			seed_path: seed_path.display().to_string(),
		};
		tracing::info!(task_id = %message.task_id, harness = %message.harness, seed_path = %message.seed_path, "seed discovered");
	}
	Ok(())
}

fn list_files_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	let mut pending = vec![dir.to_path_buf()];
	while let Some(dir) = pending.pop() {
		for entry in std::fs::read_dir(&dir)? {
			let entry = entry?;
			let path = entry.path();
			if path.is_dir() {
				pending.push(path);
			} else {
				files.push(path);
			}
		}
	}
	Ok(files)
}

fn fuzzlet_for(broadcast: &TaskBroadcast, sanitizer: &str, artifact_path: &Path, harness: &HarnessArtifact) -> Fuzzlet {
	Fuzzlet {
		task_id: broadcast.task_id.clone(),
		harness: harness.name.clone(),
		sanitizer: sanitizer.to_string(),
		fuzz_engine: FuzzEngine::Afl,
		artifact_path: artifact_path.display().to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fuzzctl_broker::FakeBroker;
	use fuzzctl_core::TaskType;
	use fuzzctl_kv::FakeKv;
	use fuzzctl_procsup::FakeProcessSupervisor;

	fn sample_broadcast(repo_dir: &Path, tooling_dir: &Path) -> TaskBroadcast {
		TaskBroadcast {
			task_id: "t1".into(),
			task_type: TaskType::Full,
			project_name: "libpng".into(),
			focus: "libpng".into(),
			repo: vec![repo_dir.display().to_string()],
			fuzzing_tooling: tooling_dir.display().to_string(),
			diff: None,
		}
	}

	fn write_project_yaml(tooling_dir: &Path, project_name: &str, contents: &str) {
		let dir = tooling_dir.join("projects").join(project_name);
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("project.yaml"), contents).unwrap();
	}

	#[cfg(unix)]
	fn write_fake_harness(out_dir: &Path, name: &str) {
		use std::os::unix::fs::PermissionsExt;
		std::fs::create_dir_all(out_dir).unwrap();
		let path = out_dir.join(name);
		std::fs::write(&path, b"#!/bin/sh\nLLVMFuzzerTestOneInput\n").unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
	}

	#[tokio::test]
	async fn builds_every_configured_sanitizer_and_publishes_a_fuzzlet_per_harness() {
		let storage = tempfile::tempdir().unwrap();
		let repo_dir = storage.path().join("repo");
		let tooling_dir = storage.path().join("tooling");
		std::fs::create_dir_all(&repo_dir).unwrap();
		std::fs::create_dir_all(&tooling_dir).unwrap();
		write_project_yaml(&tooling_dir, "libpng", "language: c++\nsanitizers: [address, memory]\n");

		// The fake supervisor doesn't actually run `docker`, so pre-seed the
		// expected output directories with a harness binary for each sanitizer.
		for sanitizer in ["address", "memory"] {
			write_fake_harness(
				&storage
					.path()
					.join("t1")
					.join("isolated")
					.join(sanitizer)
					.join("build")
					.join("out")
					.join("libpng"),
				"fuzz_parse",
			);
		}

		let supervisor = FakeProcessSupervisor::new(0);
		let broker = FakeBroker::new();
		let kv = FakeKv::new();
		let config = BuildConfig {
			storage_root: storage.path().to_path_buf(),
			build_timeout: Duration::from_secs(5),
			build_retries: 1,
		};

		let fuzzlets = build_task(
			&supervisor,
			broker.as_ref(),
			&kv,
			&config,
			&sample_broadcast(&repo_dir, &tooling_dir),
		)
		.await
		.unwrap();

		assert_eq!(fuzzlets.len(), 2);
		assert!(fuzzlets.iter().all(|f| f.harness == "fuzz_parse"));
	}

	#[tokio::test]
	async fn jvm_projects_skip_compile_and_publish_nothing() {
		let storage = tempfile::tempdir().unwrap();
		let repo_dir = storage.path().join("repo");
		let tooling_dir = storage.path().join("tooling");
		std::fs::create_dir_all(&repo_dir).unwrap();
		std::fs::create_dir_all(&tooling_dir).unwrap();
		write_project_yaml(&tooling_dir, "libpng", "language: jvm\n");

		let supervisor = FakeProcessSupervisor::new(0);
		let broker = FakeBroker::new();
		let kv = FakeKv::new();
		let config = BuildConfig {
			storage_root: storage.path().to_path_buf(),
			build_timeout: Duration::from_secs(5),
			build_retries: 1,
		};

		let fuzzlets = build_task(
			&supervisor,
			broker.as_ref(),
			&kv,
			&config,
			&sample_broadcast(&repo_dir, &tooling_dir),
		)
		.await
		.unwrap();

		assert!(fuzzlets.is_empty());
		assert_eq!(supervisor.spawned.lock().await.len(), 0);
	}

	#[test]
	fn list_files_recursive_finds_nested_files_only() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
		std::fs::write(dir.path().join("a/b/seed1"), b"x").unwrap();
		std::fs::write(dir.path().join("seed2"), b"y").unwrap();

		let mut found = list_files_recursive(dir.path()).unwrap();
		found.sort();
		assert_eq!(found.len(), 2);
	}
}
