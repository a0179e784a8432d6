//! The four periodic routines driven by the control loop.

use chrono::Utc;
use fuzzctl_core::{triage_priority, SarifMessage, SourceType, TaskBroadcast, TaskStatus, TaskType, TriageMessage};
use fuzzctl_telemetry::TraceContext;

use crate::state::SchedulerState;

const DISPATCH_BATCH: i64 = 16;

/// Broadcast priority by task kind: a delta task exists to validate a single
/// diff against a deadline and is worth scheduling ahead of a full rebuild.
fn dispatch_priority(task_type: TaskType) -> u8 {
	match task_type {
		TaskType::Delta => 6,
		TaskType::Full => 3,
	}
}

/// Downloads a pending task's sources, publishes its `task_broadcast`, and
/// advances it to `Processing`.
pub async fn task_dispatch_tick(state: &SchedulerState) {
	let tasks = match state.repo.get_pending_tasks(DISPATCH_BATCH).await {
		Ok(tasks) => tasks,
		Err(error) => {
			tracing::error!(%error, "failed to list pending tasks");
			return;
		}
	};

	let now = Utc::now();
	for task in tasks {
		let span = tracing::info_span!("dispatch_task", task_id = %task.task_id);
		let _guard = span.enter();

		if task.deadline <= now {
			tracing::info!("task missed its deadline before dispatch, marking succeeded");
			mark_status(state, &task.task_id, TaskStatus::Succeeded).await;
			continue;
		}

		let failure_count = read_failure_count(state, &task.task_id).await;
		if failure_count >= state.task_failure_retries {
			tracing::warn!(failure_count, "task exceeded its failure cap, marking errored");
			mark_status(state, &task.task_id, TaskStatus::Errored).await;
			state.kv.delete(&fuzzctl_kv::keys::task_failure_count(&task.task_id)).await.ok();
			continue;
		}

		let sources = match state.repo.get_sources(&task.task_id).await {
			Ok(sources) => sources,
			Err(error) => {
				tracing::error!(%error, "failed to load sources");
				continue;
			}
		};

		if !fuzzctl_core::Source::validate_set(task.task_type, &sources) {
			tracing::warn!("task has an incomplete source set, marking errored");
			mark_status(state, &task.task_id, TaskStatus::Errored).await;
			continue;
		}

		let task_dir = state.storage_root.join(&task.task_id);
		let mut repo_path = None;
		let mut tooling_path = None;
		let mut diff_path = None;

		let mut failed = false;
		for source in &sources {
			let dest_archive = task_dir.join(format!("{:?}.download", source.source_type));
			let extract_dir = task_dir.join(match source.source_type {
				SourceType::Repo => "repo",
				SourceType::FuzzTooling => "fuzz-tooling",
				SourceType::Diff => "diff",
			});

			if let Err(error) = fuzzctl_objectstore::download_verified(
				&state.http_client,
				&source.url,
				&dest_archive,
				&source.sha256,
				state.download_retries,
			)
			.await
			{
				tracing::error!(%error, source_type = ?source.source_type, "download failed");
				failed = true;
				break;
			}

			if let Err(error) = fuzzctl_objectstore::extract_archive(&dest_archive, &extract_dir) {
				tracing::error!(%error, source_type = ?source.source_type, "extraction failed");
				failed = true;
				break;
			}

			let extract_dir_str = extract_dir.display().to_string();
			match source.source_type {
				SourceType::Repo => repo_path = Some(extract_dir_str.clone()),
				SourceType::FuzzTooling => tooling_path = Some(extract_dir_str.clone()),
				SourceType::Diff => diff_path = Some(extract_dir_str.clone()),
			}

			if let Err(error) = state
				.repo
				.update_source_path(&task.task_id, source.source_type, &extract_dir_str)
				.await
			{
				tracing::error!(%error, "failed to record resolved source path");
			}
		}

		if failed {
			let attempt = failure_count + 1;
			tracing::warn!(attempt, "download/extraction failed, will retry on a later tick");
			state
				.kv
				.set(&fuzzctl_kv::keys::task_failure_count(&task.task_id), &attempt.to_string(), None)
				.await
				.ok();
			continue;
		}

		let Some(repo_path) = repo_path else {
			tracing::error!("repo source missing after download, should have failed validation");
			mark_status(state, &task.task_id, TaskStatus::Errored).await;
			continue;
		};
		let Some(tooling_path) = tooling_path else {
			tracing::error!("fuzz tooling source missing after download, should have failed validation");
			mark_status(state, &task.task_id, TaskStatus::Errored).await;
			continue;
		};

		state
			.kv
			.set(
				&fuzzctl_kv::keys::task_metadata(&task.task_id),
				&task.metadata.to_string(),
				None,
			)
			.await
			.ok();

		let broadcast = TaskBroadcast {
			task_id: task.task_id.clone(),
			task_type: task.task_type,
			project_name: task.project_name.clone(),
			focus: task.focus.clone(),
			repo: vec![repo_path],
			fuzzing_tooling: tooling_path,
			diff: diff_path,
		};

		if let Err(error) = state
			.broker
			.publish_task_broadcast(&broadcast, dispatch_priority(task.task_type))
			.await
		{
			tracing::error!(%error, "failed to publish task_broadcast");
			continue;
		}

		mark_status(state, &task.task_id, TaskStatus::Processing).await;
		write_status_kv(state, &task.task_id, TaskStatus::Processing).await;

		let trace_ctx = TraceContext::new();
		state
			.kv
			.set(&fuzzctl_kv::keys::trace_context(&task.task_id), &trace_ctx.export(), None)
			.await
			.ok();

		state.kv.sadd(fuzzctl_kv::keys::BROADCASTED_TASKS, &task.task_id).await.ok();
	}

	state.dispatch_ready.store(true, std::sync::atomic::Ordering::Relaxed);
}

/// Probes the broker management API once; sets `management_ready` on success
/// so `/healthz` can tell a genuinely unreachable management API from one
/// that just hasn't been checked yet.
pub async fn management_probe_tick(state: &SchedulerState) {
	match state.management.queue_depth(fuzzctl_broker::EXCHANGE_TASK_BROADCAST).await {
		Ok(_) => {
			state.management_ready.store(true, std::sync::atomic::Ordering::Relaxed);
		}
		Err(error) => {
			tracing::warn!(%error, "broker management api probe failed");
		}
	}
}

async fn read_failure_count(state: &SchedulerState, task_id: &str) -> u32 {
	state
		.kv
		.get(&fuzzctl_kv::keys::task_failure_count(task_id))
		.await
		.ok()
		.flatten()
		.and_then(|raw| raw.parse().ok())
		.unwrap_or(0)
}

async fn write_status_kv(state: &SchedulerState, task_id: &str, status: TaskStatus) {
	let raw = match status {
		TaskStatus::Pending => "pending",
		TaskStatus::Waiting => "waiting",
		TaskStatus::Processing => "processing",
		TaskStatus::Succeeded => "succeeded",
		TaskStatus::Failed => "failed",
		TaskStatus::Errored => "errored",
		TaskStatus::Canceled => "canceled",
	};
	state.kv.set(&fuzzctl_kv::keys::task_status(task_id), raw, None).await.ok();
}

/// Per §4.6.2: for every task broadcast as dispatched, either settle a
/// cancellation or fail it out once its deadline passes, and drop it from the
/// broadcast set either way so it is never considered twice.
pub async fn deadline_tick(state: &SchedulerState) {
	let task_ids = match state.kv.smembers(fuzzctl_kv::keys::BROADCASTED_TASKS).await {
		Ok(ids) => ids,
		Err(error) => {
			tracing::error!(%error, "failed to list broadcasted tasks");
			return;
		}
	};

	let now = Utc::now();
	for task_id in task_ids {
		let task = match state.repo.get_task_by_id(&task_id).await {
			Ok(Some(task)) => task,
			Ok(None) => {
				tracing::warn!(task_id, "broadcasted task not found in repository, dropping from set");
				state.kv.srem(fuzzctl_kv::keys::BROADCASTED_TASKS, &task_id).await.ok();
				continue;
			}
			Err(error) => {
				tracing::error!(%error, task_id, "failed to load task for deadline check");
				continue;
			}
		};

		if task.status == TaskStatus::Canceled {
			write_status_kv(state, &task_id, TaskStatus::Canceled).await;
			state.kv.srem(fuzzctl_kv::keys::BROADCASTED_TASKS, &task_id).await.ok();
			continue;
		}

		if task.deadline <= now {
			tracing::info!(task_id, "task missed its deadline, marking succeeded");
			write_status_kv(state, &task_id, TaskStatus::Canceled).await;
			mark_status(state, &task_id, TaskStatus::Succeeded).await;
			state.kv.srem(fuzzctl_kv::keys::BROADCASTED_TASKS, &task_id).await.ok();
		}
	}
}

/// Forwards every bug inserted since the last tick to the `triage` exchange.
pub async fn bug_forward_tick(state: &SchedulerState) {
	let last_seen: i64 = state
		.kv
		.get(fuzzctl_kv::keys::MAX_BUG_ID)
		.await
		.ok()
		.flatten()
		.and_then(|v| v.parse().ok())
		.unwrap_or(0);

	let bugs = match state.repo.get_new_bugs(last_seen).await {
		Ok(bugs) => bugs,
		Err(error) => {
			tracing::error!(%error, "failed to list new bugs");
			return;
		}
	};
	if bugs.is_empty() {
		return;
	}

	let mut max_id = last_seen;
	for bug in &bugs {
		max_id = max_id.max(bug.id);

		let Some(task) = fetch_task_broadcast(state, &bug.task_id).await else {
			continue;
		};
		let message = TriageMessage {
			task,
			bug_id: bug.id,
			poc_path: bug.poc.clone(),
			harness_name: bug.harness_name.clone(),
			sanitizer: bug.sanitizer.clone(),
		};
		let priority = triage_priority(&bug.sanitizer);
		if let Err(error) = state.broker.publish_triage(&message, priority).await {
			tracing::error!(%error, bug_id = bug.id, "failed to publish triage message");
		}
	}

	state
		.kv
		.set(fuzzctl_kv::keys::MAX_BUG_ID, &max_id.to_string(), None)
		.await
		.ok();
}

/// Forwards every SARIF record not yet recorded as forwarded.
pub async fn sarif_forward_tick(state: &SchedulerState) {
	// A SARIF record's id is an opaque string, not a monotonic counter, so
	// forwarding state is a set membership check rather than a high-water mark.
	let records = match state.repo.get_new_sarif(&[]).await {
		Ok(records) => records,
		Err(error) => {
			tracing::error!(%error, "failed to list sarif records");
			return;
		}
	};

	for record in records {
		match state.kv.sadd(fuzzctl_kv::keys::FORWARDED_SARIFS, &record.sarif_id).await {
			Ok(true) => {}
			Ok(false) => continue,
			Err(error) => {
				tracing::error!(%error, "failed to check sarif forward dedup set");
				continue;
			}
		}

		let Some(task) = fetch_task_broadcast(state, &record.task_id).await else {
			continue;
		};
		let message = SarifMessage {
			task,
			sarif_id: record.sarif_id.clone(),
			sarif_report: record.sarif.clone(),
		};
		if let Err(error) = state.broker.publish_sarif(&message).await {
			tracing::error!(%error, sarif_id = %record.sarif_id, "failed to publish sarif message");
		}
	}
}

async fn fetch_task_broadcast(state: &SchedulerState, task_id: &str) -> Option<TaskBroadcast> {
	let task = match state.repo.get_task_by_id(task_id).await {
		Ok(Some(task)) => task,
		Ok(None) => {
			tracing::warn!(task_id, "task not found while building forward message");
			return None;
		}
		Err(error) => {
			tracing::error!(%error, task_id, "failed to load task");
			return None;
		}
	};
	let sources = match state.repo.get_sources(task_id).await {
		Ok(sources) => sources,
		Err(error) => {
			tracing::error!(%error, task_id, "failed to load sources");
			return None;
		}
	};

	Some(sources_to_broadcast(&task, &sources))
}

/// Pure assembly of a [`TaskBroadcast`] from a task and its resolved sources,
/// split out from [`fetch_task_broadcast`] so it can be unit-tested without a
/// repository.
fn sources_to_broadcast(task: &fuzzctl_core::Task, sources: &[fuzzctl_core::Source]) -> TaskBroadcast {
	let find = |source_type: SourceType| {
		sources
			.iter()
			.find(|s| s.source_type == source_type)
			.and_then(|s| s.local_path.clone())
	};

	TaskBroadcast {
		task_id: task.task_id.clone(),
		task_type: task.task_type,
		project_name: task.project_name.clone(),
		focus: task.focus.clone(),
		repo: find(SourceType::Repo).into_iter().collect(),
		fuzzing_tooling: find(SourceType::FuzzTooling).unwrap_or_default(),
		diff: find(SourceType::Diff),
	}
}

async fn mark_status(state: &SchedulerState, task_id: &str, status: TaskStatus) {
	if let Err(error) = state.repo.update_task_status(task_id, status).await {
		tracing::error!(%error, task_id, ?status, "failed to update task status");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fuzzctl_core::{Source, Task};
	use serde_json::json;

	fn sample_task() -> Task {
		Task {
			task_id: "t1".into(),
			task_type: TaskType::Delta,
			project_name: "libpng".into(),
			focus: "libpng".into(),
			deadline: Utc::now(),
			status: TaskStatus::Processing,
			metadata: json!({}),
			message_id: "m1".into(),
			user_id: "u1".into(),
		}
	}

	#[test]
	fn delta_tasks_outrank_full_tasks_for_dispatch() {
		assert!(dispatch_priority(TaskType::Delta) > dispatch_priority(TaskType::Full));
	}

	#[test]
	fn sources_to_broadcast_omits_diff_when_absent() {
		let sources = vec![
			Source {
				task_id: "t1".into(),
				source_type: SourceType::Repo,
				url: "https://h/r.tar.gz".into(),
				sha256: "a".repeat(64),
				local_path: Some("/storage/t1/repo".into()),
			},
			Source {
				task_id: "t1".into(),
				source_type: SourceType::FuzzTooling,
				url: "https://h/f.tar.gz".into(),
				sha256: "b".repeat(64),
				local_path: Some("/storage/t1/fuzz-tooling".into()),
			},
		];
		let broadcast = sources_to_broadcast(&sample_task(), &sources);
		assert_eq!(broadcast.repo, vec!["/storage/t1/repo".to_string()]);
		assert_eq!(broadcast.fuzzing_tooling, "/storage/t1/fuzz-tooling");
		assert_eq!(broadcast.diff, None);
	}
}
