//! Typed key families, literal names matching the colon-separated
//! scheme the KV store is documented against. The KV store is a cache/
//! coordination layer, never the system of record — the repository is — so
//! every key here is either a TTL'd cache entry or a dedup set that can be
//! rebuilt from scratch without losing correctness, only efficiency.

/// Most recent dispatcher status for a task.
pub fn task_status(task_id: &str) -> String {
	format!("global:task_status:{task_id}")
}

/// Copy of a task's opaque metadata JSON, for workers that never touch the repository directly.
pub fn task_metadata(task_id: &str) -> String {
	format!("global:task_metadata:{task_id}")
}

/// Serialized [`fuzzctl_telemetry::TraceContext`] exported at dispatch time,
/// so a worker picking up the task later continues the same trace.
pub fn trace_context(task_id: &str) -> String {
	format!("global:trace_context:{task_id}")
}

/// Build-phase tracing context, re-exported by the builder so the runner can
/// continue the same trace once it picks up the fuzzlet.
pub fn artifacts_trace_context(task_id: &str) -> String {
	format!("artifacts:trace_context:{task_id}")
}

/// Set of harness names discovered for a task.
pub fn harnesses(task_id: &str) -> String {
	format!("artifacts:{task_id}:harnesses")
}

/// Path to the final built artifact for one harness/sanitizer/engine triple.
pub fn artifact_after(task_id: &str, harness: &str, sanitizer: &str, engine: &str) -> String {
	format!("artifacts:{task_id}:{harness}:{sanitizer}:{engine}:after")
}

/// Set of published dictionary storage paths for one task's harness.
pub fn harness_dicts(task_id: &str, harness: &str) -> String {
	format!("artifacts:{task_id}:{harness}:dicts")
}

/// "true" once seed minimization has finished for a task. The literal name
/// (`cmin:failed`) is kept for legacy interop; it signals completion, not
/// failure — see the design note on this key.
pub fn cmin_failed(task_id: &str) -> String {
	format!("artifacts:{task_id}:cmin:failed")
}

/// Highest bug id already forwarded to the `triage` exchange.
pub const MAX_BUG_ID: &str = "scheduler:max_bug_id";

/// Set of SARIF record ids already forwarded.
pub const FORWARDED_SARIFS: &str = "scheduler:forwarded_sarifs";

/// Retry counter for a task that has failed and been redispatched.
pub fn task_failure_count(task_id: &str) -> String {
	format!("scheduler:task_failure_count:{task_id}")
}

/// Set of tasks whose dispatch has already been broadcast, so a scheduler
/// restart doesn't redispatch a task still within its deadline.
pub const BROADCASTED_TASKS: &str = "scheduler:broadcasted_tasks";

/// Set of crash content-hashes already forwarded to `triage` for a task, so
/// the crash manager does not re-publish the same bug twice after a restart
/// re-scans an existing crash directory.
pub fn forwarded_crash_hashes(task_id: &str) -> String {
	format!("scheduler:forwarded_crash_hashes:{task_id}")
}

/// Set of all active fuzzlets, each member the JSON encoding of a [`fuzzctl_core::Fuzzlet`].
pub const FUZZLETS: &str = "fuzzlets";

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_are_namespaced_and_stable() {
		assert_eq!(trace_context("t1"), "global:trace_context:t1");
		assert_eq!(cmin_failed("t1"), "artifacts:t1:cmin:failed");
		assert_eq!(harness_dicts("t1", "h1"), "artifacts:t1:h1:dicts");
		assert_eq!(forwarded_crash_hashes("t1"), "scheduler:forwarded_crash_hashes:t1");
		assert_eq!(artifact_after("t1", "h1", "address", "afl"), "artifacts:t1:h1:address:afl:after");
	}
}
