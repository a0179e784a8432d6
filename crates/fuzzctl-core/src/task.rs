//! The [`Task`] record and its state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of task: a full build from scratch, or a delta applied over a focus tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
	Full,
	Delta,
}

impl TaskType {
	/// The source types required for a task of this kind.
	pub fn required_sources(self) -> &'static [SourceType] {
		match self {
			TaskType::Full => &[SourceType::Repo, SourceType::FuzzTooling],
			TaskType::Delta => &[SourceType::Repo, SourceType::FuzzTooling, SourceType::Diff],
		}
	}
}

/// Kind of downloadable artifact attached to a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Repo,
	FuzzTooling,
	Diff,
}

/// Lifecycle status of a task.
///
/// Transitions form a DAG: `Pending -> Processing -> {Succeeded, Failed, Errored, Canceled}`.
/// A terminal state (anything but `Pending`/`Processing`/`Waiting`) is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
	Pending,
	Waiting,
	Processing,
	Succeeded,
	Failed,
	Errored,
	Canceled,
}

impl TaskStatus {
	/// Whether this status is final; once reached, no further transition is valid.
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Errored | TaskStatus::Canceled
		)
	}

	/// Whether transitioning from `self` to `next` is allowed by the status DAG.
	pub fn can_transition_to(self, next: TaskStatus) -> bool {
		if self.is_terminal() {
			return false;
		}
		match self {
			TaskStatus::Pending => matches!(next, TaskStatus::Processing | TaskStatus::Waiting | TaskStatus::Errored | TaskStatus::Succeeded | TaskStatus::Canceled),
			TaskStatus::Waiting => matches!(next, TaskStatus::Processing | TaskStatus::Errored | TaskStatus::Canceled),
			TaskStatus::Processing => matches!(
				next,
				TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Errored | TaskStatus::Canceled
			),
			TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Errored | TaskStatus::Canceled => false,
		}
	}
}

/// A unit of fuzzing work submitted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
	pub task_id: String,
	pub task_type: TaskType,
	pub project_name: String,
	/// Repository subdirectory that is the actual fuzz target root.
	pub focus: String,
	pub deadline: chrono::DateTime<chrono::Utc>,
	pub status: TaskStatus,
	/// Opaque JSON carried alongside the task for downstream consumers.
	pub metadata: Value,
	/// Identifier of the original inbound broker message, for audit correlation.
	pub message_id: String,
	pub user_id: String,
}

/// One downloadable artifact attached to a [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
	pub task_id: String,
	pub source_type: SourceType,
	pub url: String,
	/// Hex-encoded SHA-256 the downloaded bytes must match.
	pub sha256: String,
	/// Filled in once the download has been verified.
	pub local_path: Option<String>,
}

impl Source {
	/// Validates that `sources` satisfies the source-set rule for `task_type`.
	pub fn validate_set(task_type: TaskType, sources: &[Source]) -> bool {
		let present: Vec<SourceType> = sources.iter().map(|s| s.source_type).collect();
		task_type
			.required_sources()
			.iter()
			.all(|required| present.contains(required))
	}
}
