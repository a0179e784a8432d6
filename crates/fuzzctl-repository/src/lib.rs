//! Task/source/bug/patch/SARIF persistence.
//!
//! One pool, one set of queries, two backends: SQLite for dev/test, a
//! Postgres-compatible wire for production, both through `sqlx`'s `Any`
//! driver so the query text never branches on which one is live.

mod error;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fuzzctl_core::{Bug, BugProfile, Patch, PatchStatus, SarifRecord, Source, SourceType, Task, TaskStatus, TaskType};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};

pub use error::{RepositoryError, Result};

/// Persistence surface shared by the scheduler, builder, and runner.
#[async_trait]
pub trait TaskRepository: Send + Sync {
	async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Task>>;
	async fn get_pending_tasks(&self, limit: i64) -> Result<Vec<Task>>;
	async fn get_processing_tasks(&self) -> Result<Vec<Task>>;
	/// Count of tasks with status in `{processing, waiting}`, for the scheduler's `/status` route.
	async fn count_active_tasks(&self) -> Result<i64>;
	async fn update_task_status(&self, task_id: &str, next: TaskStatus) -> Result<()>;

	async fn get_sources(&self, task_id: &str) -> Result<Vec<Source>>;
	async fn update_source_path(&self, task_id: &str, source_type: SourceType, local_path: &str) -> Result<()>;

	async fn get_max_bug_id(&self) -> Result<i64>;
	async fn get_new_bugs(&self, since_id: i64) -> Result<Vec<Bug>>;
	async fn insert_bug(&self, bug: &Bug) -> Result<i64>;
	async fn get_bug_profile(&self, bug_id: i64) -> Result<Option<BugProfile>>;

	async fn get_new_sarif(&self, known_ids: &[String]) -> Result<Vec<SarifRecord>>;
	async fn insert_sarif(&self, record: &SarifRecord) -> Result<()>;

	async fn insert_patch(&self, patch: &Patch) -> Result<()>;
	async fn get_patches_for_task(&self, task_id: &str) -> Result<Vec<Patch>>;
}

pub struct SqlRepository {
	pool: AnyPool,
}

impl SqlRepository {
	/// Connects to `database_url` and runs the idempotent startup schema.
	pub async fn connect(database_url: &str) -> Result<Self> {
		sqlx::any::install_default_drivers();
		let pool = AnyPoolOptions::new().max_connections(16).connect(database_url).await?;
		for statement in schema::STATEMENTS {
			sqlx::query(statement).execute(&pool).await?;
		}
		Ok(SqlRepository { pool })
	}

	/// The underlying pool, for callers (tests, the one-off task-ingestion
	/// path this workspace doesn't otherwise expose through the trait) that
	/// need to run a query this trait doesn't cover.
	pub fn pool(&self) -> &AnyPool {
		&self.pool
	}

	fn parse_timestamp(entity: &str, raw: &str) -> Result<DateTime<Utc>> {
		DateTime::parse_from_rfc3339(raw)
			.map(|dt| dt.with_timezone(&Utc))
			.map_err(|error| RepositoryError::MalformedRow {
				entity: entity.to_string(),
				reason: error.to_string(),
			})
	}

	fn task_type_from_str(entity: &str, raw: &str) -> Result<TaskType> {
		match raw {
			"full" => Ok(TaskType::Full),
			"delta" => Ok(TaskType::Delta),
			other => Err(RepositoryError::MalformedRow {
				entity: entity.to_string(),
				reason: format!("unknown task_type {other:?}"),
			}),
		}
	}

	fn task_status_from_str(entity: &str, raw: &str) -> Result<TaskStatus> {
		Ok(match raw {
			"pending" => TaskStatus::Pending,
			"waiting" => TaskStatus::Waiting,
			"processing" => TaskStatus::Processing,
			"succeeded" => TaskStatus::Succeeded,
			"failed" => TaskStatus::Failed,
			"errored" => TaskStatus::Errored,
			"canceled" => TaskStatus::Canceled,
			other => {
				return Err(RepositoryError::MalformedRow {
					entity: entity.to_string(),
					reason: format!("unknown status {other:?}"),
				});
			}
		})
	}

	fn source_type_from_str(entity: &str, raw: &str) -> Result<SourceType> {
		Ok(match raw {
			"repo" => SourceType::Repo,
			"fuzz_tooling" => SourceType::FuzzTooling,
			"diff" => SourceType::Diff,
			other => {
				return Err(RepositoryError::MalformedRow {
					entity: entity.to_string(),
					reason: format!("unknown source_type {other:?}"),
				});
			}
		})
	}

	fn task_status_as_str(status: TaskStatus) -> &'static str {
		match status {
			TaskStatus::Pending => "pending",
			TaskStatus::Waiting => "waiting",
			TaskStatus::Processing => "processing",
			TaskStatus::Succeeded => "succeeded",
			TaskStatus::Failed => "failed",
			TaskStatus::Errored => "errored",
			TaskStatus::Canceled => "canceled",
		}
	}

	fn row_to_task(&self, row: &sqlx::any::AnyRow) -> Result<Task> {
		let task_type_raw: String = row.try_get("task_type")?;
		let status_raw: String = row.try_get("status")?;
		let deadline_raw: String = row.try_get("deadline")?;
		let metadata_raw: String = row.try_get("metadata")?;
		Ok(Task {
			task_id: row.try_get("task_id")?,
			task_type: Self::task_type_from_str("tasks", &task_type_raw)?,
			project_name: row.try_get("project_name")?,
			focus: row.try_get("focus")?,
			deadline: Self::parse_timestamp("tasks", &deadline_raw)?,
			status: Self::task_status_from_str("tasks", &status_raw)?,
			metadata: serde_json::from_str(&metadata_raw).map_err(|error| RepositoryError::MalformedRow {
				entity: "tasks".to_string(),
				reason: error.to_string(),
			})?,
			message_id: row.try_get("message_id")?,
			user_id: row.try_get("user_id")?,
		})
	}
}

#[async_trait]
impl TaskRepository for SqlRepository {
	async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Task>> {
		let row = sqlx::query("SELECT * FROM tasks WHERE task_id = ?")
			.bind(task_id)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(|row| self.row_to_task(row)).transpose()
	}

	async fn get_pending_tasks(&self, limit: i64) -> Result<Vec<Task>> {
		let rows = sqlx::query("SELECT * FROM tasks WHERE status = 'pending' ORDER BY deadline ASC LIMIT ?")
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(|row| self.row_to_task(row)).collect()
	}

	async fn get_processing_tasks(&self) -> Result<Vec<Task>> {
		let rows = sqlx::query("SELECT * FROM tasks WHERE status = 'processing'")
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(|row| self.row_to_task(row)).collect()
	}

	async fn count_active_tasks(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM tasks WHERE status IN ('processing', 'waiting')")
			.fetch_one(&self.pool)
			.await?;
		Ok(row.try_get::<i64, _>("n")?)
	}

	async fn update_task_status(&self, task_id: &str, next: TaskStatus) -> Result<()> {
		let Some(task) = self.get_task_by_id(task_id).await? else {
			return Ok(());
		};
		if task.status == next {
			return Ok(());
		}
		if !task.status.can_transition_to(next) {
			return Err(RepositoryError::InvalidTransition {
				task_id: task_id.to_string(),
				from: task.status,
				to: next,
			});
		}
		sqlx::query("UPDATE tasks SET status = ? WHERE task_id = ?")
			.bind(Self::task_status_as_str(next))
			.bind(task_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	async fn get_sources(&self, task_id: &str) -> Result<Vec<Source>> {
		let rows = sqlx::query("SELECT * FROM sources WHERE task_id = ?")
			.bind(task_id)
			.fetch_all(&self.pool)
			.await?;
		rows.iter()
			.map(|row| {
				let source_type_raw: String = row.try_get("source_type")?;
				Ok(Source {
					task_id: row.try_get("task_id")?,
					source_type: Self::source_type_from_str("sources", &source_type_raw)?,
					url: row.try_get("url")?,
					sha256: row.try_get("sha256")?,
					local_path: row.try_get("local_path")?,
				})
			})
			.collect()
	}

	async fn update_source_path(&self, task_id: &str, source_type: SourceType, local_path: &str) -> Result<()> {
		let source_type_str = match source_type {
			SourceType::Repo => "repo",
			SourceType::FuzzTooling => "fuzz_tooling",
			SourceType::Diff => "diff",
		};
		sqlx::query("UPDATE sources SET local_path = ? WHERE task_id = ? AND source_type = ?")
			.bind(local_path)
			.bind(task_id)
			.bind(source_type_str)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	async fn get_max_bug_id(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COALESCE(MAX(id), 0) AS max_id FROM bugs")
			.fetch_one(&self.pool)
			.await?;
		Ok(row.try_get::<i64, _>("max_id")?)
	}

	async fn get_new_bugs(&self, since_id: i64) -> Result<Vec<Bug>> {
		let rows = sqlx::query("SELECT * FROM bugs WHERE id > ? ORDER BY id ASC")
			.bind(since_id)
			.fetch_all(&self.pool)
			.await?;
		rows.iter()
			.map(|row| {
				let created_at_raw: String = row.try_get("created_at")?;
				Ok(Bug {
					id: row.try_get("id")?,
					task_id: row.try_get("task_id")?,
					harness_name: row.try_get("harness_name")?,
					sanitizer: row.try_get("sanitizer")?,
					architecture: row.try_get("architecture")?,
					poc: row.try_get("poc")?,
					created_at: Self::parse_timestamp("bugs", &created_at_raw)?,
				})
			})
			.collect()
	}

	async fn insert_bug(&self, bug: &Bug) -> Result<i64> {
		let row = sqlx::query(
			"INSERT INTO bugs (task_id, harness_name, sanitizer, architecture, poc, created_at) \
			 VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
		)
		.bind(&bug.task_id)
		.bind(&bug.harness_name)
		.bind(&bug.sanitizer)
		.bind(&bug.architecture)
		.bind(&bug.poc)
		.bind(bug.created_at.to_rfc3339())
		.fetch_one(&self.pool)
		.await?;
		Ok(row.try_get::<i64, _>("id")?)
	}

	async fn get_bug_profile(&self, bug_id: i64) -> Result<Option<BugProfile>> {
		let row = sqlx::query("SELECT * FROM bug_profiles WHERE bug_id = ?")
			.bind(bug_id)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|row| {
			Ok(BugProfile {
				bug_id: row.try_get("bug_id")?,
				summary: row.try_get("summary")?,
				cwe: row.try_get("cwe")?,
			})
		})
		.transpose()
	}

	async fn get_new_sarif(&self, known_ids: &[String]) -> Result<Vec<SarifRecord>> {
		let rows = sqlx::query("SELECT * FROM sarif_records").fetch_all(&self.pool).await?;
		rows.iter()
			.filter(|row| {
				row.try_get::<String, _>("sarif_id")
					.map(|id| !known_ids.contains(&id))
					.unwrap_or(false)
			})
			.map(|row| {
				let sarif_raw: String = row.try_get("sarif")?;
				let metadata_raw: String = row.try_get("metadata")?;
				Ok(SarifRecord {
					sarif_id: row.try_get("sarif_id")?,
					task_id: row.try_get("task_id")?,
					message_id: row.try_get("message_id")?,
					sarif: serde_json::from_str(&sarif_raw).map_err(|error| RepositoryError::MalformedRow {
						entity: "sarif_records".to_string(),
						reason: error.to_string(),
					})?,
					metadata: serde_json::from_str(&metadata_raw).map_err(|error| RepositoryError::MalformedRow {
						entity: "sarif_records".to_string(),
						reason: error.to_string(),
					})?,
				})
			})
			.collect()
	}

	async fn insert_sarif(&self, record: &SarifRecord) -> Result<()> {
		sqlx::query(
			"INSERT INTO sarif_records (sarif_id, task_id, message_id, sarif, metadata) VALUES (?, ?, ?, ?, ?)",
		)
		.bind(&record.sarif_id)
		.bind(&record.task_id)
		.bind(&record.message_id)
		.bind(record.sarif.to_string())
		.bind(record.metadata.to_string())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn insert_patch(&self, patch: &Patch) -> Result<()> {
		let status = match patch.status {
			PatchStatus::Proposed => "proposed",
			PatchStatus::Applied => "applied",
			PatchStatus::Rejected => "rejected",
		};
		sqlx::query(
			"INSERT INTO patches (patch_id, task_id, diff_path, status, created_at) VALUES (?, ?, ?, ?, ?)",
		)
		.bind(&patch.patch_id)
		.bind(&patch.task_id)
		.bind(&patch.diff_path)
		.bind(status)
		.bind(patch.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn get_patches_for_task(&self, task_id: &str) -> Result<Vec<Patch>> {
		let rows = sqlx::query("SELECT * FROM patches WHERE task_id = ?")
			.bind(task_id)
			.fetch_all(&self.pool)
			.await?;
		rows.iter()
			.map(|row| {
				let status_raw: String = row.try_get("status")?;
				let created_at_raw: String = row.try_get("created_at")?;
				Ok(Patch {
					patch_id: row.try_get("patch_id")?,
					task_id: row.try_get("task_id")?,
					diff_path: row.try_get("diff_path")?,
					status: match status_raw.as_str() {
						"proposed" => PatchStatus::Proposed,
						"applied" => PatchStatus::Applied,
						"rejected" => PatchStatus::Rejected,
						other => {
							return Err(RepositoryError::MalformedRow {
								entity: "patches".to_string(),
								reason: format!("unknown status {other:?}"),
							});
						}
					},
					created_at: Self::parse_timestamp("patches", &created_at_raw)?,
				})
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	async fn memory_repository() -> SqlRepository {
		SqlRepository::connect("sqlite::memory:").await.unwrap()
	}

	fn sample_task(task_id: &str) -> Task {
		Task {
			task_id: task_id.to_string(),
			task_type: TaskType::Full,
			project_name: "libpng".to_string(),
			focus: "libpng".to_string(),
			deadline: Utc::now(),
			status: TaskStatus::Pending,
			metadata: json!({}),
			message_id: "m1".to_string(),
			user_id: "u1".to_string(),
		}
	}

	async fn insert_task(repo: &SqlRepository, task: &Task) {
		sqlx::query(
			"INSERT INTO tasks (task_id, task_type, project_name, focus, deadline, status, metadata, message_id, user_id) \
			 VALUES (?, 'full', ?, ?, ?, 'pending', ?, ?, ?)",
		)
		.bind(&task.task_id)
		.bind(&task.project_name)
		.bind(&task.focus)
		.bind(task.deadline.to_rfc3339())
		.bind(task.metadata.to_string())
		.bind(&task.message_id)
		.bind(&task.user_id)
		.execute(&repo.pool)
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn get_task_by_id_round_trips() {
		let repo = memory_repository().await;
		let task = sample_task("t1");
		insert_task(&repo, &task).await;

		let fetched = repo.get_task_by_id("t1").await.unwrap().unwrap();
		assert_eq!(fetched.task_id, "t1");
		assert_eq!(fetched.status, TaskStatus::Pending);
	}

	#[tokio::test]
	async fn update_task_status_rejects_invalid_transition() {
		let repo = memory_repository().await;
		insert_task(&repo, &sample_task("t1")).await;
		repo.update_task_status("t1", TaskStatus::Succeeded).await.unwrap();

		let err = repo.update_task_status("t1", TaskStatus::Processing).await.unwrap_err();
		assert!(matches!(err, RepositoryError::InvalidTransition { .. }));
	}

	#[tokio::test]
	async fn max_bug_id_starts_at_zero_and_tracks_inserts() {
		let repo = memory_repository().await;
		assert_eq!(repo.get_max_bug_id().await.unwrap(), 0);

		let id = repo
			.insert_bug(&Bug {
				id: 0,
				task_id: "t1".to_string(),
				harness_name: "h".to_string(),
				sanitizer: "address".to_string(),
				architecture: "x86_64".to_string(),
				poc: "/crash/t1/h/address/abc".to_string(),
				created_at: Utc::now(),
			})
			.await
			.unwrap();

		assert_eq!(id, 1);
		assert_eq!(repo.get_max_bug_id().await.unwrap(), 1);
		assert_eq!(repo.get_new_bugs(0).await.unwrap().len(), 1);
		assert_eq!(repo.get_new_bugs(1).await.unwrap().len(), 0);
	}

	#[tokio::test]
	async fn count_active_tasks_includes_waiting_and_processing_only() {
		let repo = memory_repository().await;
		insert_task(&repo, &sample_task("t1")).await;
		insert_task(&repo, &sample_task("t2")).await;
		insert_task(&repo, &sample_task("t3")).await;

		repo.update_task_status("t1", TaskStatus::Processing).await.unwrap();
		repo.update_task_status("t2", TaskStatus::Waiting).await.unwrap();
		repo.update_task_status("t3", TaskStatus::Succeeded).await.unwrap();

		assert_eq!(repo.count_active_tasks().await.unwrap(), 2);
	}

	#[tokio::test]
	async fn insert_bug_ids_are_assigned_by_the_database_not_the_caller() {
		let repo = memory_repository().await;
		let sample = |task_id: &str| Bug {
			id: 0,
			task_id: task_id.to_string(),
			harness_name: "h".to_string(),
			sanitizer: "address".to_string(),
			architecture: "x86_64".to_string(),
			poc: format!("/crash/{task_id}/h/address/abc"),
			created_at: Utc::now(),
		};
		let first = repo.insert_bug(&sample("t1")).await.unwrap();
		let second = repo.insert_bug(&sample("t2")).await.unwrap();
		assert_eq!(first, 1);
		assert_eq!(second, 2);
	}
}
