//! Glues the crash manager's stored-crash output onto bug registration via
//! `TaskRepository::insert_bug`, which assigns the bug's id.

use std::sync::Arc;

use chrono::Utc;
use fuzzctl_core::Bug;
use fuzzctl_crashmgr::StoredCrash;
use fuzzctl_repository::TaskRepository;
use tokio::sync::mpsc;

use crate::error::Result;

/// Drains `stored_rx` until the crash manager's senders have all dropped,
/// registering one bug row per genuinely new stored crash.
pub async fn run_bug_registration(repo: Arc<dyn TaskRepository>, mut stored_rx: mpsc::Receiver<StoredCrash>) {
	while let Some(stored) = stored_rx.recv().await {
		if let Err(error) = register_bug(repo.as_ref(), &stored).await {
			tracing::error!(%error, task_id = %stored.task_id, "failed to register bug for stored crash");
		}
	}
}

async fn register_bug(repo: &dyn TaskRepository, stored: &StoredCrash) -> Result<()> {
	if !stored.is_new {
		return Ok(());
	}
	repo.insert_bug(&Bug {
		id: 0, // assigned by insert_bug, ignored here
		task_id: stored.task_id.clone(),
		harness_name: stored.harness_name.clone(),
		sanitizer: stored.sanitizer.clone(),
		architecture: stored.architecture.clone(),
		poc: stored.poc.display().to_string(),
		created_at: Utc::now(),
	})
	.await?;
	Ok(())
}
