//! Content-addressed crash storage.
//!
//! One bounded channel feeds a single consumer task that owns all writes
//! under `crash_root`, so two fuzzer instances racing to report the same
//! crash content never interleave a partial write. Shutdown needs no signal
//! of its own: once every [`CrashManager`] handle (and therefore every sender
//! clone) is dropped, the consumer's `recv` loop ends and it drops its output
//! sender in turn, closing the downstream channel the caller is reading from.

mod error;

use std::path::PathBuf;

use md5::{Digest, Md5};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use error::{CrashMgrError, Result};

/// One crash file observed on disk, not yet stored.
#[derive(Debug, Clone)]
pub struct CrashInput {
	pub task_id: String,
	pub harness_name: String,
	pub sanitizer: String,
	pub architecture: String,
	pub source_path: PathBuf,
}

/// Result of storing a [`CrashInput`] at its content-addressed path.
#[derive(Debug, Clone)]
pub struct StoredCrash {
	pub task_id: String,
	pub harness_name: String,
	pub sanitizer: String,
	pub architecture: String,
	/// `<crash_root>/<task_id>/<harness_name>/<sanitizer>/<md5>`
	pub poc: PathBuf,
	/// `false` if this content hash was already stored for this task/harness/sanitizer.
	pub is_new: bool,
}

/// Handle for submitting crashes; clone it across producers (one per fuzzer
/// instance watchdog) and drop every clone to let the worker drain and stop.
#[derive(Clone)]
pub struct CrashManager {
	tx: mpsc::Sender<CrashInput>,
}

impl CrashManager {
	/// Spawns the consumer task and returns a submission handle plus the
	/// channel of [`StoredCrash`] results.
	pub fn spawn(crash_root: PathBuf, buffer: usize) -> (CrashManager, mpsc::Receiver<StoredCrash>, JoinHandle<()>) {
		let (tx, mut rx) = mpsc::channel::<CrashInput>(buffer);
		let (out_tx, out_rx) = mpsc::channel(buffer);

		let handle = tokio::spawn(async move {
			while let Some(input) = rx.recv().await {
				match store(&crash_root, input).await {
					Ok(stored) => {
						if out_tx.send(stored).await.is_err() {
							tracing::warn!("crash manager output receiver dropped, stopping early");
							break;
						}
					}
					Err(error) => tracing::error!(%error, "failed to store crash"),
				}
			}
		});

		(CrashManager { tx }, out_rx, handle)
	}

	pub async fn submit(&self, input: CrashInput) -> bool {
		self.tx.send(input).await.is_ok()
	}
}

async fn store(crash_root: &PathBuf, input: CrashInput) -> Result<StoredCrash> {
	let contents = tokio::fs::read(&input.source_path).await.map_err(|source| CrashMgrError::Io {
		path: input.source_path.display().to_string(),
		source,
	})?;
	let digest = hex::encode(Md5::digest(&contents));

	let dir = crash_root
		.join(&input.task_id)
		.join(&input.harness_name)
		.join(&input.sanitizer);
	tokio::fs::create_dir_all(&dir).await.map_err(|source| CrashMgrError::Io {
		path: dir.display().to_string(),
		source,
	})?;

	let poc = dir.join(&digest);
	let is_new = !poc.exists();
	if is_new {
		tokio::fs::write(&poc, &contents).await.map_err(|source| CrashMgrError::Io {
			path: poc.display().to_string(),
			source,
		})?;
	}

	Ok(StoredCrash {
		task_id: input.task_id,
		harness_name: input.harness_name,
		sanitizer: input.sanitizer,
		architecture: input.architecture,
		poc,
		is_new,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_input(root: &std::path::Path, content: &[u8]) -> CrashInput {
		let source = root.join("crash-in");
		std::fs::write(&source, content).unwrap();
		CrashInput {
			task_id: "t1".into(),
			harness_name: "h1".into(),
			sanitizer: "address".into(),
			architecture: "x86_64".into(),
			source_path: source,
		}
	}

	#[tokio::test]
	async fn duplicate_content_is_stored_once() {
		let dir = tempfile::tempdir().unwrap();
		let crash_root = dir.path().join("crashes");
		let (manager, mut out_rx, handle) = CrashManager::spawn(crash_root.clone(), 8);

		manager.submit(sample_input(dir.path(), b"crash-bytes")).await;
		manager.submit(sample_input(dir.path(), b"crash-bytes")).await;
		drop(manager);
		handle.await.unwrap();

		let first = out_rx.recv().await.unwrap();
		let second = out_rx.recv().await.unwrap();
		assert!(first.is_new);
		assert!(!second.is_new);
		assert_eq!(first.poc, second.poc);
	}

	#[tokio::test]
	async fn worker_stops_once_all_senders_are_dropped() {
		let dir = tempfile::tempdir().unwrap();
		let (manager, mut out_rx, handle) = CrashManager::spawn(dir.path().join("crashes"), 8);
		drop(manager);
		handle.await.unwrap();
		assert!(out_rx.recv().await.is_none());
	}
}
