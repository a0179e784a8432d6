//! Wires [`fuzzctl_watchdog::FsWatchdog`] onto a run's `output/` tree: one
//! watcher over every instance's `crashes/`, one over every `queue/`. Each is
//! polled on a fixed tick and fans new paths out on a bounded channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fuzzctl_watchdog::FsWatchdog;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const CRASH_CHANNEL_CAPACITY: usize = 1024;
pub const SEED_CHANNEL_CAPACITY: usize = 100;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn is_real_crash(path: &Path) -> bool {
	path.file_name().and_then(|n| n.to_str()) != Some("README.txt")
}

fn is_discovered_seed(path: &Path) -> bool {
	!path.to_string_lossy().contains("orig:")
}

/// Spawns the crash watchdog over `output_dir` and returns its receiver. The
/// sender side is owned entirely by the spawned task, so the channel closes
/// once that task observes `shutdown` and returns.
pub fn spawn_crash_watchdog(output_dir: &Path, shutdown: CancellationToken) -> mpsc::Receiver<PathBuf> {
	spawn_watchdog(output_dir, is_real_crash, CRASH_CHANNEL_CAPACITY, shutdown, true)
}

/// Spawns the seed-discovery (queue) watchdog over `output_dir`.
pub fn spawn_seed_watchdog(output_dir: &Path, shutdown: CancellationToken) -> mpsc::Receiver<PathBuf> {
	spawn_watchdog(output_dir, is_discovered_seed, SEED_CHANNEL_CAPACITY, shutdown, false)
}

fn spawn_watchdog(
	output_dir: &Path,
	predicate: impl Fn(&Path) -> bool + Send + 'static,
	capacity: usize,
	shutdown: CancellationToken,
	is_crash_watchdog: bool,
) -> mpsc::Receiver<PathBuf> {
	let (tx, rx) = mpsc::channel(capacity);
	let root = output_dir.to_path_buf();

	tokio::spawn(async move {
		let mut watchdog = match FsWatchdog::new(&root, predicate) {
			Ok(watchdog) => watchdog,
			Err(error) => {
				tracing::error!(%error, path = %root.display(), "failed to start watchdog");
				return;
			}
		};

		let mut first_crash_seen = false;
		loop {
			tokio::select! {
				_ = shutdown.cancelled() => break,
				_ = tokio::time::sleep(POLL_INTERVAL) => {}
			}
			for path in watchdog.poll() {
				if is_crash_watchdog && !first_crash_seen {
					first_crash_seen = true;
					tracing::info!(path = %path.display(), "first crash observed");
				}
				if tx.send(path).await.is_err() {
					return;
				}
			}
		}
	});

	rx
}
