//! A filesystem watcher for new crash/queue files, generalized from
//! the editor workspace's `ConfigWatcher`: same `notify::RecommendedWatcher` +
//! `mpsc::channel` shape, but watching a directory tree for new *files*
//! instead of one config file for edits, and filtered by a caller-supplied
//! predicate instead of being hardcoded to TOML/KDL paths.

mod error;

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

pub use error::{Result, WatchdogError};

/// Watches `root` recursively and yields paths to new files matching `predicate`.
///
/// Delivery is at-least-once: a file that notify reports more than once in a
/// single poll is deduped, but a restart of the watchdog (or the process)
/// will re-report every file still present on disk. Callers that must not
/// reprocess a file twice across restarts (the crash manager) dedup again by
/// content hash at their own layer.
pub struct FsWatchdog {
	_watcher: RecommendedWatcher,
	events: std_mpsc::Receiver<notify::Result<notify::Event>>,
	predicate: Box<dyn Fn(&Path) -> bool + Send>,
}

impl FsWatchdog {
	pub fn new(root: &Path, predicate: impl Fn(&Path) -> bool + Send + 'static) -> Result<Self> {
		let (tx, rx) = std_mpsc::channel();
		let mut watcher =
			RecommendedWatcher::new(move |event| {
				let _ = tx.send(event);
			}, notify::Config::default())
			.map_err(|source| WatchdogError::Watch {
				path: root.display().to_string(),
				source,
			})?;
		watcher
			.watch(root, RecursiveMode::Recursive)
			.map_err(|source| WatchdogError::Watch {
				path: root.display().to_string(),
				source,
			})?;

		Ok(FsWatchdog {
			_watcher: watcher,
			events: rx,
			predicate: Box::new(predicate),
		})
	}

	/// Drains all events queued since the last poll and returns the distinct
	/// new-file paths that pass the predicate. Never blocks.
	pub fn poll(&mut self) -> Vec<PathBuf> {
		let mut seen = std::collections::HashSet::new();
		let mut out = Vec::new();

		while let Ok(event) = self.events.try_recv() {
			let Ok(event) = event else { continue };
			if !matches!(
				event.kind,
				notify::EventKind::Create(_) | notify::EventKind::Modify(_)
			) {
				continue;
			}
			for path in event.paths {
				if path.is_dir() {
					continue;
				}
				if !(self.predicate)(&path) {
					continue;
				}
				if seen.insert(path.clone()) {
					out.push(path);
				}
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn watchdog_reports_new_matching_files() {
		let dir = tempfile::tempdir().unwrap();
		let mut watchdog =
			FsWatchdog::new(dir.path(), |path| path.extension().and_then(|e| e.to_str()) == Some("crash"))
				.unwrap();

		std::fs::write(dir.path().join("ignored.txt"), b"x").unwrap();
		std::fs::write(dir.path().join("one.crash"), b"x").unwrap();

		let mut found = Vec::new();
		for _ in 0..20 {
			found.extend(watchdog.poll());
			if !found.is_empty() {
				break;
			}
			std::thread::sleep(Duration::from_millis(50));
		}

		assert!(found.iter().any(|p| p.file_name().unwrap() == "one.crash"));
		assert!(!found.iter().any(|p| p.file_name().unwrap() == "ignored.txt"));
	}

	#[test]
	fn poll_deduplicates_repeated_events_for_the_same_path() {
		let dir = tempfile::tempdir().unwrap();
		let mut watchdog = FsWatchdog::new(dir.path(), |_| true).unwrap();
		let path = dir.path().join("a.txt");
		std::fs::write(&path, b"1").unwrap();
		std::thread::sleep(Duration::from_millis(50));
		std::fs::write(&path, b"22").unwrap();

		let mut found = Vec::new();
		for _ in 0..20 {
			found.extend(watchdog.poll());
			std::thread::sleep(Duration::from_millis(50));
		}
		let matching = found.iter().filter(|p| p.ends_with("a.txt")).count();
		assert!(matching >= 1);
	}
}
