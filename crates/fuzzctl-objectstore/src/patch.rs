//! Applying unified diffs from a `diff` [`fuzzctl_core::SourceType`] source.

use std::path::Path;

use fuzzctl_procsup::{ProcessSpec, ProcessSupervisor};

use crate::error::{ObjectStoreError, Result};

/// Applies every `.patch`/`.diff` file directly under `patch_dir` to `target_dir`,
/// in lexicographic filename order, via the system `patch` binary (`-p1`),
/// spawned through the same [`ProcessSupervisor`] abstraction the builder and
/// runner use for their own subprocesses.
///
/// Order matters: patch sets that touch the same hunks are expected to be
/// generated and numbered by their producer for sequential application.
pub async fn apply_patches(supervisor: &dyn ProcessSupervisor, patch_dir: &Path, target_dir: &Path) -> Result<()> {
	let mut entries: Vec<_> = std::fs::read_dir(patch_dir)?
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.path())
		.filter(|path| {
			matches!(
				path.extension().and_then(|e| e.to_str()),
				Some("patch") | Some("diff")
			)
		})
		.collect();
	entries.sort();

	for patch_path in entries {
		apply_one(supervisor, &patch_path, target_dir).await?;
	}
	Ok(())
}

async fn apply_one(supervisor: &dyn ProcessSupervisor, patch_path: &Path, target_dir: &Path) -> Result<()> {
	let spec = ProcessSpec::new("patch")
		.arg("-p1")
		.arg("--directory")
		.arg(target_dir.display().to_string())
		.arg("--input")
		.arg(patch_path.display().to_string());

	let mut process = supervisor.spawn(spec).await?;
	let exit_code = process.wait().await?;

	if exit_code != 0 {
		return Err(ObjectStoreError::PatchRejected {
			path: patch_path.display().to_string(),
			stderr: format!("patch exited with code {exit_code}"),
		});
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn patch_files_are_applied_in_lexicographic_order() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("002-second.patch"), b"").unwrap();
		std::fs::write(dir.path().join("001-first.patch"), b"").unwrap();
		std::fs::write(dir.path().join("readme.txt"), b"").unwrap();

		let mut entries: Vec<_> = std::fs::read_dir(dir.path())
			.unwrap()
			.filter_map(|e| e.ok())
			.map(|e| e.path())
			.filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("patch") | Some("diff")))
			.collect();
		entries.sort();

		let names: Vec<_> = entries
			.iter()
			.map(|p| p.file_name().unwrap().to_str().unwrap())
			.collect();
		assert_eq!(names, vec!["001-first.patch", "002-second.patch"]);
	}

	#[tokio::test]
	async fn apply_patches_invokes_patch_once_per_file_in_order() {
		use fuzzctl_procsup::FakeProcessSupervisor;

		let patch_dir = tempfile::tempdir().unwrap();
		let target_dir = tempfile::tempdir().unwrap();
		std::fs::write(patch_dir.path().join("002-second.patch"), b"").unwrap();
		std::fs::write(patch_dir.path().join("001-first.patch"), b"").unwrap();

		let supervisor = FakeProcessSupervisor::new(0);
		apply_patches(&supervisor, patch_dir.path(), target_dir.path()).await.unwrap();

		let spawned = supervisor.spawned.lock().await;
		assert_eq!(spawned.len(), 2);
		assert_eq!(spawned[0].program, "patch");
		assert!(spawned[0].args.iter().any(|a| a.ends_with("001-first.patch")));
		assert!(spawned[1].args.iter().any(|a| a.ends_with("002-second.patch")));
	}

	#[tokio::test]
	async fn apply_patches_reports_rejection_on_nonzero_exit() {
		use fuzzctl_procsup::FakeProcessSupervisor;

		let patch_dir = tempfile::tempdir().unwrap();
		let target_dir = tempfile::tempdir().unwrap();
		std::fs::write(patch_dir.path().join("001-first.patch"), b"").unwrap();

		let supervisor = FakeProcessSupervisor::new(1);
		let error = apply_patches(&supervisor, patch_dir.path(), target_dir.path()).await.unwrap_err();
		assert!(matches!(error, ObjectStoreError::PatchRejected { .. }));
	}
}
