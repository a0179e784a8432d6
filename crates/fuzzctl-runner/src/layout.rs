//! Filesystem layout for one fuzzing run.
//!
//! `work_root` is scratch, wiped freely between runs; `storage_root` holds
//! the long-lived shared corpus a run reads from and writes back to so later
//! runs (of this or another sanitizer) benefit from what this one found.

use std::path::PathBuf;

use fuzzctl_core::Fuzzlet;

/// Per-run scratch layout under `<work_root>/<task_id>/<harness>/<sanitizer>/`.
pub struct RunLayout {
	pub harness_bin: PathBuf,
	pub seeds_dir: PathBuf,
	pub output_dir: PathBuf,
	pub merged_dict: PathBuf,
}

impl RunLayout {
	pub fn new(work_root: &std::path::Path, fuzzlet: &Fuzzlet) -> Self {
		let root = work_root.join(&fuzzlet.task_id).join(&fuzzlet.harness).join(&fuzzlet.sanitizer);
		RunLayout {
			harness_bin: root.join("bin").join(&fuzzlet.harness),
			seeds_dir: root.join("seeds"),
			output_dir: root.join("output"),
			merged_dict: root.join("merged.dict"),
		}
	}
}

/// Paths for `copies` on-disk copies of a harness binary under `bin_dir`, the
/// primary copy (index 0) at `harness_bin` and the rest named `<harness>.N`
/// alongside it. `copies` is clamped to at least 1.
pub fn harness_copy_paths(harness_bin: &std::path::Path, harness: &str, copies: usize) -> Vec<PathBuf> {
	let bin_dir = harness_bin.parent().unwrap_or_else(|| std::path::Path::new("."));
	let mut paths = vec![harness_bin.to_path_buf()];
	for index in 1..copies.max(1) {
		paths.push(bin_dir.join(format!("{harness}.{index}")));
	}
	paths
}

/// Seed corpus the builder unzipped at publish time.
pub fn builder_seed_dir(storage_root: &std::path::Path, task_id: &str, harness: &str) -> PathBuf {
	storage_root.join(task_id).join("seeds").join(harness)
}

/// The shared, cross-run corpus store a run reads from and replenishes.
pub fn corpus_store_dir(storage_root: &std::path::Path, task_id: &str, harness: &str) -> PathBuf {
	storage_root.join("corpus").join(task_id).join(harness)
}

#[cfg(test)]
mod tests {
	use super::*;
	use fuzzctl_core::FuzzEngine;

	fn sample_fuzzlet() -> Fuzzlet {
		Fuzzlet {
			task_id: "t1".into(),
			harness: "fuzz_parse".into(),
			sanitizer: "address".into(),
			fuzz_engine: FuzzEngine::Afl,
			artifact_path: "/storage/artifacts/t1/fuzz_parse/address/afl/fuzz_parse".into(),
		}
	}

	#[test]
	fn run_layout_is_scoped_by_task_harness_and_sanitizer() {
		let layout = RunLayout::new(std::path::Path::new("/work"), &sample_fuzzlet());
		assert_eq!(
			layout.harness_bin,
			std::path::PathBuf::from("/work/t1/fuzz_parse/address/bin/fuzz_parse")
		);
		assert_eq!(layout.seeds_dir, std::path::PathBuf::from("/work/t1/fuzz_parse/address/seeds"));
		assert_eq!(layout.output_dir, std::path::PathBuf::from("/work/t1/fuzz_parse/address/output"));
	}

	#[test]
	fn harness_copy_paths_clamps_to_at_least_one() {
		let bin = std::path::Path::new("/work/t1/fuzz_parse/address/bin/fuzz_parse");
		assert_eq!(harness_copy_paths(bin, "fuzz_parse", 0), vec![bin.to_path_buf()]);
	}

	#[test]
	fn harness_copy_paths_names_extra_copies_after_the_harness() {
		let bin = std::path::Path::new("/work/t1/fuzz_parse/address/bin/fuzz_parse");
		let paths = harness_copy_paths(bin, "fuzz_parse", 3);
		assert_eq!(
			paths,
			vec![
				bin.to_path_buf(),
				std::path::PathBuf::from("/work/t1/fuzz_parse/address/bin/fuzz_parse.1"),
				std::path::PathBuf::from("/work/t1/fuzz_parse/address/bin/fuzz_parse.2"),
			]
		);
	}

	#[test]
	fn corpus_store_is_scoped_by_task_and_harness_only_not_sanitizer() {
		let dir = corpus_store_dir(std::path::Path::new("/storage"), "t1", "fuzz_parse");
		assert_eq!(dir, std::path::PathBuf::from("/storage/corpus/t1/fuzz_parse"));
	}
}
