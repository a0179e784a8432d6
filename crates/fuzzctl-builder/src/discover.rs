//! Harness, dictionary, and seed corpus discovery in a compiled build's
//! output directory. The convention mirrors OSS-Fuzz build images: one
//! executable per harness directly under `$OUT`, with an optional
//! `<harness>_seed_corpus.zip` sidecar and a dictionary resolved per the
//! `<harness>.options` / `<harness>.dict` / `b3yond.dict` fallback chain.

use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct HarnessArtifact {
	pub name: String,
	pub binary_path: PathBuf,
	pub dict_path: Option<PathBuf>,
	pub seed_corpus_zip: Option<PathBuf>,
}

/// AFL++'s own auto-generated dictionary, used when a harness ships neither
/// an explicit `.options` reference nor its own `.dict`.
const FALLBACK_DICT_NAME: &str = "b3yond.dict";

const NON_HARNESS_EXTENSIONS: &[&str] = &["dict", "zip", "json", "options", "txt", "yaml"];

/// Lists every harness binary directly under `out_dir`, with its resolved
/// dictionary and seed corpus zip, when present.
pub fn discover_harnesses(out_dir: &Path) -> Result<Vec<HarnessArtifact>> {
	let mut harnesses = Vec::new();

	for entry in std::fs::read_dir(out_dir)? {
		let entry = entry?;
		let path = entry.path();
		if !path.is_file() {
			continue;
		}
		if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
			if NON_HARNESS_EXTENSIONS.contains(&ext) {
				continue;
			}
		}
		if !is_executable(&path) || !contains_harness_marker(&path)? {
			continue;
		}

		let name = path
			.file_name()
			.and_then(|n| n.to_str())
			.unwrap_or_default()
			.to_string();

		let seed_corpus_zip = out_dir.join(format!("{name}_seed_corpus.zip"));
		harnesses.push(HarnessArtifact {
			dict_path: resolve_dictionary(out_dir, &name),
			seed_corpus_zip: seed_corpus_zip.is_file().then_some(seed_corpus_zip),
			name,
			binary_path: path,
		});
	}

	harnesses.sort_by(|a, b| a.name.cmp(&b.name));
	Ok(harnesses)
}

/// Dictionary resolution per (dir, harness): if `<harness>.options` exists,
/// the last `dict = <relpath>` entry wins if that file exists; else
/// `<harness>.dict`; else the AFL++ auto-generated `b3yond.dict`. Missing is
/// not an error, it yields no dictionary.
fn resolve_dictionary(out_dir: &Path, harness: &str) -> Option<PathBuf> {
	let options_path = out_dir.join(format!("{harness}.options"));
	if let Ok(contents) = std::fs::read_to_string(&options_path) {
		let referenced = contents
			.lines()
			.filter_map(|line| line.split_once('='))
			.filter(|(key, _)| key.trim() == "dict")
			.map(|(_, value)| value.trim())
			.last()
			.map(|relpath| out_dir.join(relpath));
		if let Some(path) = referenced {
			if path.is_file() {
				return Some(path);
			}
		}
	}

	let own_dict = out_dir.join(format!("{harness}.dict"));
	if own_dict.is_file() {
		return Some(own_dict);
	}

	let fallback = out_dir.join(FALLBACK_DICT_NAME);
	fallback.is_file().then_some(fallback)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	std::fs::metadata(path)
		.map(|meta| meta.permissions().mode() & 0o111 != 0)
		.unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
	true
}

/// A fuzz harness links in `LLVMFuzzerTestOneInput`; scanning the binary's
/// raw bytes for the symbol name is equivalent to `strings | grep` without
/// shelling out to `strings` for every candidate file.
const HARNESS_MARKER: &[u8] = b"LLVMFuzzerTestOneInput";

fn contains_harness_marker(path: &Path) -> Result<bool> {
	let contents = std::fs::read(path)?;
	Ok(contents.windows(HARNESS_MARKER.len()).any(|window| window == HARNESS_MARKER))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(unix)]
	fn make_executable(path: &Path) {
		use std::os::unix::fs::PermissionsExt;
		std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
	}

	#[test]
	fn discovers_executable_harnesses_and_their_sidecars() {
		let dir = tempfile::tempdir().unwrap();
		let harness = dir.path().join("fuzz_parse");
		std::fs::write(&harness, b"#!/bin/sh\nLLVMFuzzerTestOneInput\n").unwrap();
		make_executable(&harness);

		std::fs::write(dir.path().join("fuzz_parse.dict"), b"a=\"b\"\n").unwrap();
		std::fs::write(dir.path().join("fuzz_parse_seed_corpus.zip"), b"PK\x03\x04").unwrap();

		// A non-executable, non-harness file must not be treated as a harness.
		std::fs::write(dir.path().join("README.txt"), b"notes").unwrap();

		let harnesses = discover_harnesses(dir.path()).unwrap();
		assert_eq!(harnesses.len(), 1);
		let h = &harnesses[0];
		assert_eq!(h.name, "fuzz_parse");
		assert!(h.dict_path.is_some());
		assert!(h.seed_corpus_zip.is_some());
	}

	#[test]
	fn harness_without_sidecars_has_none_for_both() {
		let dir = tempfile::tempdir().unwrap();
		let harness = dir.path().join("fuzz_bare");
		std::fs::write(&harness, b"#!/bin/sh\nLLVMFuzzerTestOneInput\n").unwrap();
		make_executable(&harness);

		let harnesses = discover_harnesses(dir.path()).unwrap();
		assert_eq!(harnesses.len(), 1);
		assert!(harnesses[0].dict_path.is_none());
		assert!(harnesses[0].seed_corpus_zip.is_none());
	}

	#[test]
	fn options_file_dict_reference_wins_over_own_dict() {
		let dir = tempfile::tempdir().unwrap();
		let harness = dir.path().join("fuzz_opts");
		std::fs::write(&harness, b"#!/bin/sh\nLLVMFuzzerTestOneInput\n").unwrap();
		make_executable(&harness);

		std::fs::write(dir.path().join("fuzz_opts.dict"), b"own=\"1\"\n").unwrap();
		std::fs::write(dir.path().join("shared.dict"), b"shared=\"1\"\n").unwrap();
		std::fs::write(dir.path().join("fuzz_opts.options"), "[libfuzzer]\ndict = shared.dict\n").unwrap();

		let harnesses = discover_harnesses(dir.path()).unwrap();
		assert_eq!(harnesses[0].dict_path, Some(dir.path().join("shared.dict")));
	}

	#[test]
	fn falls_back_to_b3yond_dict_when_nothing_else_resolves() {
		let dir = tempfile::tempdir().unwrap();
		let harness = dir.path().join("fuzz_fallback");
		std::fs::write(&harness, b"#!/bin/sh\nLLVMFuzzerTestOneInput\n").unwrap();
		make_executable(&harness);
		std::fs::write(dir.path().join("b3yond.dict"), b"auto=\"1\"\n").unwrap();

		let harnesses = discover_harnesses(dir.path()).unwrap();
		assert_eq!(harnesses[0].dict_path, Some(dir.path().join("b3yond.dict")));
	}
}
