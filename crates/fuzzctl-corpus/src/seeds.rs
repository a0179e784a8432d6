//! Seed corpus aggregation: collecting harness-provided corpus files into one
//! `seeds/` directory per fuzzlet, deduped by content so the same seed shipped
//! by two harnesses (a common case for shared test corpora) is stored once.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{CorpusError, Result};

/// Copies every regular file under each of `corpus_dirs` into `dest`, named by
/// the hex SHA-256 of its contents. Returns the number of distinct files
/// written (duplicates across or within `corpus_dirs` are not recopied).
pub fn aggregate_seed_corpus(corpus_dirs: &[impl AsRef<Path>], dest: &Path) -> Result<usize> {
	std::fs::create_dir_all(dest)?;
	let mut seen = std::collections::HashSet::new();

	for corpus_dir in corpus_dirs {
		let corpus_dir = corpus_dir.as_ref();
		if !corpus_dir.exists() {
			continue;
		}
		for entry in walkdir::WalkDir::new(corpus_dir) {
			let entry = entry.map_err(|source| CorpusError::Walk {
				root: corpus_dir.display().to_string(),
				source,
			})?;
			if !entry.file_type().is_file() {
				continue;
			}
			let contents = std::fs::read(entry.path())?;
			let digest = hex::encode(Sha256::digest(&contents));
			if seen.insert(digest.clone()) {
				std::fs::write(dest.join(&digest), &contents)?;
			}
		}
	}
	Ok(seen.len())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aggregate_dedups_identical_seeds_across_directories() {
		let corpus_a = tempfile::tempdir().unwrap();
		let corpus_b = tempfile::tempdir().unwrap();
		std::fs::write(corpus_a.path().join("seed1"), b"hello").unwrap();
		std::fs::write(corpus_b.path().join("seed1-copy"), b"hello").unwrap();
		std::fs::write(corpus_b.path().join("seed2"), b"world").unwrap();

		let dest = tempfile::tempdir().unwrap();
		let count = aggregate_seed_corpus(&[corpus_a.path(), corpus_b.path()], dest.path()).unwrap();

		assert_eq!(count, 2);
		assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 2);
	}

	#[test]
	fn aggregate_skips_missing_corpus_directories() {
		let dest = tempfile::tempdir().unwrap();
		let missing = dest.path().join("does-not-exist");
		let count = aggregate_seed_corpus(&[missing.as_path()], dest.path()).unwrap();
		assert_eq!(count, 0);
	}
}
