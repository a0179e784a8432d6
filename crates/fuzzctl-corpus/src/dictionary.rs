//! AFL-format dictionary merging.

use std::path::Path;

use crate::error::Result;

/// Concatenates the AFL-format token dictionaries at `dict_paths` into `dest`,
/// skipping exact-duplicate lines and blank lines so a harness that ships its
/// own dictionary plus a project-wide one doesn't end up with the same token
/// entry twice.
pub fn merge_dictionaries<T: AsRef<Path>>(dict_paths: &[T], dest: &Path) -> Result<usize> {
	let mut seen = std::collections::HashSet::new();
	let mut merged = Vec::new();

	for path in dict_paths {
		let contents = std::fs::read_to_string(path)?;
		for line in contents.lines() {
			let trimmed = line.trim();
			if trimmed.is_empty() {
				continue;
			}
			if seen.insert(trimmed.to_string()) {
				merged.push(trimmed.to_string());
			}
		}
	}

	if let Some(parent) = dest.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(dest, merged.join("\n") + "\n")?;
	Ok(merged.len())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_skips_duplicate_and_blank_lines() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a.dict");
		let b = dir.path().join("b.dict");
		std::fs::write(&a, "keyword1=\"foo\"\n\nkeyword2=\"bar\"\n").unwrap();
		std::fs::write(&b, "keyword2=\"bar\"\nkeyword3=\"baz\"\n").unwrap();

		let dest = dir.path().join("merged.dict");
		let count = merge_dictionaries(&[&a, &b], &dest).unwrap();

		assert_eq!(count, 3);
		let merged = std::fs::read_to_string(&dest).unwrap();
		assert_eq!(merged.lines().count(), 3);
		assert!(merged.contains("keyword1"));
		assert!(merged.contains("keyword3"));
	}

	#[test]
	fn merge_of_no_dictionaries_produces_empty_file() {
		let dir = tempfile::tempdir().unwrap();
		let dest = dir.path().join("merged.dict");
		let count = merge_dictionaries::<&Path>(&[], &dest).unwrap();
		assert_eq!(count, 0);
		assert_eq!(std::fs::read_to_string(&dest).unwrap(), "\n");
	}
}
