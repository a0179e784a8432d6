//! Recursive copy that preserves the executable bit.

use std::path::Path;

use crate::error::Result;

/// Copies `src` into `dest` recursively. Files keep their permission bits, so a
/// copied harness binary or `build.sh` stays executable without a caller
/// needing to re-`chmod` it.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
	if src.is_dir() {
		std::fs::create_dir_all(dest)?;
		for entry in walkdir::WalkDir::new(src).min_depth(1) {
			let entry = entry.map_err(std::io::Error::from)?;
			let relative = entry.path().strip_prefix(src).expect("walkdir yields descendants of src");
			let target = dest.join(relative);
			if entry.file_type().is_dir() {
				std::fs::create_dir_all(&target)?;
			} else {
				copy_file(entry.path(), &target)?;
			}
		}
	} else {
		if let Some(parent) = dest.parent() {
			std::fs::create_dir_all(parent)?;
		}
		copy_file(src, dest)?;
	}
	Ok(())
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
	std::fs::copy(src, dest)?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let mode = std::fs::metadata(src)?.permissions().mode();
		std::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode))?;
	}
	Ok(())
}
