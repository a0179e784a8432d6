//! Dockerfile rewriting for the seed-minimization build variant.
//!
//! Seed minimization links the target against a bundled minimization engine
//! instead of the project's own `libFuzzingEngine.a`, so the rewrite copies
//! `libcmin.a` into the tooling subtree under that name and appends a `COPY`
//! line to the project's own Dockerfile so the image picks it up.

use std::path::Path;

use crate::error::Result;

/// Name the bundled minimization engine is copied in under, replacing
/// whatever the project's own `libFuzzingEngine.a` would have been.
const CMIN_ENGINE_NAME: &str = "libFuzzingEngine.a";

/// Rewrites `src_dockerfile` into `dest_dockerfile`, appending a `COPY` line
/// for the minimization engine. Returns the detected container `WORKDIR`
/// (`$SRC` substituted for `/src`), defaulting to `/src/<project>`.
pub fn rewrite_for_cmin(
	src_dockerfile: &Path,
	dest_dockerfile: &Path,
	tooling_dir: &Path,
	project_name: &str,
) -> Result<String> {
	let contents = std::fs::read_to_string(src_dockerfile)?;
	let workdir = detect_workdir(&contents, project_name);

	let libcmin_src = tooling_dir.join("libcmin.a");
	let libcmin_dest = tooling_dir.join(CMIN_ENGINE_NAME);
	if libcmin_src.is_file() {
		std::fs::copy(&libcmin_src, &libcmin_dest)?;
	}

	let mut rewritten = contents;
	if !rewritten.ends_with('\n') {
		rewritten.push('\n');
	}
	rewritten.push_str(&format!("COPY {CMIN_ENGINE_NAME} {CMIN_ENGINE_NAME}\n"));

	if let Some(parent) = dest_dockerfile.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(dest_dockerfile, rewritten)?;

	Ok(workdir)
}

/// Extracts the last `WORKDIR ...` line, substituting `$SRC` for `/src`;
/// falls back to `/src/<project>` when the Dockerfile declares none.
fn detect_workdir(contents: &str, project_name: &str) -> String {
	contents
		.lines()
		.filter_map(|line| line.trim().strip_prefix("WORKDIR"))
		.map(|rest| rest.trim().replace("$SRC", "/src"))
		.last()
		.unwrap_or_else(|| format!("/src/{project_name}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn appends_a_copy_line_for_the_minimization_engine() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("Dockerfile");
		std::fs::write(&src, "FROM gcr.io/oss-fuzz-base/base-builder\nWORKDIR $SRC/libpng\n").unwrap();

		let dest = dir.path().join("Dockerfile.cmin");
		let workdir = rewrite_for_cmin(&src, &dest, dir.path(), "libpng").unwrap();

		let rewritten = std::fs::read_to_string(&dest).unwrap();
		assert!(rewritten.contains("COPY libFuzzingEngine.a libFuzzingEngine.a"));
		assert_eq!(workdir, "/src/libpng");
	}

	#[test]
	fn defaults_workdir_to_src_project_when_dockerfile_declares_none() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("Dockerfile");
		std::fs::write(&src, "FROM gcr.io/oss-fuzz-base/base-builder\n").unwrap();

		let dest = dir.path().join("Dockerfile.cmin");
		let workdir = rewrite_for_cmin(&src, &dest, dir.path(), "libpng").unwrap();
		assert_eq!(workdir, "/src/libpng");
	}

	#[test]
	fn the_last_workdir_line_wins() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("Dockerfile");
		std::fs::write(
			&src,
			"FROM gcr.io/oss-fuzz-base/base-builder\nWORKDIR $SRC/first\nWORKDIR $SRC/second\n",
		)
		.unwrap();

		let dest = dir.path().join("Dockerfile.cmin");
		let workdir = rewrite_for_cmin(&src, &dest, dir.path(), "libpng").unwrap();
		assert_eq!(workdir, "/src/second");
	}

	#[test]
	fn copies_libcmin_when_present_in_the_tooling_dir() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("Dockerfile");
		std::fs::write(&src, "FROM base\n").unwrap();
		std::fs::write(dir.path().join("libcmin.a"), b"not-a-real-archive").unwrap();

		let dest = dir.path().join("Dockerfile.cmin");
		rewrite_for_cmin(&src, &dest, dir.path(), "libpng").unwrap();

		assert!(dir.path().join(CMIN_ENGINE_NAME).is_file());
	}
}
