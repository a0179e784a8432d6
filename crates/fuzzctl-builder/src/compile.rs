//! Containerized per-sanitizer compilation, retried through the same
//! [`fuzzctl_procsup::ProcessSupervisor`] abstraction the runner uses for its
//! fuzzer instances — that's what makes the retry logic here unit-testable
//! with [`fuzzctl_procsup::FakeProcessSupervisor`] instead of a real
//! container runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fuzzctl_procsup::{ProcessSpec, ProcessSupervisor};

use crate::error::{BuilderError, Result};

/// The out-of-process container build driver, invoked as `<driver> build_image
/// --no-pull <project>` and `<driver> build_fuzzers --clean ... <project> <repo>`.
const CONTAINER_DRIVER: &str = "infra_helper";

/// Makes sure `project`'s build image exists locally, without pulling a newer
/// one than what's already cached. Not retried, and a nonzero exit here is
/// only logged rather than propagated: the cached image may still be usable,
/// and a genuinely broken build surfaces properly in the retried compile step.
async fn build_image(supervisor: &dyn ProcessSupervisor, tooling_dir: &Path, project_name: &str) -> Result<()> {
	let spec = ProcessSpec::new(CONTAINER_DRIVER)
		.arg("build_image")
		.arg("--no-pull")
		.arg(project_name)
		.cwd(tooling_dir);
	let mut process = supervisor.spawn(spec).await?;
	let exit_code = process.wait().await?;
	if exit_code != 0 {
		tracing::warn!(project_name, exit_code, "build_image exited nonzero, proceeding with cached image");
	}
	Ok(())
}

/// Builds `project`'s fuzzers for one sanitizer, retrying up to `retries`
/// times on a nonzero exit or a timeout.
#[allow(clippy::too_many_arguments)]
pub async fn compile_with_retry(
	supervisor: &dyn ProcessSupervisor,
	repo_dir: &Path,
	tooling_dir: &Path,
	out_dir: &Path,
	project_name: &str,
	sanitizer: &str,
	extra_env: &[(String, String)],
	timeout: Duration,
	retries: u32,
) -> Result<PathBuf> {
	tokio::fs::create_dir_all(out_dir).await?;
	build_image(supervisor, tooling_dir, project_name).await?;

	let mut last_exit_code = -1;
	for attempt in 0..=retries {
		let mut spec = ProcessSpec::new(CONTAINER_DRIVER).arg("build_fuzzers").arg("--clean");
		for (key, value) in extra_env {
			spec = spec.arg("-e").arg(format!("{key}={value}"));
		}
		spec = spec
			.arg(format!("--sanitizer={sanitizer}"))
			.arg(project_name)
			.arg(repo_dir.display().to_string())
			.cwd(tooling_dir);

		let mut process = supervisor.spawn(spec).await?;
		let wait = tokio::time::timeout(timeout, process.wait()).await;

		let exit_code = match wait {
			Ok(Ok(code)) => code,
			Ok(Err(error)) => return Err(error.into()),
			Err(_) => {
				tracing::warn!(sanitizer, attempt, "compile timed out, killing container");
				process.kill().await?;
				-1
			}
		};

		if exit_code == 0 {
			return Ok(out_dir.to_path_buf());
		}
		last_exit_code = exit_code;
		tracing::warn!(sanitizer, attempt, exit_code, "compile attempt failed");
	}

	Err(BuilderError::CompileFailed {
		sanitizer: sanitizer.to_string(),
		attempts: retries + 1,
		exit_code: last_exit_code,
	})
}
