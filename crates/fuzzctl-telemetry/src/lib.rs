//! Structured logging setup and lightweight cross-process trace context.
//!
//! This workspace does not ship to an external collector: the fabric's job is
//! to let a task's `trace_id` survive a round-trip through the KV store so a
//! scheduler tick, a builder run, and a runner instance that never share a
//! process can still be correlated in logs.

mod context;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

pub use context::TraceContext;

/// Initializes the global `tracing` subscriber for a binary.
///
/// Long-running daemons honor `FUZZCTL_LOG_DIR`: when set, each process logs
/// to `<dir>/<component>.<pid>.log` instead of stderr, so a supervisor that
/// captures stdout/stderr elsewhere doesn't end up with two copies.
pub fn init_logging(component: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	match std::env::var_os("FUZZCTL_LOG_DIR") {
		Some(dir) => {
			let path = log_file_path(PathBuf::from(dir), component, std::process::id());
			let file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
				Ok(file) => file,
				Err(error) => {
					eprintln!("fuzzctl-telemetry: could not open {path:?}: {error}, falling back to stderr");
					init_stderr(filter);
					return;
				}
			};
			tracing_subscriber::fmt()
				.with_env_filter(filter)
				.with_writer(file)
				.with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
				.init();
		}
		None => init_stderr(filter),
	}
}

fn init_stderr(filter: EnvFilter) {
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn log_file_path(dir: PathBuf, component: &str, pid: u32) -> PathBuf {
	dir.join(format!("{component}.{pid}.log"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn log_file_path_embeds_component_and_pid() {
		let path = log_file_path(PathBuf::from("/var/log/fuzzctl"), "scheduler", 4242);
		assert_eq!(path, PathBuf::from("/var/log/fuzzctl/scheduler.4242.log"));
	}
}
