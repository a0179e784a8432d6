//! Process supervision, generalized from a single launcher into a trait with a
//! real subprocess implementation and an in-process fake for tests.
//!
//! The build driver's container/compile steps and the runner's master/slave
//! AFL++ instances both need the same shape: start a long- or short-lived
//! child, capture its output, and be told when it exits or be asked to kill
//! it early on cancellation. Exactly one of these concerns, `LspLauncher` in
//! the editor this workspace grew out of, spawned a `tokio::process::Command`
//! with piped stdio and a background task draining it; that pattern is kept
//! here and generalized to any command line rather than just a language
//! server.

mod error;
mod real;
mod test_helpers;

use std::path::PathBuf;

use async_trait::async_trait;

pub use error::{ProcSupError, Result};
pub use real::TokioProcessSupervisor;
pub use test_helpers::{FakeProcess, FakeProcessSupervisor};

/// What to run and how.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
	pub program: String,
	pub args: Vec<String>,
	pub cwd: Option<PathBuf>,
	pub env: Vec<(String, String)>,
	/// If set, combined stdout+stderr is appended to this file instead of
	/// being captured in memory; used for fuzzer instances that run for hours.
	pub log_file: Option<PathBuf>,
}

impl ProcessSpec {
	pub fn new(program: impl Into<String>) -> Self {
		ProcessSpec {
			program: program.into(),
			args: Vec::new(),
			cwd: None,
			env: Vec::new(),
			log_file: None,
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
		self.cwd = Some(cwd.into());
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.push((key.into(), value.into()));
		self
	}

	pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.log_file = Some(path.into());
		self
	}
}

/// A spawned child process, real or fake.
#[async_trait]
pub trait SupervisedProcess: Send {
	/// Blocks until the process exits, returning its exit code.
	async fn wait(&mut self) -> Result<i32>;

	/// Sends `SIGINT` without reaping; the caller is expected to `wait` on the
	/// result separately, so a graceful-shutdown budget can race it against a
	/// timeout (used for the runner's master/slave AFL++ instances).
	async fn interrupt(&mut self) -> Result<()>;

	/// Sends a termination signal and reaps the process.
	async fn kill(&mut self) -> Result<()>;

	/// OS pid, when the process is real (the fake has none).
	fn pid(&self) -> Option<u32>;
}

/// Spawns [`ProcessSpec`]s into [`SupervisedProcess`] handles.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
	async fn spawn(&self, spec: ProcessSpec) -> Result<Box<dyn SupervisedProcess>>;
}
