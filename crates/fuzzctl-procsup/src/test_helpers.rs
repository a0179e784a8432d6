//! An in-process fake, mirroring the editor's `FakeLsp` test double so callers
//! of [`crate::ProcessSupervisor`] can be unit-tested without spawning real
//! child processes (container builds, real `afl-fuzz` binaries).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::{ProcessSpec, ProcessSupervisor, SupervisedProcess};

/// Spawns [`FakeProcess`] instead of real children; records every spec it was
/// asked to run so a test can assert on command lines without a shell.
#[derive(Default)]
pub struct FakeProcessSupervisor {
	pub spawned: Mutex<Vec<ProcessSpec>>,
	pub exit_code: i32,
}

impl FakeProcessSupervisor {
	pub fn new(exit_code: i32) -> Self {
		FakeProcessSupervisor {
			spawned: Mutex::new(Vec::new()),
			exit_code,
		}
	}
}

#[async_trait]
impl ProcessSupervisor for FakeProcessSupervisor {
	async fn spawn(&self, spec: ProcessSpec) -> Result<Box<dyn SupervisedProcess>> {
		self.spawned.lock().await.push(spec);
		Ok(Box::new(FakeProcess {
			exit_code: self.exit_code,
			killed: Arc::new(AtomicBool::new(false)),
			interrupted: Arc::new(AtomicBool::new(false)),
		}))
	}
}

pub struct FakeProcess {
	exit_code: i32,
	killed: Arc<AtomicBool>,
	interrupted: Arc<AtomicBool>,
}

#[async_trait]
impl SupervisedProcess for FakeProcess {
	async fn wait(&mut self) -> Result<i32> {
		if self.killed.load(Ordering::SeqCst) {
			Ok(-9)
		} else if self.interrupted.load(Ordering::SeqCst) {
			// Conventional shell exit code for a process terminated by SIGINT.
			Ok(130)
		} else {
			Ok(self.exit_code)
		}
	}

	async fn interrupt(&mut self) -> Result<()> {
		self.interrupted.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn kill(&mut self) -> Result<()> {
		self.killed.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn pid(&self) -> Option<u32> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn fake_supervisor_records_spec_and_returns_configured_exit_code() {
		let supervisor = FakeProcessSupervisor::new(0);
		let spec = ProcessSpec::new("afl-fuzz").arg("-i").arg("in");
		let mut process = supervisor.spawn(spec).await.unwrap();
		assert_eq!(process.wait().await.unwrap(), 0);
		assert_eq!(supervisor.spawned.lock().await.len(), 1);
	}

	#[tokio::test]
	async fn killed_fake_process_reports_negative_exit_code() {
		let supervisor = FakeProcessSupervisor::new(0);
		let mut process = supervisor.spawn(ProcessSpec::new("sleep")).await.unwrap();
		process.kill().await.unwrap();
		assert_eq!(process.wait().await.unwrap(), -9);
	}

	#[tokio::test]
	async fn interrupted_fake_process_reports_sigint_exit_code() {
		let supervisor = FakeProcessSupervisor::new(0);
		let mut process = supervisor.spawn(ProcessSpec::new("afl-fuzz")).await.unwrap();
		process.interrupt().await.unwrap();
		assert_eq!(process.wait().await.unwrap(), 130);
	}
}
