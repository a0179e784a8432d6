//! The production [`ProcessSupervisor`], backed by `tokio::process::Command`.

use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Child;

use crate::error::{ProcSupError, Result};
use crate::{ProcessSpec, ProcessSupervisor, SupervisedProcess};

#[derive(Debug, Default)]
pub struct TokioProcessSupervisor;

/// Every subprocess this workspace spawns (container builds, `afl-fuzz`
/// instances) inherits the parent environment minus telemetry variables, so a
/// collector endpoint configured for this process never silently propagates
/// into a container image or fuzzer instance that has no business exporting
/// anywhere.
fn filtered_inherited_env() -> Vec<(String, String)> {
	std::env::vars()
		.filter(|(key, _)| !(key.starts_with("OTEL_") || key.starts_with("OTLP_")))
		.collect()
}

#[async_trait]
impl ProcessSupervisor for TokioProcessSupervisor {
	async fn spawn(&self, spec: ProcessSpec) -> Result<Box<dyn SupervisedProcess>> {
		let mut command = tokio::process::Command::new(&spec.program);
		command.args(&spec.args);
		if let Some(cwd) = &spec.cwd {
			command.current_dir(cwd);
		}
		command.env_clear();
		command.envs(filtered_inherited_env());
		for (key, value) in &spec.env {
			command.env(key, value);
		}

		let log_file = match &spec.log_file {
			Some(path) => {
				let file = tokio::fs::OpenOptions::new()
					.create(true)
					.append(true)
					.open(path)
					.await
					.map_err(|source| ProcSupError::LogFile {
						path: path.display().to_string(),
						source,
					})?;
				Some(file.into_std().await)
			}
			None => None,
		};

		match &log_file {
			Some(file) => {
				command.stdout(Stdio::from(file.try_clone().map_err(ProcSupError::Wait)?));
				command.stderr(Stdio::from(file.try_clone().map_err(ProcSupError::Wait)?));
			}
			None => {
				command.stdout(Stdio::piped());
				command.stderr(Stdio::piped());
			}
		}

		let child = command.spawn().map_err(|source| ProcSupError::Spawn {
			program: spec.program.clone(),
			source,
		})?;

		Ok(Box::new(RealProcess { child }))
	}
}

struct RealProcess {
	child: Child,
}

#[async_trait]
impl SupervisedProcess for RealProcess {
	async fn wait(&mut self) -> Result<i32> {
		let status = self.child.wait().await?;
		Ok(status.code().unwrap_or(-1))
	}

	async fn interrupt(&mut self) -> Result<()> {
		let Some(pid) = self.child.id() else {
			return Ok(());
		};
		signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(|source| ProcSupError::Signal { pid, source })?;
		Ok(())
	}

	async fn kill(&mut self) -> Result<()> {
		self.child.start_kill().ok();
		self.child.wait().await?;
		Ok(())
	}

	fn pid(&self) -> Option<u32> {
		self.child.id()
	}
}
