//! Layered configuration for the fuzzing control plane.
//!
//! Settings are enumerated, not free-form. Resolution order, lowest to highest
//! precedence:
//!
//! 1. Compiled-in defaults ([`Settings::default`]).
//! 2. An optional TOML file (`--config <path>` / `FUZZCTL_CONFIG`).
//! 3. `FUZZCTL_<SETTING>` environment variables.
//!
//! A setting with no default and no override anywhere in the chain is a
//! startup error: a control-plane process with half its configuration missing
//! must not limp along silently.

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use error::{ConfigError, Result};

/// Resolved configuration shared by every binary in the workspace.
///
/// Each binary only reads the subset of fields its component needs (the
/// scheduler never touches `core_count`, the runner never touches `db_url`).
#[derive(Debug, Clone)]
pub struct Settings {
	/// Total fuzzer cores: 1 master + `core_count - 1` slaves.
	pub core_count: usize,
	/// How many on-disk copies of a harness binary the runner places before
	/// fuzzing: unclear from the reference sources whether copies should be
	/// per-instance or shared, so it's left a tunable rather than hardcoded.
	pub harness_copies: usize,
	/// Root of the content-addressed artifact tree.
	pub storage_root: PathBuf,
	/// Root of the content-addressed crash tree; defaults under `storage_root`.
	pub crash_root: PathBuf,
	/// Root for per-task working directories.
	pub work_root: PathBuf,
	pub broker_url: String,
	pub kv_url: String,
	pub db_url: String,
	pub management_url: String,
	pub download_retries: u32,
	pub build_retries: u32,
	pub task_failure_retries: u32,
	pub build_timeout: Duration,
	pub graceful_ratio: f64,
	pub poll_interval: Duration,
	/// Port for the scheduler's health/control HTTP surface.
	pub health_port: u16,
}

impl Settings {
	fn defaults() -> PartialSettings {
		PartialSettings {
			core_count: Some(num_cpus()),
			harness_copies: Some(1),
			storage_root: Some("/var/lib/fuzzctl/storage".into()),
			crash_root: None,
			work_root: Some("/tmp/fuzzctl".into()),
			broker_url: None,
			kv_url: None,
			db_url: None,
			management_url: None,
			download_retries: Some(3),
			build_retries: Some(3),
			task_failure_retries: Some(3),
			build_timeout_secs: Some(4 * 60 * 60),
			graceful_ratio: Some(0.9),
			poll_interval_secs: Some(5),
			health_port: Some(8080),
		}
	}

	/// Loads settings from defaults, an optional file, then environment overrides.
	pub fn load(config_path: Option<&Path>) -> Result<Self> {
		let mut partial = Self::defaults();

		if let Some(path) = config_path {
			partial.merge(Self::from_file(path)?);
		}

		partial.merge(Self::from_env());

		partial.finalize()
	}

	fn from_file(path: &Path) -> Result<PartialSettings> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.display().to_string(),
			error,
		})?;
		toml::from_str(&text).map_err(|error| ConfigError::Toml {
			path: path.display().to_string(),
			error,
		})
	}

	fn from_env() -> PartialSettings {
		let env_string = |key: &str| std::env::var(format!("FUZZCTL_{key}")).ok();
		let env_num = |key: &str| env_string(key).and_then(|v| v.parse().ok());

		PartialSettings {
			core_count: env_num("CORE_COUNT"),
			harness_copies: env_num("HARNESS_COPIES"),
			storage_root: env_string("STORAGE_ROOT").map(PathBuf::from),
			crash_root: env_string("CRASH_ROOT").map(PathBuf::from),
			work_root: env_string("WORK_ROOT").map(PathBuf::from),
			broker_url: env_string("BROKER_URL"),
			kv_url: env_string("KV_URL"),
			db_url: env_string("DB_URL"),
			management_url: env_string("MANAGEMENT_URL"),
			download_retries: env_num("DOWNLOAD_RETRIES"),
			build_retries: env_num("BUILD_RETRIES"),
			task_failure_retries: env_num("TASK_FAILURE_RETRIES"),
			build_timeout_secs: env_num("BUILD_TIMEOUT_SECS"),
			graceful_ratio: env_num("GRACEFUL_RATIO"),
			poll_interval_secs: env_num("POLL_INTERVAL_SECS"),
			health_port: env_num("HEALTH_PORT"),
		}
	}
}

/// Mirrors [`Settings`] with every field optional, for progressive layering.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialSettings {
	core_count: Option<usize>,
	harness_copies: Option<usize>,
	storage_root: Option<PathBuf>,
	crash_root: Option<PathBuf>,
	work_root: Option<PathBuf>,
	broker_url: Option<String>,
	kv_url: Option<String>,
	db_url: Option<String>,
	management_url: Option<String>,
	download_retries: Option<u32>,
	build_retries: Option<u32>,
	task_failure_retries: Option<u32>,
	build_timeout_secs: Option<u64>,
	graceful_ratio: Option<f64>,
	poll_interval_secs: Option<u64>,
	health_port: Option<u16>,
}

impl PartialSettings {
	/// Overlays `other` on top of `self`; fields present in `other` win.
	fn merge(&mut self, other: PartialSettings) {
		macro_rules! take {
			($field:ident) => {
				if other.$field.is_some() {
					self.$field = other.$field;
				}
			};
		}
		take!(core_count);
		take!(harness_copies);
		take!(storage_root);
		take!(crash_root);
		take!(work_root);
		take!(broker_url);
		take!(kv_url);
		take!(db_url);
		take!(management_url);
		take!(download_retries);
		take!(build_retries);
		take!(task_failure_retries);
		take!(build_timeout_secs);
		take!(graceful_ratio);
		take!(poll_interval_secs);
		take!(health_port);
	}

	fn finalize(self) -> Result<Settings> {
		let require = |value: Option<String>, name: &str| {
			value.ok_or_else(|| ConfigError::MissingField(name.to_string()))
		};

		let storage_root = self
			.storage_root
			.ok_or_else(|| ConfigError::MissingField("storage_root".into()))?;
		let crash_root = self
			.crash_root
			.unwrap_or_else(|| storage_root.join("crashes"));

		Ok(Settings {
			core_count: self
				.core_count
				.ok_or_else(|| ConfigError::MissingField("core_count".into()))?,
			harness_copies: self
				.harness_copies
				.ok_or_else(|| ConfigError::MissingField("harness_copies".into()))?,
			crash_root,
			storage_root,
			work_root: self
				.work_root
				.ok_or_else(|| ConfigError::MissingField("work_root".into()))?,
			broker_url: require(self.broker_url, "broker_url")?,
			kv_url: require(self.kv_url, "kv_url")?,
			db_url: require(self.db_url, "db_url")?,
			management_url: require(self.management_url, "management_url")?,
			download_retries: self
				.download_retries
				.ok_or_else(|| ConfigError::MissingField("download_retries".into()))?,
			build_retries: self
				.build_retries
				.ok_or_else(|| ConfigError::MissingField("build_retries".into()))?,
			task_failure_retries: self
				.task_failure_retries
				.ok_or_else(|| ConfigError::MissingField("task_failure_retries".into()))?,
			build_timeout: Duration::from_secs(self.build_timeout_secs.ok_or_else(|| {
				ConfigError::MissingField("build_timeout_secs".into())
			})?),
			graceful_ratio: self
				.graceful_ratio
				.ok_or_else(|| ConfigError::MissingField("graceful_ratio".into()))?,
			poll_interval: Duration::from_secs(self.poll_interval_secs.ok_or_else(|| {
				ConfigError::MissingField("poll_interval_secs".into())
			})?),
			health_port: self
				.health_port
				.ok_or_else(|| ConfigError::MissingField("health_port".into()))?,
		})
	}
}

fn num_cpus() -> usize {
	std::thread::available_parallelism()
		.map(std::num::NonZeroUsize::get)
		.unwrap_or(1)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn write_toml(contents: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		file
	}

	#[test]
	fn missing_urls_fail_fast() {
		let err = Settings::load(None).unwrap_err();
		assert!(matches!(err, ConfigError::MissingField(ref f) if f == "broker_url"));
	}

	#[test]
	fn file_values_fill_required_fields() {
		let file = write_toml(
			r#"
			broker_url = "amqp://localhost:5672"
			kv_url = "redis://localhost:6379"
			db_url = "sqlite://fuzzctl.db"
			management_url = "http://localhost:15672"
			"#,
		);
		let settings = Settings::load(Some(file.path())).unwrap();
		assert_eq!(settings.broker_url, "amqp://localhost:5672");
		assert_eq!(settings.download_retries, 3);
		assert_eq!(settings.graceful_ratio, 0.9);
	}

	#[test]
	fn env_overrides_file() {
		let file = write_toml(
			r#"
			broker_url = "amqp://file/"
			kv_url = "redis://file/"
			db_url = "sqlite://file.db"
			management_url = "http://file/"
			"#,
		);
		// SAFETY: test-only, single-threaded set/remove of a process-global env var.
		unsafe {
			std::env::set_var("FUZZCTL_BROKER_URL", "amqp://env/");
		}
		let settings = Settings::load(Some(file.path())).unwrap();
		unsafe {
			std::env::remove_var("FUZZCTL_BROKER_URL");
		}
		assert_eq!(settings.broker_url, "amqp://env/");
		assert_eq!(settings.kv_url, "redis://file/");
	}

	#[test]
	fn crash_root_defaults_under_storage_root() {
		let file = write_toml(
			r#"
			storage_root = "/data/storage"
			broker_url = "amqp://x/"
			kv_url = "redis://x/"
			db_url = "sqlite://x.db"
			management_url = "http://x/"
			"#,
		);
		let settings = Settings::load(Some(file.path())).unwrap();
		assert_eq!(settings.crash_root, PathBuf::from("/data/storage/crashes"));
	}
}
