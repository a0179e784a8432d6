//! `project.yaml` parsing: `<fuzz_tooling>/projects/<project>/project.yaml`
//! names the target language and the sanitizer list to build.

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectYaml {
	#[serde(default = "default_language")]
	pub language: String,
	#[serde(default)]
	pub sanitizers: Vec<String>,
}

fn default_language() -> String {
	"c++".to_string()
}

impl ProjectYaml {
	/// `language == "jvm"` means the builder skips the compile step entirely:
	/// JVM targets are built by a separate toolchain upstream.
	pub fn is_jvm(&self) -> bool {
		self.language == "jvm"
	}

	/// The sanitizer list to build, defaulting to `{address}` when the file
	/// doesn't name any.
	pub fn sanitizers(&self) -> Vec<String> {
		if self.sanitizers.is_empty() {
			vec!["address".to_string()]
		} else {
			self.sanitizers.clone()
		}
	}
}

pub fn load(tooling_dir: &Path, project_name: &str) -> Result<ProjectYaml> {
	let path = tooling_dir
		.join("projects")
		.join(project_name)
		.join("project.yaml");
	let contents = std::fs::read_to_string(&path)?;
	Ok(serde_yaml::from_str(&contents)?)
}
