//! Task building: download the task's sources, compile once per sanitizer
//! inside the project's container image, discover harnesses, and publish a
//! [`fuzzctl_core::Fuzzlet`] per harness × sanitizer combination.

mod compile;
mod consume_loop;
mod discover;
mod dockerfile;
mod error;
mod pipeline;
mod project;

pub use consume_loop::run as run_consume_loop;
pub use discover::{discover_harnesses, HarnessArtifact};
pub use dockerfile::rewrite_for_cmin;
pub use error::{BuilderError, Result};
pub use pipeline::{build_task, BuildConfig};
pub use project::ProjectYaml;
