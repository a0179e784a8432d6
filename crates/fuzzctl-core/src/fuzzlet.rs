//! The [`Fuzzlet`] tuple: one runnable task × harness × sanitizer × engine combination.

use serde::{Deserialize, Serialize};

/// Coverage-guided fuzzing engine that can drive a harness.
///
/// New engines are added by providing another implementation of the runner's
/// `Fuzzer` trait (see `fuzzctl-runner`), never by branching on this enum inside
/// the runner's supervision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzEngine {
	Afl,
}

/// One runnable fuzzing configuration, published by the builder and consumed by the runner.
///
/// Identified by its JSON serialisation within the `fuzzlets` KV set; two
/// fuzzlets with identical fields are the same fuzzlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fuzzlet {
	pub task_id: String,
	pub harness: String,
	pub sanitizer: String,
	pub fuzz_engine: FuzzEngine,
	pub artifact_path: String,
}

impl Fuzzlet {
	/// Canonical identity used for KV set membership: the JSON encoding of the fuzzlet.
	pub fn identity(&self) -> String {
		serde_json::to_string(self).expect("Fuzzlet fields are all serializable")
	}
}

/// One file discovered inside a harness's built-in `*_seed_corpus.zip`, emitted
/// as the builder unpacks it into the shared corpus store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMessage {
	pub task_id: String,
	pub harness: String,
	pub seed_path: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identical_fuzzlets_have_identical_identity() {
		let a = Fuzzlet {
			task_id: "t1".into(),
			harness: "h".into(),
			sanitizer: "address".into(),
			fuzz_engine: FuzzEngine::Afl,
			artifact_path: "/x".into(),
		};
		let b = a.clone();
		assert_eq!(a.identity(), b.identity());
	}
}
