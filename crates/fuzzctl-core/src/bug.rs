//! Crash bookkeeping entities: [`Bug`], [`BugProfile`], and the sanitizer → priority mapping.

use serde::{Deserialize, Serialize};

/// A persisted crash record.
///
/// `poc` is the content-addressed path written by the crash manager; it equals
/// `<crash_root>/<task_id>/<harness_name>/<sanitizer>/<md5(content)>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bug {
	pub id: i64,
	pub task_id: String,
	pub harness_name: String,
	pub sanitizer: String,
	pub architecture: String,
	pub poc: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Downstream triage enrichment attached 1:1 to a [`Bug`] once triage has run.
///
/// The builder and scheduler never populate this; they only guarantee the
/// [`Bug`] row exists for triage to attach it to later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugProfile {
	pub bug_id: i64,
	pub summary: String,
	pub cwe: Option<String>,
}

/// Broker priority (0-10 scale) for a bug's triage message, derived from its sanitizer.
///
/// Priority 3 is the fallback for any sanitizer outside `{address, memory, undefined}`,
/// treated as a catch-all rather than an error.
pub fn triage_priority(sanitizer: &str) -> u8 {
	match sanitizer {
		"address" => 4,
		"memory" => 2,
		"undefined" => 1,
		_ => 3,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_sanitizers_map_to_documented_priorities() {
		assert_eq!(triage_priority("address"), 4);
		assert_eq!(triage_priority("memory"), 2);
		assert_eq!(triage_priority("undefined"), 1);
	}

	#[test]
	fn unknown_sanitizer_falls_back_to_three() {
		assert_eq!(triage_priority("hwaddress"), 3);
		assert_eq!(triage_priority(""), 3);
	}
}
