//! Patch and SARIF bookkeeping entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Review status of a proposed [`Patch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
	Proposed,
	Applied,
	Rejected,
}

/// A candidate fix produced by the (out-of-scope) patch-generation agent.
///
/// This system only reads `status`; it never writes one, since patch review
/// belongs to an external agent out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
	pub patch_id: String,
	pub task_id: String,
	pub diff_path: String,
	pub status: PatchStatus,
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A static-analysis report forwarded to downstream triage, unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifRecord {
	pub sarif_id: String,
	pub task_id: String,
	pub message_id: String,
	pub sarif: Value,
	pub metadata: Value,
}
