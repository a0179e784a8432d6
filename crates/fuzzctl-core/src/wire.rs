//! Broker wire formats: the JSON payloads carried on `task_broadcast`, `triage`,
//! `sarif`, and the inbound gateway cancel message.

use serde::{Deserialize, Serialize};

use crate::task::TaskType;

/// Payload published on the `task_broadcast` exchange when the scheduler dispatches a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBroadcast {
	pub task_id: String,
	pub task_type: TaskType,
	pub project_name: String,
	pub focus: String,
	pub repo: Vec<String>,
	pub fuzzing_tooling: String,
	/// Present only for delta tasks.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub diff: Option<String>,
}

/// Payload published on the `triage` exchange for one newly observed bug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageMessage {
	#[serde(flatten)]
	pub task: TaskBroadcast,
	pub bug_id: i64,
	pub poc_path: String,
	pub harness_name: String,
	pub sanitizer: String,
}

/// Payload published on the `sarif` exchange for one newly observed SARIF record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifMessage {
	#[serde(flatten)]
	pub task: TaskBroadcast,
	pub sarif_id: String,
	pub sarif_report: serde_json::Value,
}

/// Inbound gateway message carrying either a regular dispatch hint or a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "lowercase")]
pub enum InboundMessage {
	Cancel { task_id: String },
	#[serde(other)]
	Other,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn task_broadcast_omits_diff_for_full_tasks() {
		let msg = TaskBroadcast {
			task_id: "t1".into(),
			task_type: TaskType::Full,
			project_name: "libpng".into(),
			focus: "libpng".into(),
			repo: vec!["/tmp/t1/libpng".into()],
			fuzzing_tooling: "/tmp/t1/tooling".into(),
			diff: None,
		};
		let json = serde_json::to_string(&msg).unwrap();
		assert!(!json.contains("\"diff\""));
	}

	#[test]
	fn cancel_message_round_trips() {
		let raw = r#"{"task_id":"t1","task_type":"cancel"}"#;
		let parsed: InboundMessage = serde_json::from_str(raw).unwrap();
		match parsed {
			InboundMessage::Cancel { task_id } => assert_eq!(task_id, "t1"),
			InboundMessage::Other => panic!("expected Cancel"),
		}
	}

	#[test]
	fn triage_message_flattens_task_fields() {
		let msg = TriageMessage {
			task: TaskBroadcast {
				task_id: "t1".into(),
				task_type: TaskType::Full,
				project_name: "libpng".into(),
				focus: "libpng".into(),
				repo: vec!["/tmp/t1/libpng".into()],
				fuzzing_tooling: "/tmp/t1/tooling".into(),
				diff: None,
			},
			bug_id: 42,
			poc_path: "/crash/t1/h/address/deadbeef".into(),
			harness_name: "h".into(),
			sanitizer: "address".into(),
		};
		let json = serde_json::to_value(&msg).unwrap();
		assert_eq!(json["bug_id"], 42);
		assert_eq!(json["task_id"], "t1");
	}
}
