//! Exportable trace context, carried through the KV store alongside a task ID.

use serde::{Deserialize, Serialize};
use tracing::field::Visit;
use uuid::Uuid;

/// A correlation identity for a task's lifetime, independent of any one process.
///
/// `trace_id` is stable for the whole task; `span_id` is re-minted at every
/// export so that re-importing it and opening a child span nests correctly in
/// log viewers that group by parent/child rather than by trace alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
	pub trace_id: Uuid,
	pub span_id: u64,
}

impl TraceContext {
	/// Starts a new trace for a task that has none yet.
	pub fn new() -> Self {
		TraceContext {
			trace_id: Uuid::new_v4(),
			span_id: random_span_id(),
		}
	}

	/// Round-trippable string form, suitable for a KV value.
	pub fn export(&self) -> String {
		format!("{}:{:016x}", self.trace_id, self.span_id)
	}

	/// Parses the string form produced by [`TraceContext::export`].
	pub fn import(value: &str) -> Option<Self> {
		let (trace_id, span_id) = value.split_once(':')?;
		Some(TraceContext {
			trace_id: Uuid::parse_str(trace_id).ok()?,
			span_id: u64::from_str_radix(span_id, 16).ok()?,
		})
	}

	/// Derives the next hop's context: same trace, fresh span.
	pub fn child(&self) -> Self {
		TraceContext {
			trace_id: self.trace_id,
			span_id: random_span_id(),
		}
	}
}

impl Default for TraceContext {
	fn default() -> Self {
		Self::new()
	}
}

fn random_span_id() -> u64 {
	// Not used for security purposes, just log correlation; collisions are
	// cosmetic (two spans briefly sharing an id in a viewer).
	let bytes = Uuid::new_v4();
	let (high, _) = bytes.as_u64_pair();
	high
}

/// Collects the first string-valued field recorded on a span/event, used to
/// pull a `task_id` back out of a `tracing::Span` for ambient logging.
#[derive(Default)]
pub struct FirstStringVisitor {
	pub value: Option<String>,
}

impl Visit for FirstStringVisitor {
	fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
		if self.value.is_none() && field.name() != "message" {
			self.value = Some(value.to_string());
		}
	}

	fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
		if self.value.is_none() && field.name() != "message" {
			self.value = Some(format!("{value:?}"));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn export_then_import_round_trips() {
		let ctx = TraceContext::new();
		let exported = ctx.export();
		let imported = TraceContext::import(&exported).unwrap();
		assert_eq!(ctx, imported);
	}

	#[test]
	fn child_keeps_trace_id_but_changes_span() {
		let ctx = TraceContext::new();
		let child = ctx.child();
		assert_eq!(ctx.trace_id, child.trace_id);
		assert_ne!(ctx.span_id, child.span_id);
	}

	#[test]
	fn import_rejects_malformed_input() {
		assert!(TraceContext::import("not-a-context").is_none());
		assert!(TraceContext::import("").is_none());
	}
}
