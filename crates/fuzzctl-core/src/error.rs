//! The shared error-kind taxonomy.
//!
//! Every crate in this workspace defines its own `thiserror`-derived error enum
//! for its own operations; this module defines the cross-cutting *kind*
//! classification so callers can decide retry/terminal handling generically
//! without matching on every crate's concrete variants.

/// Which of the five kinds an error belongs to.
///
/// The scheduler and builder use this to decide whether a failure increments a
/// task's `failure_count`, fails the task immediately, or is just logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Broker/KV/HTTP/subprocess failure that is worth retrying up to a cap.
	Transient,
	/// SHA mismatch or malformed archive; the artifact cannot be trusted, no retry.
	Integrity,
	/// Bad task_type, missing required source, unknown sanitizer; no retry.
	Validation,
	/// failure_count or budget exhausted; terminal for this attempt.
	ResourceExhaustion,
	/// Unreachable state; the owning worker should be restarted by its supervisor.
	Programming,
}

/// Implemented by each crate's error enum so generic callers (mainly the
/// scheduler's task routine) can classify an error without a crate dependency
/// cycle back into every producer.
pub trait Classify {
	fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	struct Dummy(ErrorKind);

	impl Classify for Dummy {
		fn kind(&self) -> ErrorKind {
			self.0
		}
	}

	#[test]
	fn classify_returns_the_wrapped_kind() {
		assert_eq!(Dummy(ErrorKind::Integrity).kind(), ErrorKind::Integrity);
	}
}
