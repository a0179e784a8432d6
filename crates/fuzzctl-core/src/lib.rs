//! Shared domain types, wire formats, and error taxonomy for the fuzzing control plane.
//!
//! Every other crate in this workspace depends on this one for the shared
//! entities and wire formats, so that the scheduler, builder, runner, and
//! crash manager agree on one definition of `Task`, `Source`, `Fuzzlet`, and
//! `Bug`.

pub mod bug;
pub mod error;
pub mod fuzzlet;
pub mod patch;
pub mod task;
pub mod wire;

pub use bug::{Bug, BugProfile, triage_priority};
pub use error::{Classify, ErrorKind};
pub use fuzzlet::{FuzzEngine, Fuzzlet, SeedMessage};
pub use patch::{Patch, PatchStatus, SarifRecord};
pub use task::{Source, SourceType, Task, TaskStatus, TaskType};
pub use wire::{InboundMessage, SarifMessage, TaskBroadcast, TriageMessage};
