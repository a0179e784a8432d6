//! Fuzzer instance supervision: consumes one project's `fuzzlet` deliveries,
//! runs the AFL++ master/slave topology against each, forwards discovered
//! crashes into bug registration, and replenishes the shared corpus store.

mod afl;
mod bugs;
mod consume_loop;
mod env;
mod error;
mod fuzzer;
mod layout;
mod pipeline;
mod stats;
mod watchdogs;

pub use afl::AflFuzzer;
pub use bugs::run_bug_registration;
pub use consume_loop::run as run_consume_loop;
pub use error::{Result, RunnerError};
pub use fuzzer::{FuzzRunSpec, Fuzzer};
pub use pipeline::{run_fuzzlet, RunnerConfig};
pub use watchdogs::{CRASH_CHANNEL_CAPACITY, SEED_CHANNEL_CAPACITY};
