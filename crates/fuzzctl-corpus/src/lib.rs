//! Dictionary merge and seed corpus aggregation (C11). Both are pure
//! filesystem operations with no subprocess or network involved.

mod dictionary;
mod error;
mod seeds;

pub use dictionary::merge_dictionaries;
pub use error::{CorpusError, Result};
pub use seeds::aggregate_seed_corpus;
