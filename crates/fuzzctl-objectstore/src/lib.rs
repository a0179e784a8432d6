//! Content-addressed artifact handling: download, extraction, patching, copy.

mod archive;
mod copy;
mod download;
mod error;
mod patch;

pub use archive::extract_archive;
pub use copy::copy_tree;
pub use download::download_verified;
pub use error::{ObjectStoreError, Result};
pub use patch::apply_patches;
