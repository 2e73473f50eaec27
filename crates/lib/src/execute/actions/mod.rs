//! In-process actions run by the engine.
//!
//! Commands go through the engine's [`CommandRunner`](super::command::CommandRunner);
//! everything else an operation does (downloads, extraction, directory
//! handling, merge preparation) lives here.

pub mod extract;
pub mod fetch;
pub mod fs;
pub mod merge;

pub use extract::Extraction;
pub use fetch::download;
pub use fs::{copy_tree, reset_dir};
pub use merge::{MergeRequest, merge_commands};
