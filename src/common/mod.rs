//! Shared filesystem helpers.

pub mod paths;
pub mod temp;

pub use paths::{archive_name, ensure_parent_exists};
pub use temp::{replace_atomically, temp_artifact_path};
