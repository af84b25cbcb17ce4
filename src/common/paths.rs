//! Path helpers for archive names and output locations.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path};

/// Ensure all parent directories of a file exist.
///
/// Does nothing for paths without a parent.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Convert a path relative to the staging root into an archive name.
///
/// Components are joined with `/`; the root itself maps to the empty string.
/// Names are kept byte-for-byte, UTF-8 or not. Paths that escape the root
/// are rejected.
pub fn archive_name(rel: &Path) -> Result<OsString> {
    let mut name = OsString::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                if !name.is_empty() {
                    name.push("/");
                }
                name.push(part);
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => {
                bail!("Path escapes the staging root: {}", rel.display());
            }
        }
    }
    Ok(name)
}
