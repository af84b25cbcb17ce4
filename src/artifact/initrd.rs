//! Initrd builder.
//!
//! Packs the staging sysroot into a single tarball the kernel unpacks at boot:
//!
//! ```text
//! sysroot/                       seraph.initrd
//!   bin/init     (0755 me:me) ->   bin/init          0700 root:root
//!   etc/motd     (0644 me:me) ->   etc/motd          0644 root:root
//!   home/gk/...  (0644 me:me) ->   home/gk/...       0644 1:100
//! ```
//!
//! Entries are visited depth-first with siblings sorted by name, so two
//! builds of the same tree produce the same entry order and metadata.
//! The archive is written to `<output>.tmp` and renamed into place only once
//! it is complete; a failed build never leaves a file at the destination.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::tarball::TarballWriter;
use crate::common::{archive_name, ensure_parent_exists, replace_atomically, temp_artifact_path};
use crate::config::Config;
use crate::entry::{EntryDescriptor, EntryKind, OtherKind};
use crate::policy::MetadataPolicy;

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Final archive location.
    pub output: PathBuf,
    /// Entries written, including the root directory.
    pub entries: usize,
    /// Staging entries a tar archive cannot hold (sockets).
    pub skipped: usize,
    /// Archive size in bytes.
    pub size: u64,
}

/// Build the initrd described by `config`.
pub fn build_initrd(config: &Config) -> Result<BuildSummary> {
    let staging = &config.staging_root;
    if !staging.exists() {
        bail!(
            "Staging root not found: {}\nPopulate the sysroot before packing the initrd.",
            staging.display()
        );
    }
    if !staging.is_dir() {
        bail!("Staging root is not a directory: {}", staging.display());
    }
    let staging = fs::canonicalize(staging)
        .with_context(|| format!("Failed to resolve staging root {}", staging.display()))?;

    ensure_parent_exists(&config.output)?;
    let output = resolve_output(&config.output)?;
    let temp = temp_artifact_path(&output);

    let policy = MetadataPolicy::new(config.policy.clone());
    let exclude = [output.clone(), temp.clone()];

    let stats = replace_atomically(&output, &temp, |dest| {
        write_archive(&staging, dest, &exclude, &policy)
    })?;

    let size = fs::metadata(&output)
        .with_context(|| format!("Failed to stat {}", output.display()))?
        .len();

    Ok(BuildSummary {
        output,
        entries: stats.entries,
        skipped: stats.skipped,
        size,
    })
}

#[derive(Debug, Default)]
struct ArchiveStats {
    entries: usize,
    skipped: usize,
}

/// Canonical form of the destination, so it can be recognised during the walk.
///
/// The parent must already exist.
fn resolve_output(output: &Path) -> Result<PathBuf> {
    let Some(file_name) = output.file_name() else {
        bail!("Output path has no file name: {}", output.display());
    };
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent = fs::canonicalize(parent)
        .with_context(|| format!("Failed to resolve output directory {}", parent.display()))?;
    Ok(parent.join(file_name))
}

/// Walk `staging` and write every entry to a fresh archive at `dest`.
fn write_archive(
    staging: &Path,
    dest: &Path,
    exclude: &[PathBuf],
    policy: &MetadataPolicy,
) -> Result<ArchiveStats> {
    let file = File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut writer = TarballWriter::new(BufWriter::new(file));
    let mut stats = ArchiveStats::default();
    // (dev, ino) -> first archive name, for files with several links.
    let mut seen_inodes: HashMap<(u64, u64), OsString> = HashMap::new();

    for entry in WalkDir::new(staging).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read staging tree {}", staging.display()))?;
        let path = entry.path();

        if exclude.iter().any(|p| p == path) {
            debug!(path = %path.display(), "skipping initrd output inside staging tree");
            continue;
        }

        let rel = path
            .strip_prefix(staging)
            .with_context(|| format!("{} is outside the staging root", path.display()))?;
        let name = archive_name(rel)?;
        let meta = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

        let Some(mut desc) = EntryDescriptor::from_metadata(name, &meta) else {
            warn!(path = %path.display(), "sockets cannot be archived, skipping");
            stats.skipped += 1;
            continue;
        };

        match desc.kind() {
            EntryKind::Other(OtherKind::Symlink { .. }) => {
                let target = fs::read_link(path)
                    .with_context(|| format!("Failed to read symlink {}", path.display()))?;
                desc.set_link_target(target);
            }
            EntryKind::Regular if meta.nlink() > 1 => {
                let key = (meta.dev(), meta.ino());
                if let Some(first) = seen_inodes.get(&key) {
                    desc = desc.into_hard_link(first.clone());
                } else {
                    seen_inodes.insert(key, desc.path().to_os_string());
                }
            }
            _ => {}
        }

        let desc = policy.rewrite(desc);
        debug!(
            path = %desc.path().to_string_lossy(),
            uid = desc.uid,
            gid = desc.gid,
            mode = %format!("{:04o}", desc.mode),
            "archiving entry"
        );

        if *desc.kind() == EntryKind::Regular {
            let content =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            writer.append(&desc, content)?;
        } else {
            writer.append(&desc, io::empty())?;
        }
    }

    stats.entries = writer.entries();
    let buffered = writer.finish()?;
    let file = buffered
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to flush {}", dest.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", dest.display()))?;

    Ok(stats)
}
