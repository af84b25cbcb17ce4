//! Archive entry descriptors.
//!
//! One descriptor is created per staging entry, rewritten once by the
//! [`MetadataPolicy`](crate::policy::MetadataPolicy), then serialized by the
//! tarball writer. The archive name is fixed at construction; only ownership,
//! owner names and permission bits may change afterwards.

use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::PathBuf;

/// Permission bits recorded in the archive (setuid/setgid/sticky + rwx).
pub const PERMISSION_BITS: u32 = 0o7777;

/// Filesystem object kind behind an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Other(OtherKind),
}

/// Entries archived as-is, without content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtherKind {
    /// Symbolic link, target recorded verbatim.
    Symlink { target: PathBuf },
    /// Second name for an inode already in the archive.
    HardLink { target: OsString },
    CharDevice { major: u32, minor: u32 },
    BlockDevice { major: u32, minor: u32 },
    Fifo,
}

/// Metadata for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    path: OsString,
    kind: EntryKind,
    size: u64,
    mtime: u64,
    pub uid: u64,
    pub gid: u64,
    pub owner_name: Option<String>,
    pub group_name: Option<String>,
    pub mode: u32,
}

impl EntryDescriptor {
    /// Create a descriptor with explicit metadata.
    ///
    /// `path` is the archive-relative name (`bin/init`), empty for the image root.
    /// Names are raw bytes; they need not be UTF-8.
    pub fn new(path: impl Into<OsString>, kind: EntryKind, mode: u32, uid: u64, gid: u64) -> Self {
        Self {
            path: path.into(),
            kind,
            size: 0,
            mtime: 0,
            uid,
            gid,
            owner_name: None,
            group_name: None,
            mode: mode & PERMISSION_BITS,
        }
    }

    /// Describe a live staging entry.
    ///
    /// Returns `None` for sockets, which a tar archive cannot represent.
    /// Hard links are resolved by the caller, since that needs state across entries.
    pub fn from_metadata(path: impl Into<OsString>, meta: &Metadata) -> Option<Self> {
        let file_type = meta.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::Regular
        } else if file_type.is_symlink() {
            // Filled in by the builder after read_link.
            EntryKind::Other(OtherKind::Symlink {
                target: PathBuf::new(),
            })
        } else if file_type.is_char_device() {
            let (major, minor) = split_dev(meta.rdev());
            EntryKind::Other(OtherKind::CharDevice { major, minor })
        } else if file_type.is_block_device() {
            let (major, minor) = split_dev(meta.rdev());
            EntryKind::Other(OtherKind::BlockDevice { major, minor })
        } else if file_type.is_fifo() {
            EntryKind::Other(OtherKind::Fifo)
        } else {
            return None;
        };

        let size = if kind == EntryKind::Regular { meta.len() } else { 0 };
        let mut desc = Self::new(path, kind, meta.mode(), u64::from(meta.uid()), u64::from(meta.gid()))
            .with_size(size);
        desc.mtime = u64::try_from(meta.mtime()).unwrap_or(0);
        Some(desc)
    }

    /// Content length of a regular file, as recorded in its header.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Archive-relative name. Empty for the image root.
    pub fn path(&self) -> &OsStr {
        &self.path
    }

    /// The name as text, for policy matching. `None` if it is not UTF-8.
    pub fn path_str(&self) -> Option<&str> {
        self.path.to_str()
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Content length; zero for everything but regular files.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Set the symlink target read from the staging tree.
    pub(crate) fn set_link_target(&mut self, target: PathBuf) {
        if let EntryKind::Other(OtherKind::Symlink { target: slot }) = &mut self.kind {
            *slot = target;
        }
    }

    /// Record this entry as a hard link to an earlier archive name.
    pub(crate) fn into_hard_link(mut self, target: OsString) -> Self {
        self.kind = EntryKind::Other(OtherKind::HardLink { target });
        self.size = 0;
        self
    }
}

/// Split a Linux `dev_t` into (major, minor) using the glibc encoding.
fn split_dev(dev: u64) -> (u32, u32) {
    let major = ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff);
    let minor = (dev & 0xff) | ((dev >> 12) & !0xff);
    (major as u32, minor as u32)
}
