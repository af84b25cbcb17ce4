//! Tarball writer for initrd images.
//!
//! Wraps [`tar::Builder`] and writes one POSIX ustar header per
//! [`EntryDescriptor`], exactly as the policy left it. The kernel's ramdisk
//! driver reads `name`, `prefix`, `mode`, `uid`, `gid` and `size` straight
//! out of these headers, so nothing is inferred from the host here.

use anyhow::{Context, Result};
use std::io::{self, Read, Take, Write};
use std::path::PathBuf;
use tar::{Builder, EntryType, Header};

use crate::entry::{EntryDescriptor, EntryKind, OtherKind};

/// Archive name used for the image root.
pub const ROOT_ENTRY_NAME: &str = "/";

/// Streams entries into a tar archive.
pub struct TarballWriter<W: Write> {
    builder: Builder<W>,
    entries: usize,
}

impl<W: Write> TarballWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            builder: Builder::new(inner),
            entries: 0,
        }
    }

    /// Number of entries appended so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Append one entry. `content` is only read for regular files, and must
    /// supply at least [`EntryDescriptor::size`] bytes; anything past that is
    /// ignored.
    pub fn append<R: Read>(&mut self, entry: &EntryDescriptor, content: R) -> Result<()> {
        let mut header = header_for(entry)?;

        if entry.is_root() {
            // tar::Header::set_path refuses absolute names.
            header.as_old_mut().name[..ROOT_ENTRY_NAME.len()]
                .copy_from_slice(ROOT_ENTRY_NAME.as_bytes());
            header.set_cksum();
            self.builder
                .append(&header, io::empty())
                .context("Failed to write archive root entry")?;
            self.entries += 1;
            return Ok(());
        }

        let name = header_name(entry);
        let written = match entry.kind() {
            EntryKind::Regular => {
                let content = ExactLen::new(content, entry.size());
                self.builder.append_data(&mut header, &name, content)
            }
            EntryKind::Other(OtherKind::Symlink { target }) => {
                self.builder.append_link(&mut header, &name, target)
            }
            EntryKind::Other(OtherKind::HardLink { target }) => {
                self.builder.append_link(&mut header, &name, target)
            }
            _ => self.builder.append_data(&mut header, &name, io::empty()),
        };
        written.with_context(|| format!("Failed to write archive entry {}", name.display()))?;

        self.entries += 1;
        Ok(())
    }

    /// Write the end-of-archive marker and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.builder
            .into_inner()
            .context("Failed to finish initrd archive")
    }
}

/// Name written into the header. Directories get a trailing slash.
fn header_name(entry: &EntryDescriptor) -> PathBuf {
    let mut name = entry.path().to_os_string();
    if *entry.kind() == EntryKind::Directory {
        name.push("/");
    }
    PathBuf::from(name)
}

/// Reads exactly `len` bytes from a file whose size was recorded earlier.
///
/// Extra bytes (the file grew) are cut off; running out early (it shrank) is
/// an error, since the header already promised `len` bytes.
struct ExactLen<R> {
    inner: Take<R>,
    remaining: u64,
}

impl<R: Read> ExactLen<R> {
    fn new(inner: R, len: u64) -> Self {
        Self {
            inner: inner.take(len),
            remaining: len,
        }
    }
}

impl<R: Read> Read for ExactLen<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("content ended {} bytes short of its recorded size", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn header_for(entry: &EntryDescriptor) -> Result<Header> {
    let mut header = Header::new_ustar();
    header.set_mode(entry.mode);
    header.set_uid(entry.uid);
    header.set_gid(entry.gid);
    header.set_mtime(entry.mtime());
    header.set_size(entry.size());

    if let Some(owner) = &entry.owner_name {
        header
            .set_username(owner)
            .with_context(|| format!("Owner name {:?} does not fit in a tar header", owner))?;
    }
    if let Some(group) = &entry.group_name {
        header
            .set_groupname(group)
            .with_context(|| format!("Group name {:?} does not fit in a tar header", group))?;
    }

    let entry_type = match entry.kind() {
        EntryKind::Regular => EntryType::Regular,
        EntryKind::Directory => EntryType::Directory,
        EntryKind::Other(OtherKind::Symlink { .. }) => EntryType::Symlink,
        EntryKind::Other(OtherKind::HardLink { .. }) => EntryType::Link,
        EntryKind::Other(OtherKind::CharDevice { major, minor }) => {
            set_device(&mut header, *major, *minor)?;
            EntryType::Char
        }
        EntryKind::Other(OtherKind::BlockDevice { major, minor }) => {
            set_device(&mut header, *major, *minor)?;
            EntryType::Block
        }
        EntryKind::Other(OtherKind::Fifo) => EntryType::Fifo,
    };
    header.set_entry_type(entry_type);

    Ok(header)
}

fn set_device(header: &mut Header, major: u32, minor: u32) -> Result<()> {
    let context = || format!("Device number {}:{} does not fit in a tar header", major, minor);
    header.set_device_major(major).with_context(context)?;
    header.set_device_minor(minor).with_context(context)?;
    Ok(())
}
