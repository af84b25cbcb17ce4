//! Shared test utilities for seraph-initrd tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use seraph_initrd::{Config, PolicyConfig};

/// Test environment with a temporary staging sysroot.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Staging sysroot (archive source)
    pub staging: PathBuf,
    /// Base directory (invocation directory simulation)
    pub base_dir: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with an empty staging root.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();
        let staging = base_dir.join("sysroot");
        fs::create_dir_all(&staging).expect("Failed to create staging dir");

        Self {
            _temp_dir: temp_dir,
            staging,
            base_dir,
        }
    }

    /// Output path outside the staging tree.
    pub fn output(&self) -> PathBuf {
        self.base_dir.join("out/seraph.initrd")
    }

    /// Config writing to [`TestEnv::output`] with the given policy.
    pub fn config(&self, policy: PolicyConfig) -> Config {
        Config::new(&self.staging, self.output()).with_policy(policy)
    }

    /// Create a file in the staging tree with the given mode.
    pub fn file(&self, rel: &str, content: &str, mode: u32) -> PathBuf {
        let path = self.staging.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write staging file");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))
            .expect("Failed to set permissions");
        path
    }

    /// Create a directory in the staging tree.
    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.staging.join(rel);
        fs::create_dir_all(&path).expect("Failed to create staging dir");
        path
    }
}

/// Create the three-file tree used throughout the tests.
pub fn create_mock_sysroot(env: &TestEnv) {
    env.file("bin/init", "#!/bin/sh\necho init\n", 0o755);
    env.file("home/gk/file.txt", "hello\n", 0o644);
    env.file("etc/motd", "Welcome to Seraph\n", 0o644);
}

/// Metadata of one entry read back from a built archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedEntry {
    /// Archive name without trailing slash (lossy for non-UTF-8); `/` for the root entry.
    pub name: String,
    /// Name bytes exactly as stored in the header.
    pub raw_name: Vec<u8>,
    pub entry_type: tar::EntryType,
    pub uid: u64,
    pub gid: u64,
    pub mode: u32,
    pub uname: Option<String>,
    pub gname: Option<String>,
    pub link: Option<String>,
    pub content: Vec<u8>,
}

/// Read every entry of an archive, in archive order.
pub fn read_archive(path: &Path) -> Vec<ArchivedEntry> {
    let file = fs::File::open(path).expect("Failed to open archive");
    let mut archive = tar::Archive::new(file);
    let mut out = Vec::new();

    for entry in archive.entries().expect("Failed to read archive") {
        let mut entry = entry.expect("Corrupt archive entry");
        let raw_name = entry.path_bytes().into_owned();
        let name = match raw_name.as_slice() {
            b"/" => "/".to_string(),
            raw => String::from_utf8_lossy(raw.strip_suffix(b"/").unwrap_or(raw)).into_owned(),
        };

        let header = entry.header().clone();
        let link = entry
            .link_name()
            .expect("Bad link name")
            .map(|l| l.to_string_lossy().to_string());
        let mut content = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut content).expect("Failed to read content");

        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        out.push(ArchivedEntry {
            name,
            raw_name,
            entry_type: header.entry_type(),
            uid: header.uid().expect("Bad uid"),
            gid: header.gid().expect("Bad gid"),
            mode: header.mode().expect("Bad mode"),
            uname: non_empty(header.username().expect("Bad uname")),
            gname: non_empty(header.groupname().expect("Bad gname")),
            link,
            content,
        });
    }
    out
}

/// Find an entry by name, panicking with the archive listing if absent.
pub fn find<'a>(entries: &'a [ArchivedEntry], name: &str) -> &'a ArchivedEntry {
    entries.iter().find(|e| e.name == name).unwrap_or_else(|| {
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        panic!("Entry {:?} not in archive. Entries: {:?}", name, names)
    })
}

/// Assert uid/gid/mode of a named entry.
pub fn assert_entry_meta(entries: &[ArchivedEntry], name: &str, uid: u64, gid: u64, mode: u32) {
    let entry = find(entries, name);
    assert_eq!(
        (entry.uid, entry.gid, entry.mode),
        (uid, gid, mode),
        "Entry {} has uid/gid/mode {}:{} {:o}, expected {}:{} {:o}",
        name,
        entry.uid,
        entry.gid,
        entry.mode,
        uid,
        gid,
        mode
    );
}
