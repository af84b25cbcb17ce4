//! Ownership and permission rewrite policy for initrd entries.
//!
//! The staging sysroot is populated by an unprivileged build, so its on-disk
//! owners and modes say nothing about what the booted system should see.
//! Every entry passes through [`MetadataPolicy::rewrite`], which applies, in
//! order:
//!
//! 1. uid/gid reset to 0
//! 2. owner/group names set to `root` (if enabled)
//! 3. exact-path permission overrides (e.g. `bin/init` -> 0700)
//! 4. uid/gid override for a home directory prefix (if configured)
//!
//! Later rules win for the fields they touch. The policy never filters entries
//! and never touches names, kinds or content.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::entry::{EntryDescriptor, PERMISSION_BITS};

/// Path of the first userspace process in the image.
pub const INIT_PATH: &str = "bin/init";

/// Owner-only rwx.
pub const INIT_MODE: u32 = 0o700;

/// Home directory handed to the unprivileged user.
pub const HOME_PREFIX: &str = "home/gk";
pub const HOME_UID: u64 = 1;
pub const HOME_GID: u64 = 100;

/// Symbolic name recorded when [`PolicyConfig::symbolic_root_names`] is set.
pub const ROOT_NAME: &str = "root";

/// How a home prefix is compared against an archive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMatch {
    /// Plain string prefix: `home/gk` also matches `home/gk-extra`.
    Literal,
    /// Whole path components: `home/gk` and `home/gk/...` only.
    Segment,
}

impl PrefixMatch {
    pub fn matches(self, prefix: &str, path: &str) -> bool {
        match self {
            PrefixMatch::Literal => path.starts_with(prefix),
            PrefixMatch::Segment => {
                let prefix = prefix.trim_end_matches('/');
                match path.strip_prefix(prefix) {
                    Some(rest) => rest.is_empty() || rest.starts_with('/'),
                    None => false,
                }
            }
        }
    }
}

/// Fixed non-root owner for everything under one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeOwner {
    pub prefix: String,
    pub uid: u64,
    pub gid: u64,
    pub matching: PrefixMatch,
}

impl HomeOwner {
    pub fn new(prefix: impl Into<String>, uid: u64, gid: u64) -> Self {
        Self {
            prefix: prefix.into(),
            uid,
            gid,
            matching: PrefixMatch::Segment,
        }
    }

    pub fn with_matching(mut self, matching: PrefixMatch) -> Self {
        self.matching = matching;
        self
    }

    pub fn covers(&self, path: &str) -> bool {
        self.matching.matches(&self.prefix, path)
    }
}

/// Static configuration for [`MetadataPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyConfig {
    /// Record `root`/`root` as owner and group names on every entry.
    pub symbolic_root_names: bool,
    /// Exact archive path -> permission bits.
    pub restricted_modes: BTreeMap<String, u32>,
    /// Optional uid/gid override for a home directory subtree.
    pub home_owner: Option<HomeOwner>,
}

impl PolicyConfig {
    /// uid/gid reset only.
    pub fn ownership_reset() -> Self {
        Self {
            symbolic_root_names: false,
            restricted_modes: BTreeMap::new(),
            home_owner: None,
        }
    }

    /// uid/gid reset plus `root` owner names.
    pub fn symbolic_root() -> Self {
        Self {
            symbolic_root_names: true,
            ..Self::ownership_reset()
        }
    }

    /// `root` owner names plus an owner-only `bin/init`.
    pub fn restricted_init() -> Self {
        Self::symbolic_root().restrict(INIT_PATH, INIT_MODE)
    }

    /// Restricted `bin/init` plus the home directory owner, without owner names.
    pub fn home_override() -> Self {
        Self {
            home_owner: Some(HomeOwner::new(HOME_PREFIX, HOME_UID, HOME_GID)),
            ..Self::ownership_reset().restrict(INIT_PATH, INIT_MODE)
        }
    }

    /// Add (or replace) an exact-path permission override.
    pub fn restrict(mut self, path: impl Into<String>, mode: u32) -> Self {
        self.restricted_modes.insert(path.into(), mode & PERMISSION_BITS);
        self
    }

    pub fn with_home_owner(mut self, owner: HomeOwner) -> Self {
        self.home_owner = Some(owner);
        self
    }

    pub fn with_symbolic_root_names(mut self, enabled: bool) -> Self {
        self.symbolic_root_names = enabled;
        self
    }

    /// Print the policy for `show policy`.
    pub fn print(&self) {
        println!("Metadata policy:");
        println!("  uid/gid reset: 0/0 (always)");
        println!(
            "  owner names: {}",
            if self.symbolic_root_names {
                "root/root"
            } else {
                "not recorded"
            }
        );
        if self.restricted_modes.is_empty() {
            println!("  restricted paths: none");
        } else {
            println!("  restricted paths:");
            for (path, mode) in &self.restricted_modes {
                println!("    {} -> {:04o}", path, mode);
            }
        }
        match &self.home_owner {
            Some(home) => println!(
                "  home owner: {} -> {}:{} ({:?} prefix match)",
                home.prefix, home.uid, home.gid, home.matching
            ),
            None => println!("  home owner: none"),
        }
    }
}

impl Default for PolicyConfig {
    /// Every rule enabled: the presets never combine owner names with the
    /// home override, but nothing prevents it.
    fn default() -> Self {
        Self::home_override().with_symbolic_root_names(true)
    }
}

/// Rewrites entry metadata according to a [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct MetadataPolicy {
    config: PolicyConfig,
}

impl MetadataPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Apply the policy to one entry. Total: never fails, never drops the entry.
    pub fn rewrite(&self, mut entry: EntryDescriptor) -> EntryDescriptor {
        entry.uid = 0;
        entry.gid = 0;

        if self.config.symbolic_root_names {
            entry.owner_name = Some(ROOT_NAME.to_string());
            entry.group_name = Some(ROOT_NAME.to_string());
        }

        // Table keys and the home prefix are text; a name that is not UTF-8
        // can match neither.
        let Some(path) = entry.path_str() else {
            return entry;
        };

        let restricted = self.config.restricted_modes.get(path).copied();
        let home = self
            .config
            .home_owner
            .as_ref()
            .filter(|home| !path.is_empty() && home.covers(path));

        if let Some(mode) = restricted {
            entry.mode = mode;
        }
        if let Some(home) = home {
            entry.uid = home.uid;
            entry.gid = home.gid;
        }

        entry
    }
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
