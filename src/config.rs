//! Build configuration.
//!
//! Everything is compiled in: the staging root, the destination and the
//! metadata policy. [`Config::load`] only anchors the relative defaults to the
//! directory the tool runs from.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::policy::PolicyConfig;

/// Staging sysroot, relative to the invocation directory.
pub const STAGING_DIR: &str = "sysroot";

/// Initrd destination, relative to the invocation directory.
pub const OUTPUT_PATH: &str = "sysroot/boot/seraph.initrd";

/// Initrd build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Directory tree archived into the image.
    pub staging_root: PathBuf,
    /// Where the finished archive is written.
    pub output: PathBuf,
    /// Ownership and permission rewrite rules.
    pub policy: PolicyConfig,
}

impl Config {
    /// Compiled-in configuration anchored at `base_dir`.
    pub fn load(base_dir: &Path) -> Self {
        Self {
            staging_root: base_dir.join(STAGING_DIR),
            output: base_dir.join(OUTPUT_PATH),
            policy: PolicyConfig::default(),
        }
    }

    /// Explicit paths with the default policy. Used by tests and embedders.
    pub fn new(staging_root: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
            output: output.into(),
            policy: PolicyConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Check if the staging root is available.
    pub fn has_staging_root(&self) -> bool {
        self.staging_root.is_dir()
    }

    /// Print configuration for `show config`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  STAGING_ROOT: {}", self.staging_root.display());
        println!("  OUTPUT: {}", self.output.display());
        if self.has_staging_root() {
            println!("  Staging root: FOUND");
        } else {
            println!("  Staging root: NOT FOUND (populate {} first)", STAGING_DIR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_anchors_defaults() {
        let config = Config::load(Path::new("/build"));
        assert_eq!(config.staging_root, PathBuf::from("/build/sysroot"));
        assert_eq!(config.output, PathBuf::from("/build/sysroot/boot/seraph.initrd"));
        assert_eq!(config.policy, PolicyConfig::default());
    }

    #[test]
    fn test_output_defaults_inside_staging() {
        let config = Config::load(Path::new("/build"));
        assert!(config.output.starts_with(&config.staging_root));
    }
}
