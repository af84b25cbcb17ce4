//! Seraph initrd packer.
//!
//! Archives the staging sysroot into a ustar initrd, rewriting ownership and
//! permissions so the image can be unpacked as root at boot.
//!
//! - [`entry`] - per-entry metadata descriptor
//! - [`policy`] - ownership/permission rewrite rules
//! - [`artifact`] - the tarball writer and initrd builder
//! - [`config`] - compiled-in paths and policy

pub mod artifact;
pub mod commands;
pub mod common;
pub mod config;
pub mod entry;
pub mod policy;

pub use artifact::initrd::{build_initrd, BuildSummary};
pub use config::Config;
pub use entry::{EntryDescriptor, EntryKind, OtherKind};
pub use policy::{HomeOwner, MetadataPolicy, PolicyConfig, PrefixMatch};
