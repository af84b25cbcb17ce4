//! Artifact builders.
//!
//! - `initrd` - walks the staging sysroot and produces the boot tarball
//! - `tarball` - ustar writer the builder streams entries into

pub mod initrd;
pub mod tarball;
