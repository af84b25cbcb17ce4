//! CLI command handlers.
//!
//! - `build` - Pack the staging sysroot into the initrd (default)
//! - `show` - Display the compiled configuration and policy

pub mod build;
pub mod show;

pub use build::cmd_build;
pub use show::cmd_show;
