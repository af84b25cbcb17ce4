//! Build command - packs the initrd.

use anyhow::Result;
use std::time::Instant;

use crate::artifact::initrd::{build_initrd, BuildSummary};
use crate::config::Config;

/// Execute the build command.
pub fn cmd_build(config: &Config) -> Result<BuildSummary> {
    println!("generating initrd.");
    let start = Instant::now();

    let summary = build_initrd(config)?;

    println!("  Output: {}", summary.output.display());
    println!("  Entries: {}", summary.entries);
    if summary.skipped > 0 {
        println!("  Skipped: {} (sockets)", summary.skipped);
    }
    println!("  Size: {} KB", summary.size / 1024);
    println!("  [{:.1}s] initrd", start.elapsed().as_secs_f64());

    Ok(summary)
}
