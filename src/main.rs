//! seraph-initrd - packs the Seraph staging sysroot into the boot initrd.
//!
//! Running with no arguments builds `sysroot/boot/seraph.initrd` from
//! `sysroot/`, with every entry owned by root except the user's home
//! directory, and `/bin/init` restricted to its owner.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use seraph_initrd::commands;
use seraph_initrd::config::Config;

#[derive(Parser)]
#[command(name = "seraph-initrd")]
#[command(about = "Seraph initrd packer")]
#[command(
    after_help = "QUICK START:\n  seraph-initrd              Build sysroot/boot/seraph.initrd\n  seraph-initrd show policy  Print the ownership/permission rules"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Diagnostic log filter (e.g. debug, seraph_initrd=trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the initrd (default)
    Build,

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show staging root and output paths
    Config,
    /// Show the metadata rewrite policy
    Policy {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let base_dir = std::env::current_dir()?;
    let config = Config::load(&base_dir);

    match cli.command {
        None | Some(Commands::Build) => {
            commands::cmd_build(&config)?;
        }

        Some(Commands::Show { what }) => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Policy { json } => commands::show::ShowTarget::Policy { json },
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
