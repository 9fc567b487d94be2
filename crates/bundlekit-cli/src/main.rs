//! bundlekit - split and shard modular app bundles

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bundlekit_cli::cmd;
use bundlekit_cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Split {
            modules,
            config,
            output,
            fuse,
        } => cmd::split::split(&modules, config.as_deref(), &output, fuse),
        Commands::Shard {
            modules,
            config,
            output,
        } => cmd::shard::shard(&modules, config.as_deref(), &output),
    }
}
