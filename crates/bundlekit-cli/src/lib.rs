//! bundlekit - split and shard modular app bundles
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads module archives, runs them through the splitting pipeline or the
//! standalone shard merger from `bundlekit-core`, and writes the results as
//! zip archives next to a summary table.

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bundlekit")]
#[command(author, version, about = "bundlekit - split and shard modular app bundles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split modules into per-configuration archives
    Split {
        /// Module archive(s); the one without a split id is the base module
        #[arg(long = "module", required = true)]
        modules: Vec<PathBuf>,
        /// Bundle config (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory receiving one zip per split
        #[arg(long)]
        output: PathBuf,
        /// Fold install-time feature modules into base before splitting
        #[arg(long)]
        fuse: bool,
    },
    /// Merge install-time modules into standalone shards
    Shard {
        /// Module archive(s); the one without a split id is the base module
        #[arg(long = "module", required = true)]
        modules: Vec<PathBuf>,
        /// Bundle config (.toml or .json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory receiving one zip per shard
        #[arg(long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn split_takes_repeated_modules() {
        let cli = Cli::parse_from([
            "bundlekit", "split", "--module", "base.zip", "--module", "feature.zip", "--output",
            "out", "--fuse",
        ]);
        match cli.command {
            Commands::Split { modules, fuse, config, .. } => {
                assert_eq!(modules.len(), 2);
                assert!(fuse);
                assert!(config.is_none());
            }
            Commands::Shard { .. } => panic!("expected split"),
        }
    }
}
