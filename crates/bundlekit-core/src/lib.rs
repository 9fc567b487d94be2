pub mod config;
pub mod dex;
pub mod error;
pub mod io;
pub mod manifest;
pub mod merge;
pub mod shard;
pub mod splitter;
pub mod suffix;
pub mod targeting;

pub use config::{BundleConfig, ConfigError, DexMergingStrategy, SuffixStripping};
pub use dex::{D8DexMerger, DexMergeCache, DexMerger};
pub use error::{BundleError, ErrorKind, Result, ToolError};
pub use manifest::{FusingManifestMerger, ManifestFuser};
pub use shard::{DexMergeOptions, ModuleFuser, ShardMerger, generate_standalone_shards};
pub use splitter::{ModuleSplitSplitter, SplittingPipeline, split_module, split_modules_parallel};
