use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bundlekit_core::config::DexerConfig;
use bundlekit_core::dex::DexMergeRequest;
use bundlekit_core::io::{split_archive_name, write_split_archive};
use bundlekit_core::{
    D8DexMerger, DexMergeCache, DexMergeOptions, DexMerger, FusingManifestMerger, ShardMerger,
    ToolError, generate_standalone_shards,
};

use super::{ensure_output_dir, load_config, read_modules};
use crate::ui::{SummaryRow, print_summary};

/// Stands in for `d8` when it cannot be located, so that bundles which
/// never need a dex merge still shard.
#[derive(Debug)]
struct UnavailableDexMerger {
    reason: String,
}

impl DexMerger for UnavailableDexMerger {
    fn merge(&self, _request: &DexMergeRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
        Err(ToolError::NotFound {
            tool: "d8".to_string(),
            reason: self.reason.clone(),
        })
    }
}

fn dex_merger(config: &DexerConfig) -> Box<dyn DexMerger> {
    match D8DexMerger::from_config(config) {
        Ok(d8) => Box::new(d8),
        Err(e) => {
            tracing::debug!(error = %e, "d8 unavailable; dex merging will fail if needed");
            Box::new(UnavailableDexMerger {
                reason: e.to_string(),
            })
        }
    }
}

/// Merge the install-time modules into standalone shards
pub fn shard(archives: &[PathBuf], config: Option<&Path>, output: &Path) -> Result<()> {
    let config = load_config(config)?;
    ensure_output_dir(output)?;
    let staging = tempfile::tempdir().context("Failed to create staging directory")?;
    let modules = read_modules(archives, staging.path())?;

    let has_feature_modules = modules.iter().any(|m| !m.name.is_base());
    let dexer = dex_merger(&config.dexer);
    let cache = DexMergeCache::new();
    let merger = ShardMerger::new(
        &cache,
        dexer.as_ref(),
        &FusingManifestMerger,
        DexMergeOptions::from_config(&config.standalone, has_feature_modules),
        staging.path().join("work"),
    );

    let shards = generate_standalone_shards(&modules, &config, &merger)
        .context("Failed to generate standalone shards")?;
    let mut rows = Vec::new();
    for shard in &shards {
        let name = split_archive_name(shard);
        let path = output.join(&name);
        write_split_archive(shard, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        let size = std::fs::metadata(&path).map_or(0, |m| m.len());
        rows.push(SummaryRow::new(shard, name, size));
    }

    tracing::info!(
        shards = rows.len(),
        dex_merges = cache.computations(),
        "sharding complete"
    );
    print_summary(&rows);
    Ok(())
}
