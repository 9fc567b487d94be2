use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bundlekit_core::io::{split_archive_name, write_split_archive};
use bundlekit_core::{FusingManifestMerger, ModuleFuser, split_modules_parallel};

use super::{ensure_output_dir, load_config, read_modules};
use crate::ui::{SummaryRow, print_summary};

/// Split every module and write one archive per split
pub fn split(archives: &[PathBuf], config: Option<&Path>, output: &Path, fuse: bool) -> Result<()> {
    let config = load_config(config)?;
    ensure_output_dir(output)?;
    let staging = tempfile::tempdir().context("Failed to create staging directory")?;

    let mut modules = read_modules(archives, staging.path())?;
    if fuse {
        modules = ModuleFuser::new(&FusingManifestMerger)
            .fuse(&modules)
            .context("Failed to fuse install-time modules")?;
    }

    let splits = split_modules_parallel(&modules, &config).context("Failed to split modules")?;
    let mut rows = Vec::new();
    for split in splits.iter().flatten() {
        let name = split_archive_name(split);
        let path = output.join(&name);
        write_split_archive(split, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        let size = std::fs::metadata(&path).map_or(0, |m| m.len());
        rows.push(SummaryRow::new(split, name, size));
    }

    tracing::info!(modules = modules.len(), splits = rows.len(), "split complete");
    print_summary(&rows);
    Ok(())
}
