pub mod shard;
pub mod split;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bundlekit_core::BundleConfig;
use bundlekit_core::io::read_module_archive;
use bundlekit_schema::BundleModule;

/// Config from `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<BundleConfig> {
    match path {
        Some(path) => BundleConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(BundleConfig::default()),
    }
}

/// Read every module archive, staging each one in its own directory.
pub fn read_modules(archives: &[PathBuf], staging_dir: &Path) -> Result<Vec<BundleModule>> {
    archives
        .iter()
        .enumerate()
        .map(|(i, archive)| {
            read_module_archive(archive, &staging_dir.join(i.to_string()))
                .with_context(|| format!("Failed to read module {}", archive.display()))
        })
        .collect()
}

fn ensure_output_dir(output: &Path) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))
}
