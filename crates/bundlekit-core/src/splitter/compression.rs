//! Format splitters: one split in, one split out, with entries marked
//! uncompressed where the platform can use them in place.

use bundlekit_schema::{
    ANDROID_M_API_VERSION, ANDROID_Q_API_VERSION, DEX_DIRECTORY, LIB_DIRECTORY, ModuleSplit,
    ZipPath,
};

use super::ModuleSplitSplitter;
use crate::error::Result;

/// Lowest SDK the split can be installed on.
fn min_sdk(split: &ModuleSplit) -> u32 {
    let variant = split
        .variant_targeting
        .sdk_version
        .as_ref()
        .and_then(|t| t.values.first().copied())
        .unwrap_or(1);
    variant.max(split.manifest.effective_min_sdk())
}

fn mark_uncompressed(mut split: ModuleSplit, directory: &str) -> ModuleSplit {
    let directory = ZipPath::new(directory);
    let mut marked = 0usize;
    for entry in &mut split.entries {
        if entry.is_under(&directory) && !entry.force_uncompressed {
            entry.force_uncompressed = true;
            marked += 1;
        }
    }
    if marked > 0 {
        tracing::debug!(module = %split.module_name, %directory, marked, "marked entries uncompressed");
    }
    split
}

/// Stores dex files uncompressed on Android Q and above.
#[derive(Debug, Clone, Copy)]
pub struct DexCompressionSplitter {
    enabled: bool,
}

impl DexCompressionSplitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl ModuleSplitSplitter for DexCompressionSplitter {
    fn split(&self, split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if !self.enabled || min_sdk(&split) < ANDROID_Q_API_VERSION {
            return Ok(vec![split]);
        }
        Ok(vec![mark_uncompressed(split, DEX_DIRECTORY)])
    }
}

/// Stores native libraries uncompressed on Android M and above.
#[derive(Debug, Clone, Copy)]
pub struct NativeLibrariesCompressionSplitter {
    enabled: bool,
}

impl NativeLibrariesCompressionSplitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl ModuleSplitSplitter for NativeLibrariesCompressionSplitter {
    fn split(&self, split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if !self.enabled || min_sdk(&split) < ANDROID_M_API_VERSION {
            return Ok(vec![split]);
        }
        Ok(vec![mark_uncompressed(split, LIB_DIRECTORY)])
    }
}
