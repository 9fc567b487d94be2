//! External dex merging: the tool seam, its D8 implementation and the
//! per-build cache of merge results.

pub mod cache;
pub mod d8;

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

pub use cache::{DexMergeCache, DexMergeKey};
pub use d8::D8DexMerger;

use crate::error::ToolError;

/// Inputs of one dex merge.
#[derive(Debug, Clone, Copy)]
pub struct DexMergeRequest<'a> {
    pub dex_files: &'a [PathBuf],
    /// Must exist and be empty.
    pub output_dir: &'a Path,
    pub main_dex_list: Option<&'a Path>,
    pub proguard_map: Option<&'a Path>,
    pub is_debuggable: bool,
    pub min_sdk: u32,
}

/// Merges several dex files into as few as possible.
pub trait DexMerger: Send + Sync {
    /// Merge the request's dex files into its output directory and return
    /// the produced files in `classes.dex`, `classes2.dex`, ... order.
    fn merge(&self, request: &DexMergeRequest<'_>) -> Result<Vec<PathBuf>, ToolError>;
}

static DEX_FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^classes(\d*)\.dex$").expect("dex file name pattern is valid"));

/// Sort key of a `classesN.dex` file name; `classes.dex` is 1.
pub fn dex_file_index(file_name: &str) -> Option<u32> {
    let digits = DEX_FILE_NAME.captures(file_name)?.get(1)?.as_str();
    if digits.is_empty() {
        return Some(1);
    }
    digits.parse().ok().filter(|n| *n >= 2)
}

/// `classes.dex` for 1, `classesN.dex` otherwise.
pub fn dex_file_name(index: u32) -> String {
    if index <= 1 {
        "classes.dex".to_string()
    } else {
        format!("classes{index}.dex")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dex_names_and_indices() {
        assert_eq!(dex_file_name(1), "classes.dex");
        assert_eq!(dex_file_name(3), "classes3.dex");
        assert_eq!(dex_file_index("classes.dex"), Some(1));
        assert_eq!(dex_file_index("classes12.dex"), Some(12));
        assert_eq!(dex_file_index("classes1.dex"), None);
        assert_eq!(dex_file_index("other.dex"), None);
    }
}
