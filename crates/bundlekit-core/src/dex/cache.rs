use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bundlekit_schema::{ContentDigest, ModuleEntry, ZipPath};
use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::error::Result;

/// The exact set of dex entries going into a merge, by path and content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DexMergeKey(BTreeSet<(ZipPath, ContentDigest)>);

impl DexMergeKey {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ModuleEntry>) -> Result<Self> {
        let mut key = BTreeSet::new();
        for entry in entries {
            key.insert((entry.path.clone(), entry.content.digest()?));
        }
        Ok(Self(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable digest of the whole key, usable as a directory name.
    pub fn digest(&self) -> ContentDigest {
        let mut input = Vec::new();
        for (path, digest) in &self.0 {
            input.extend_from_slice(path.as_str().as_bytes());
            input.push(0);
            input.extend_from_slice(digest.as_str().as_bytes());
            input.push(b'\n');
        }
        ContentDigest::compute(&input)
    }
}

/// Results of external dex merges for one build, computed at most once per
/// distinct input set even under concurrent shard merges.
#[derive(Debug, Default)]
pub struct DexMergeCache {
    cells: DashMap<DexMergeKey, Arc<OnceCell<Vec<PathBuf>>>>,
    computations: AtomicUsize,
}

impl DexMergeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached output for `key`, running `compute` if there is none yet.
    /// A failed computation leaves the key uncached.
    pub fn get_or_merge<F>(&self, key: &DexMergeKey, compute: F) -> Result<Vec<PathBuf>>
    where
        F: FnOnce() -> Result<Vec<PathBuf>>,
    {
        let cell = Arc::clone(self.cells.entry(key.clone()).or_default().value());
        if let Some(files) = cell.get() {
            tracing::debug!(inputs = key.len(), "dex merge cache hit");
            return Ok(files.clone());
        }
        let files = cell.get_or_try_init(|| {
            tracing::debug!(inputs = key.len(), "dex merge cache miss");
            self.computations.fetch_add(1, Ordering::SeqCst);
            compute()
        })?;
        Ok(files.clone())
    }

    /// Number of merges actually run.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.cells.iter().filter(|cell| cell.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BundleError, ErrorKind, ToolError};
    use std::thread;

    fn key(contents: &[&str]) -> DexMergeKey {
        let entries: Vec<ModuleEntry> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| ModuleEntry::from_bytes(&format!("dex/classes{}.dex", i + 2), c.to_string()))
            .collect();
        DexMergeKey::from_entries(&entries).unwrap()
    }

    #[test]
    fn same_inputs_compute_once() {
        let cache = DexMergeCache::new();
        for _ in 0..3 {
            let files = cache
                .get_or_merge(&key(&["a", "b"]), || Ok(vec![PathBuf::from("classes.dex")]))
                .unwrap();
            assert_eq!(files, vec![PathBuf::from("classes.dex")]);
        }
        assert_eq!(cache.computations(), 1);
        cache
            .get_or_merge(&key(&["a", "c"]), || Ok(Vec::new()))
            .unwrap();
        assert_eq!(cache.computations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_lookups_compute_once() {
        let cache = DexMergeCache::new();
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache
                        .get_or_merge(&key(&["x"]), || {
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(vec![PathBuf::from("out.dex")])
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = DexMergeCache::new();
        let err = cache
            .get_or_merge(&key(&["a"]), || {
                Err(BundleError::Tool(ToolError::DexOverflow {
                    output: String::new(),
                }))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolInvocationFailure);
        assert!(cache.is_empty());
        cache.get_or_merge(&key(&["a"]), || Ok(Vec::new())).unwrap();
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn key_digest_depends_on_content() {
        assert_eq!(key(&["a"]).digest(), key(&["a"]).digest());
        assert_ne!(key(&["a"]).digest(), key(&["b"]).digest());
    }
}
