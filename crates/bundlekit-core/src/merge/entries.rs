use bundlekit_schema::{ModuleEntry, ModuleName, ZipPath};
use indexmap::IndexMap;

use crate::error::{BundleError, Result};

/// Accumulates entries by path, rejecting a second entry for a path unless
/// its bytes are identical to the first one.
#[derive(Debug, Default)]
pub struct EntryMerger {
    entries: IndexMap<ZipPath, (ModuleName, ModuleEntry)>,
}

impl EntryMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` unless its path is taken. An identical entry is
    /// dropped; one with different content is an [`BundleError::EntryConflict`].
    pub fn merge_entry(&mut self, module: &ModuleName, entry: ModuleEntry) -> Result<()> {
        if let Some((owner, existing)) = self.entries.get(&entry.path) {
            if existing.content_equals(&entry)? {
                return Ok(());
            }
            return Err(BundleError::EntryConflict {
                path: entry.path,
                first: owner.clone(),
                second: module.clone(),
            });
        }
        self.entries
            .insert(entry.path.clone(), (module.clone(), entry));
        Ok(())
    }

    pub fn merge_all(
        &mut self,
        module: &ModuleName,
        entries: impl IntoIterator<Item = ModuleEntry>,
    ) -> Result<()> {
        entries
            .into_iter()
            .try_for_each(|entry| self.merge_entry(module, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail if some entry's path is also a directory prefix of another entry.
    pub fn check_file_directory_collisions(&self) -> Result<()> {
        for path in self.entries.keys() {
            if let Some(ancestor) = path.ancestors().find(|a| self.entries.contains_key(a)) {
                return Err(BundleError::FileDirectoryCollision { path: ancestor });
            }
        }
        Ok(())
    }

    /// Merged entries in first-insertion order, after the collision check.
    pub fn into_entries(self) -> Result<Vec<ModuleEntry>> {
        self.check_file_directory_collisions()?;
        Ok(self.entries.into_values().map(|(_, entry)| entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn base() -> ModuleName {
        ModuleName::base()
    }

    fn feature() -> ModuleName {
        ModuleName::new("feature")
    }

    #[test]
    fn identical_entries_are_kept_once() {
        let mut merger = EntryMerger::new();
        merger
            .merge_entry(&base(), ModuleEntry::from_bytes("assets/a.txt", "same"))
            .unwrap();
        merger
            .merge_entry(&feature(), ModuleEntry::from_bytes("assets/a.txt", "same"))
            .unwrap();
        assert_eq!(merger.into_entries().unwrap().len(), 1);
    }

    #[test]
    fn different_content_is_a_conflict_naming_both_modules() {
        let mut merger = EntryMerger::new();
        merger
            .merge_entry(&base(), ModuleEntry::from_bytes("assets/a.txt", "one"))
            .unwrap();
        let err = merger
            .merge_entry(&feature(), ModuleEntry::from_bytes("assets/a.txt", "two"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryConflict);
        let message = err.to_string();
        assert!(message.contains("'base'") && message.contains("'feature'"), "{message}");
        assert!(message.contains("assets/a.txt"));
    }

    #[test]
    fn file_shadowing_a_directory_is_a_conflict() {
        let mut merger = EntryMerger::new();
        merger
            .merge_entry(&base(), ModuleEntry::from_bytes("assets/data", "file"))
            .unwrap();
        merger
            .merge_entry(&feature(), ModuleEntry::from_bytes("assets/data/x.bin", "nested"))
            .unwrap();
        let err = merger.into_entries().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryConflict);
        assert!(err.to_string().contains("assets/data"));
    }

    proptest! {
        #[test]
        fn equal_content_merges_in_any_order(
            names in proptest::collection::btree_set("[a-z]{1,6}", 1..8),
            reverse in any::<bool>(),
        ) {
            let entries: Vec<ModuleEntry> = names
                .iter()
                .map(|n| ModuleEntry::from_bytes(&format!("assets/{n}.bin"), n.clone().into_bytes()))
                .collect();
            let mut merger = EntryMerger::new();
            merger.merge_all(&base(), entries.clone()).unwrap();
            let mut again = entries.clone();
            if reverse {
                again.reverse();
            }
            merger.merge_all(&feature(), again).unwrap();
            prop_assert_eq!(merger.into_entries().unwrap(), entries);
        }

        #[test]
        fn differing_content_fails_in_either_order(first_base in any::<bool>()) {
            let ours = ModuleEntry::from_bytes("res/raw/x", "ours");
            let theirs = ModuleEntry::from_bytes("res/raw/x", "theirs");
            let (a, b) = if first_base { (ours, theirs) } else { (theirs, ours) };
            let mut merger = EntryMerger::new();
            merger.merge_entry(&base(), a).unwrap();
            prop_assert!(merger.merge_entry(&feature(), b).is_err());
        }
    }
}
