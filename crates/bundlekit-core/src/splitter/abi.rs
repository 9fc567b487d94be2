use std::collections::BTreeSet;

use bundlekit_schema::{
    Abi, ApkTargeting, DimensionTargeting, ModuleSplit, NativeLibraries, TargetingDimension,
    ZipPath,
};

use super::{ModuleSplitSplitter, take_entries, under_directories};
use crate::error::Result;

/// Moves `lib/<abi>/` directories of the master split into one split per ABI.
/// Sanitizer directories (`lib/<abi>-hwasan/`) go with their ABI.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbiNativeLibrariesSplitter;

impl ModuleSplitSplitter for AbiNativeLibrariesSplitter {
    fn split(&self, mut split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if !split.is_master_split {
            return Ok(vec![split]);
        }
        let Some(native) = split.native_config.take() else {
            return Ok(vec![split]);
        };

        let universe: BTreeSet<Abi> = native.directories.iter().map(|d| d.targeting.abi).collect();
        let mut outputs = Vec::with_capacity(universe.len() + 1);
        for abi in &universe {
            let directories: Vec<_> = native
                .directories
                .iter()
                .filter(|d| d.targeting.abi == *abi)
                .cloned()
                .collect();
            let paths: BTreeSet<ZipPath> = directories.iter().map(|d| d.path.clone()).collect();

            let mut abi_split = split.derived(ApkTargeting {
                abi: Some(DimensionTargeting::new(
                    [*abi],
                    universe.iter().copied().filter(|a| a != abi),
                )),
                ..split.apk_targeting.clone()
            });
            abi_split.entries = take_entries(&mut split.entries, |e| under_directories(e, &paths));
            abi_split.native_config = Some(NativeLibraries { directories });
            outputs.push(abi_split);
        }

        tracing::debug!(
            module = %split.module_name,
            dimension = %TargetingDimension::Abi,
            abis = universe.len(),
            "split native libraries"
        );
        outputs.insert(0, split);
        Ok(outputs)
    }

    fn dimension(&self) -> Option<TargetingDimension> {
        Some(TargetingDimension::Abi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::test_support::{master, paths};

    #[test]
    fn one_split_per_abi_with_hwasan_alongside() {
        let split = master(&[
            "dex/classes.dex",
            "lib/x86/libfoo.so",
            "lib/arm64-v8a/libfoo.so",
            "lib/arm64-v8a-hwasan/libfoo.so",
        ]);
        let outputs = AbiNativeLibrariesSplitter.split(split).unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(paths(&outputs[0]), vec!["dex/classes.dex"]);
        assert!(outputs[0].native_config.is_none());

        let arm = outputs
            .iter()
            .find(|s| {
                s.apk_targeting.abi
                    == Some(DimensionTargeting::new([Abi::Arm64V8a], [Abi::X86]))
            })
            .unwrap();
        assert_eq!(
            paths(arm),
            vec!["lib/arm64-v8a/libfoo.so", "lib/arm64-v8a-hwasan/libfoo.so"]
        );
        assert_eq!(arm.native_config.as_ref().unwrap().directories.len(), 2);
    }

    #[test]
    fn non_master_splits_pass_through() {
        let mut split = master(&["lib/x86/libfoo.so"]);
        split.is_master_split = false;
        assert_eq!(AbiNativeLibrariesSplitter.split(split).unwrap().len(), 1);
    }
}
