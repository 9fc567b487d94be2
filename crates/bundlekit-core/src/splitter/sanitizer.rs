use std::collections::BTreeSet;

use bundlekit_schema::{
    ApkTargeting, DimensionTargeting, ModuleSplit, NativeLibraries, Sanitizer, TargetingDimension,
    ZipPath,
};

use super::{ModuleSplitSplitter, take_entries, under_directories};
use crate::error::Result;

/// Moves hwasan libraries of an ABI split into their own split. An ABI
/// split left without content is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizerNativeLibrariesSplitter;

impl ModuleSplitSplitter for SanitizerNativeLibrariesSplitter {
    fn split(&self, mut split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        let Some(native) = split.native_config.take() else {
            return Ok(vec![split]);
        };
        let (sanitized, plain): (Vec<_>, Vec<_>) = native
            .directories
            .into_iter()
            .partition(|d| d.targeting.sanitizer == Some(Sanitizer::Hwaddress));
        if sanitized.is_empty() {
            split.native_config = Some(NativeLibraries { directories: plain });
            return Ok(vec![split]);
        }

        let paths: BTreeSet<ZipPath> = sanitized.iter().map(|d| d.path.clone()).collect();
        let mut hwasan = split.derived(ApkTargeting {
            sanitizer: Some(DimensionTargeting::single(Sanitizer::Hwaddress)),
            ..split.apk_targeting.clone()
        });
        hwasan.entries = take_entries(&mut split.entries, |e| under_directories(e, &paths));
        hwasan.native_config = Some(NativeLibraries {
            directories: sanitized,
        });
        split.native_config = (!plain.is_empty()).then_some(NativeLibraries { directories: plain });

        if split.is_empty() && !split.is_master_split {
            tracing::debug!(module = %split.module_name, "dropped empty split after sanitizer split");
            return Ok(vec![hwasan]);
        }
        Ok(vec![split, hwasan])
    }

    fn dimension(&self) -> Option<TargetingDimension> {
        Some(TargetingDimension::Sanitizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::AbiNativeLibrariesSplitter;
    use crate::splitter::test_support::{master, paths};

    #[test]
    fn hwasan_libraries_get_their_own_split() {
        let split = master(&["lib/arm64-v8a/libfoo.so", "lib/arm64-v8a-hwasan/libfoo.so"]);
        let abi_split = AbiNativeLibrariesSplitter.split(split).unwrap().remove(1);
        let outputs = SanitizerNativeLibrariesSplitter.split(abi_split).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(paths(&outputs[0]), vec!["lib/arm64-v8a/libfoo.so"]);
        assert_eq!(paths(&outputs[1]), vec!["lib/arm64-v8a-hwasan/libfoo.so"]);
        assert!(outputs[1].apk_targeting.abi.is_some());
        assert_eq!(
            outputs[1].apk_targeting.sanitizer,
            Some(DimensionTargeting::single(Sanitizer::Hwaddress))
        );
    }

    #[test]
    fn empty_remainder_is_dropped() {
        let split = master(&["lib/arm64-v8a-hwasan/libfoo.so"]);
        let abi_split = AbiNativeLibrariesSplitter.split(split).unwrap().remove(1);
        let outputs = SanitizerNativeLibrariesSplitter.split(abi_split).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].apk_targeting.sanitizer.is_some());
    }
}
