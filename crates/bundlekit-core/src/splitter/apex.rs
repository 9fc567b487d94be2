use std::collections::BTreeSet;

use bundlekit_schema::{ApexImages, ApkTargeting, ModuleSplit, TargetingDimension, ZipPath};

use super::{ModuleSplitSplitter, take_entries};
use crate::error::Result;

/// Moves every APEX system image (and its build info) into its own
/// multi-ABI split. Everything else stays in the master split.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApexImagesSplitter;

impl ModuleSplitSplitter for ApexImagesSplitter {
    fn split(&self, mut split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if !split.is_master_split {
            return Ok(vec![split]);
        }
        let Some(apex) = split.apex_config.take() else {
            return Ok(vec![split]);
        };

        let mut outputs = Vec::with_capacity(apex.images.len() + 1);
        for image in apex.images {
            let paths: BTreeSet<ZipPath> = std::iter::once(image.path.clone())
                .chain(image.build_info_path.clone())
                .collect();
            let mut image_split = split.derived(ApkTargeting {
                multi_abi: Some(image.targeting.multi_abi.clone()),
                ..split.apk_targeting.clone()
            });
            image_split.entries = take_entries(&mut split.entries, |e| paths.contains(&e.path));
            image_split.apex_config = Some(ApexImages {
                images: vec![image],
            });
            outputs.push(image_split);
        }

        tracing::debug!(
            module = %split.module_name,
            images = outputs.len(),
            "split APEX images"
        );
        outputs.insert(0, split);
        Ok(outputs)
    }

    fn dimension(&self) -> Option<TargetingDimension> {
        Some(TargetingDimension::MultiAbi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::test_support::{master, paths};
    use bundlekit_schema::{Abi, DimensionTargeting, MultiAbi};

    #[test]
    fn one_split_per_image() {
        let split = master(&[
            "apex_manifest.pb",
            "apex/x86_64.x86.img",
            "apex/x86_64.x86.build_info.pb",
            "apex/arm64-v8a.img",
        ]);
        let outputs = ApexImagesSplitter.split(split).unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(paths(&outputs[0]), vec!["apex_manifest.pb"]);

        let x86 = MultiAbi::new([Abi::X86_64, Abi::X86]);
        let arm = MultiAbi::new([Abi::Arm64V8a]);
        let image = outputs
            .iter()
            .find(|s| {
                s.apk_targeting.multi_abi
                    == Some(DimensionTargeting::new([x86.clone()], [arm.clone()]))
            })
            .unwrap();
        assert_eq!(
            paths(image),
            vec!["apex/x86_64.x86.img", "apex/x86_64.x86.build_info.pb"]
        );
    }
}
