use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;

use bundlekit_schema::{Assets, DimensionTargeting, ModuleSplit, TargetedAssetsDirectory, TargetingDimension, ZipPath};

use super::{ModuleSplitSplitter, in_directories, take_entries};
use crate::error::Result;
use crate::targeting::dimension::AssetsDimension;
use crate::targeting::to_alternative;

/// Splits assets directories targeted on dimension `D` into one split per
/// value, plus an alternatives-only split for fallback directories.
///
/// Runs on any split carrying such directories, so nested targeting
/// (`tex#tcf_astc#tier_1`) yields combined splits once every dimension has
/// been applied.
pub struct AssetsDimensionSplitter<D: AssetsDimension> {
    dimension: PhantomData<D>,
}

impl<D: AssetsDimension> AssetsDimensionSplitter<D> {
    pub fn new() -> Self {
        Self {
            dimension: PhantomData,
        }
    }
}

impl<D: AssetsDimension> Default for AssetsDimensionSplitter<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: AssetsDimension> fmt::Debug for AssetsDimensionSplitter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetsDimensionSplitter({})", D::DIMENSION)
    }
}

impl<D: AssetsDimension> AssetsDimensionSplitter<D> {
    fn emit(
        split: &mut ModuleSplit,
        targeting: DimensionTargeting<D::Value>,
        directories: Vec<TargetedAssetsDirectory>,
    ) -> ModuleSplit {
        let mut apk_targeting = split.apk_targeting.clone();
        D::set_apk(&mut apk_targeting, targeting);
        let paths: BTreeSet<ZipPath> = directories.iter().map(|d| d.path.clone()).collect();

        let mut output = split.derived(apk_targeting);
        output.entries = take_entries(&mut split.entries, |e| in_directories(e, &paths));
        output.assets_config = Some(Assets { directories });
        output
    }
}

impl<D: AssetsDimension> ModuleSplitSplitter for AssetsDimensionSplitter<D> {
    fn split(&self, mut split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if D::apk(&split.apk_targeting).is_some() {
            return Ok(vec![split]);
        }
        let Some(assets) = split.assets_config.take() else {
            return Ok(vec![split]);
        };

        let mut by_value: BTreeMap<D::Value, Vec<TargetedAssetsDirectory>> = BTreeMap::new();
        let mut fallback = Vec::new();
        let mut remaining = Vec::new();
        let mut universe = BTreeSet::new();
        for directory in assets.directories {
            let Some(targeting) = D::assets(&directory.targeting) else {
                remaining.push(directory);
                continue;
            };
            universe.extend(targeting.universe());
            match targeting.values.first().cloned() {
                Some(value) => by_value.entry(value).or_default().push(directory),
                None => fallback.push(directory),
            }
        }
        if by_value.is_empty() && fallback.is_empty() {
            split.assets_config = Some(Assets {
                directories: remaining,
            });
            return Ok(vec![split]);
        }

        let mut outputs = Vec::with_capacity(by_value.len() + 2);
        for (value, directories) in by_value {
            let alternatives = universe.iter().filter(|v| **v != value).cloned();
            let targeting = DimensionTargeting::new([value.clone()], alternatives);
            outputs.push(Self::emit(&mut split, targeting, directories));
        }
        if !fallback.is_empty() {
            let targeting = to_alternative(&DimensionTargeting::new(universe.iter().cloned(), []));
            outputs.push(Self::emit(&mut split, targeting, fallback));
        }

        split.assets_config = (!remaining.is_empty()).then_some(Assets {
            directories: remaining,
        });
        tracing::debug!(
            module = %split.module_name,
            dimension = %D::DIMENSION,
            values = universe.len(),
            "split assets directories"
        );
        if split.is_master_split || !split.is_empty() {
            outputs.insert(0, split);
        }
        Ok(outputs)
    }

    fn dimension(&self) -> Option<TargetingDimension> {
        Some(D::DIMENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::test_support::{master, paths};
    use crate::targeting::dimension::{DeviceTierDimension, TextureCompressionFormatDimension};
    use bundlekit_schema::TextureCompressionFormat as Tcf;

    #[test]
    fn one_split_per_value_and_one_for_the_fallback() {
        let split = master(&[
            "assets/tex/a.ktx",
            "assets/tex#tcf_astc/a.ktx",
            "assets/tex#tcf_etc2/a.ktx",
            "assets/other/b.txt",
        ]);
        let outputs = AssetsDimensionSplitter::<TextureCompressionFormatDimension>::new()
            .split(split)
            .unwrap();
        assert_eq!(outputs.len(), 4);
        assert_eq!(paths(&outputs[0]), vec!["assets/other/b.txt"]);

        let astc = &outputs[1];
        assert_eq!(
            astc.apk_targeting.texture_compression_format,
            Some(DimensionTargeting::new([Tcf::Astc], [Tcf::Etc2]))
        );
        assert_eq!(paths(astc), vec!["assets/tex#tcf_astc/a.ktx"]);

        let fallback = &outputs[3];
        assert_eq!(
            fallback.apk_targeting.texture_compression_format,
            Some(DimensionTargeting::new([], [Tcf::Astc, Tcf::Etc2]))
        );
        assert_eq!(paths(fallback), vec!["assets/tex/a.ktx"]);
    }

    #[test]
    fn nested_targeting_produces_combined_splits() {
        let split = master(&[
            "assets/tex#tcf_astc#tier_0/a",
            "assets/tex#tcf_astc#tier_1/a",
            "assets/tex#tcf_etc2#tier_0/a",
            "assets/tex#tcf_etc2#tier_1/a",
        ]);
        let by_tcf = AssetsDimensionSplitter::<TextureCompressionFormatDimension>::new()
            .split(split)
            .unwrap();
        assert_eq!(by_tcf.len(), 3);

        let tier = AssetsDimensionSplitter::<DeviceTierDimension>::new();
        let combined = tier.split(by_tcf[1].clone()).unwrap();
        assert_eq!(combined.len(), 2);
        assert_eq!(paths(&combined[0]), vec!["assets/tex#tcf_astc#tier_0/a"]);
        assert_eq!(
            combined[1].apk_targeting.device_tier,
            Some(DimensionTargeting::new([1], [0]))
        );
        assert!(combined[1].apk_targeting.texture_compression_format.is_some());
    }
}
