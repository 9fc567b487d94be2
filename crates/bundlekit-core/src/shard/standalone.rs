use std::collections::BTreeSet;

use bundlekit_schema::{
    Abi, BundleModule, ModuleSplit, ScreenDensity, SplitType, TargetingDimension,
};
use rayon::prelude::*;

use super::{ModuleFuser, ShardMerger};
use crate::config::BundleConfig;
use crate::error::{BundleError, Result};
use crate::splitter::{
    AbiNativeLibrariesSplitter, ApexImagesSplitter, ModuleSplitSplitter,
    ScreenDensityResourcesSplitter, SplittingPipeline,
};
use crate::suffix::suffix_stripper;
use crate::targeting::generator::complete_module_configs;

const STRIPPED_DIMENSIONS: [TargetingDimension; 3] = [
    TargetingDimension::TextureCompressionFormat,
    TargetingDimension::DeviceTier,
    TargetingDimension::CountrySet,
];

/// Build the standalone shards of a bundle: one per ABI and screen density
/// combination found in its install-time modules, or one per image of an
/// APEX base module.
///
/// Modules that are not delivered at install time are left out.
pub fn generate_standalone_shards(
    modules: &[BundleModule],
    config: &BundleConfig,
    merger: &ShardMerger<'_>,
) -> Result<Vec<ModuleSplit>> {
    let selected = modules
        .iter()
        .filter(|m| ModuleFuser::is_fused(m))
        .map(complete_module_configs)
        .collect::<Result<Vec<_>>>()?;
    let Some(base) = selected.iter().find(|m| m.name.is_base()) else {
        return Err(BundleError::TargetingInvariant(
            "Standalone shards need a base module".to_string(),
        ));
    };

    let shards = if base.apex_config.is_some() {
        apex_shards(base, config, merger)?
    } else {
        let splits = selected
            .par_iter()
            .map(|module| {
                run_pipeline(
                    module,
                    config,
                    vec![
                        Box::new(ScreenDensityResourcesSplitter),
                        Box::new(AbiNativeLibrariesSplitter),
                    ],
                )
            })
            .collect::<Result<Vec<_>>>()?
            .concat();
        let combinations = combinations(&splits);
        tracing::info!(
            modules = selected.len(),
            shards = combinations.len(),
            "merging standalone shards"
        );
        combinations
            .par_iter()
            .map(|parts| merger.merge_single_shard(parts, SplitType::Standalone))
            .collect::<Result<Vec<_>>>()?
    };

    shards
        .into_iter()
        .map(|shard| strip_suffixes(shard, config))
        .collect()
}

fn run_pipeline(
    module: &BundleModule,
    config: &BundleConfig,
    splitters: Vec<Box<dyn ModuleSplitSplitter>>,
) -> Result<Vec<ModuleSplit>> {
    let pipeline = SplittingPipeline::new(splitters, config.split_sdk_floor);
    let splits = pipeline.split(ModuleSplit::for_module(module))?;
    Ok(splits
        .into_iter()
        .map(|mut split| {
            split.apk_targeting = split.apk_targeting.without(TargetingDimension::SdkVersion);
            split.variant_targeting = split
                .variant_targeting
                .without(TargetingDimension::SdkVersion);
            split
        })
        .collect())
}

/// Every master split plus the ABI and density splits matching one
/// combination of the values found across all splits.
fn combinations(splits: &[ModuleSplit]) -> Vec<Vec<ModuleSplit>> {
    let abis: BTreeSet<Abi> = splits
        .iter()
        .filter_map(|s| s.apk_targeting.abi.as_ref())
        .flat_map(|t| t.values.iter().copied())
        .collect();
    let densities: BTreeSet<ScreenDensity> = splits
        .iter()
        .filter_map(|s| s.apk_targeting.screen_density.as_ref())
        .flat_map(|t| t.values.iter().copied())
        .collect();
    let abis = optional_values(abis);
    let densities = optional_values(densities);

    let mut combinations = Vec::with_capacity(abis.len() * densities.len());
    for abi in &abis {
        for density in &densities {
            let parts = splits
                .iter()
                .filter(|s| {
                    let targeting = &s.apk_targeting;
                    s.is_master_split
                        || targeting
                            .abi
                            .as_ref()
                            .is_some_and(|t| abi.is_some_and(|a| t.values.contains(&a)))
                        || targeting
                            .screen_density
                            .as_ref()
                            .is_some_and(|t| density.is_some_and(|d| t.values.contains(&d)))
                })
                .cloned()
                .collect();
            combinations.push(parts);
        }
    }
    combinations
}

fn optional_values<V>(values: BTreeSet<V>) -> Vec<Option<V>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.into_iter().map(Some).collect()
    }
}

fn apex_shards(
    base: &BundleModule,
    config: &BundleConfig,
    merger: &ShardMerger<'_>,
) -> Result<Vec<ModuleSplit>> {
    let splits = run_pipeline(base, config, vec![Box::new(ApexImagesSplitter)])?;
    let (masters, images): (Vec<ModuleSplit>, Vec<ModuleSplit>) =
        splits.into_iter().partition(|s| s.is_master_split);
    tracing::info!(images = images.len(), "merging APEX shards");
    images
        .into_iter()
        .map(|image| {
            let mut parts = masters.clone();
            parts.push(image);
            merger.merge_apex_shard(&parts)
        })
        .collect()
}

fn strip_suffixes(mut shard: ModuleSplit, config: &BundleConfig) -> Result<ModuleSplit> {
    for dimension in STRIPPED_DIMENSIONS {
        let policy = config.suffix_stripping(dimension);
        if !policy.enabled && policy.default_suffix.is_none() {
            continue;
        }
        shard = suffix_stripper(dimension)?.apply(shard, &policy)?;
    }
    Ok(shard)
}
