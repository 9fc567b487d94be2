use std::collections::BTreeSet;

use bundlekit_schema::{
    ApkTargeting, ConfigValue, Configuration, DensityAlias, DimensionTargeting, ModuleSplit,
    ResourceEntry, ResourceTable, ScreenDensity, TargetingDimension, ZipPath,
};
use indexmap::IndexMap;

use super::{ModuleSplitSplitter, take_entries};
use crate::error::Result;

/// Moves density-specific resources of the master split into one split per
/// density bucket.
///
/// For every bucket, each group of values that only differ by density
/// contributes its best match: the smallest density at or above the bucket,
/// or the largest one below it when none is high enough.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenDensityResourcesSplitter;

fn best_match<'a>(candidates: &[&'a ConfigValue], target: u32) -> Option<&'a ConfigValue> {
    let above = candidates
        .iter()
        .filter(|v| v.config.density >= target)
        .min_by_key(|v| v.config.density);
    let below = || {
        candidates
            .iter()
            .filter(|v| v.config.density < target)
            .max_by_key(|v| v.config.density)
    };
    above.or_else(below).copied()
}

fn values_for_bucket(entry: &ResourceEntry, bucket: DensityAlias) -> Vec<ConfigValue> {
    let mut groups: IndexMap<Configuration, Vec<&ConfigValue>> = IndexMap::new();
    for value in entry
        .config_values
        .iter()
        .filter(|v| v.config.is_density_specific())
    {
        groups
            .entry(value.config.without_density())
            .or_default()
            .push(value);
    }
    groups
        .values()
        .filter_map(|candidates| best_match(candidates, bucket.dpi()))
        .cloned()
        .collect()
}

impl ModuleSplitSplitter for ScreenDensityResourcesSplitter {
    fn split(&self, mut split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if !split.is_master_split {
            return Ok(vec![split]);
        }
        let Some(table) = split.resource_table.take() else {
            return Ok(vec![split]);
        };
        if !table.config_values().any(|v| v.config.is_density_specific()) {
            split.resource_table = Some(table);
            return Ok(vec![split]);
        }

        let master_table = table.filter_values(|entry| {
            entry
                .config_values
                .iter()
                .filter(|v| !v.config.is_density_specific())
                .cloned()
                .collect()
        });
        let master_files = master_table.referenced_files();

        let bucket_tables: Vec<(DensityAlias, ResourceTable)> = DensityAlias::BUCKETS
            .iter()
            .map(|bucket| (*bucket, table.filter_values(|e| values_for_bucket(e, *bucket))))
            .collect();
        let moved: BTreeSet<ZipPath> = bucket_tables
            .iter()
            .flat_map(|(_, t)| t.referenced_files())
            .filter(|path| !master_files.contains(path))
            .collect();
        let density_entries = take_entries(&mut split.entries, |e| moved.contains(&e.path));

        let universe: BTreeSet<ScreenDensity> = DensityAlias::BUCKETS
            .iter()
            .map(|b| ScreenDensity::Alias(*b))
            .collect();
        let mut outputs = Vec::with_capacity(bucket_tables.len() + 1);
        for (bucket, bucket_table) in bucket_tables {
            let value = ScreenDensity::Alias(bucket);
            let files = bucket_table.referenced_files();
            let mut density_split = split.derived(ApkTargeting {
                screen_density: Some(DimensionTargeting::new(
                    [value],
                    universe.iter().copied().filter(|d| *d != value),
                )),
                ..split.apk_targeting.clone()
            });
            density_split.entries = density_entries
                .iter()
                .filter(|e| files.contains(&e.path))
                .cloned()
                .collect();
            density_split.resource_table = Some(bucket_table);
            outputs.push(density_split);
        }

        tracing::debug!(
            module = %split.module_name,
            dimension = %TargetingDimension::ScreenDensity,
            moved = density_entries.len(),
            "split density resources"
        );
        split.resource_table = (!master_table.is_empty()).then_some(master_table);
        outputs.insert(0, split);
        Ok(outputs)
    }

    fn dimension(&self) -> Option<TargetingDimension> {
        Some(TargetingDimension::ScreenDensity)
    }
}
