//! Splitting pipeline: turn a module into per-configuration splits.
//!
//! Each [`ModuleSplitSplitter`] maps one split to the splits it breaks into.
//! The pipeline applies them in a fixed order, checks after every step that
//! the splits derived from one input partition each new dimension, then
//! coalesces splits with identical targeting and injects the SDK floor.

pub mod abi;
pub mod apex;
pub mod assets;
pub mod compression;
pub mod density;
pub mod language;
pub mod sanitizer;

use std::collections::BTreeSet;
use std::fmt;

use bundlekit_schema::{
    ApkTargeting, BundleModule, DimensionTargeting, ModuleEntry, ModuleSplit, TargetingDimension,
    TargetingValue, VariantTargeting, ZipPath,
};
use indexmap::IndexMap;
use indexmap::map::Entry;
use rayon::prelude::*;

use crate::config::BundleConfig;
use crate::error::{BundleError, Result};
use crate::merge::{
    EntryMerger, merge_apex_configs, merge_assets_configs, merge_native_configs, merge_optional,
    merge_resource_tables,
};
use crate::targeting::dimension::{
    CountrySetDimension, DeviceTierDimension, TextureCompressionFormatDimension,
};
use crate::targeting::generator::complete_module_configs;
use crate::targeting::{validate_apk_targeting, validate_partition};

pub use abi::AbiNativeLibrariesSplitter;
pub use apex::ApexImagesSplitter;
pub use assets::AssetsDimensionSplitter;
pub use compression::{DexCompressionSplitter, NativeLibrariesCompressionSplitter};
pub use density::ScreenDensityResourcesSplitter;
pub use language::LanguageSplitter;
pub use sanitizer::SanitizerNativeLibrariesSplitter;

/// One step of the splitting pipeline.
pub trait ModuleSplitSplitter: fmt::Debug + Send + Sync {
    /// Break `split` into the splits it is made of. Splits the step does
    /// not apply to are returned unchanged.
    fn split(&self, split: ModuleSplit) -> Result<Vec<ModuleSplit>>;

    /// Dimension this step splits on, if any.
    fn dimension(&self) -> Option<TargetingDimension> {
        None
    }
}

/// Ordered splitters run over a module, followed by same-targeting merge
/// and SDK floor injection.
#[derive(Debug)]
pub struct SplittingPipeline {
    splitters: Vec<Box<dyn ModuleSplitSplitter>>,
    sdk_floor: u32,
}

impl SplittingPipeline {
    /// Run `splitters` in order and raise every output to at least `sdk_floor`.
    pub fn new(splitters: Vec<Box<dyn ModuleSplitSplitter>>, sdk_floor: u32) -> Self {
        Self {
            splitters,
            sdk_floor,
        }
    }

    /// Pipeline for the dimensions enabled in `config`, in the fixed order:
    /// density, ABI, sanitizer, language, assets dimensions, APEX images,
    /// then the compression steps, which always run.
    pub fn from_config(config: &BundleConfig) -> Self {
        use TargetingDimension as D;
        let mut splitters: Vec<Box<dyn ModuleSplitSplitter>> = Vec::new();
        if config.splits_on(D::ScreenDensity) {
            splitters.push(Box::new(ScreenDensityResourcesSplitter));
        }
        if config.splits_on(D::Abi) {
            splitters.push(Box::new(AbiNativeLibrariesSplitter));
            splitters.push(Box::new(SanitizerNativeLibrariesSplitter));
        }
        if config.splits_on(D::Language) {
            splitters.push(Box::new(LanguageSplitter));
        }
        if config.splits_on(D::TextureCompressionFormat) {
            splitters.push(Box::new(
                AssetsDimensionSplitter::<TextureCompressionFormatDimension>::new(),
            ));
        }
        if config.splits_on(D::DeviceTier) {
            splitters.push(Box::new(AssetsDimensionSplitter::<DeviceTierDimension>::new()));
        }
        if config.splits_on(D::CountrySet) {
            splitters.push(Box::new(AssetsDimensionSplitter::<CountrySetDimension>::new()));
        }
        splitters.push(Box::new(ApexImagesSplitter));
        splitters.push(Box::new(DexCompressionSplitter::new(
            config.optimizations.uncompress_dex_files,
        )));
        splitters.push(Box::new(NativeLibrariesCompressionSplitter::new(
            config.optimizations.uncompress_native_libraries,
        )));
        Self::new(splitters, config.split_sdk_floor)
    }

    /// Run every step over `split`, then coalesce and floor the results.
    pub fn split(&self, split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        let module = split.module_name.clone();
        let mut splits = vec![split];
        for splitter in &self.splitters {
            let mut next = Vec::with_capacity(splits.len());
            for input in splits {
                let targeting = input.apk_targeting.clone();
                let outputs = splitter.split(input)?;
                validate_sibling_partition(&module, &targeting, &outputs)?;
                next.extend(outputs);
            }
            tracing::debug!(
                module = %module,
                splitter = ?splitter,
                splits = next.len(),
                "applied splitter"
            );
            splits = next;
        }

        let splits = merge_same_targeting(splits)?;
        let splits = inject_sdk_floor(splits, self.sdk_floor)?;
        for split in &splits {
            validate_apk_targeting(&split.apk_targeting, &format!("a split of module '{module}'"))?;
        }
        Ok(splits)
    }
}

/// Complete the module's directory configs and split it.
pub fn split_module(module: &BundleModule, config: &BundleConfig) -> Result<Vec<ModuleSplit>> {
    let module = complete_module_configs(module)?;
    let splits = SplittingPipeline::from_config(config).split(ModuleSplit::for_module(&module))?;
    tracing::info!(module = %module.name, splits = splits.len(), "split module");
    Ok(splits)
}

/// [`split_module`] over independent modules in parallel, results in
/// module order.
pub fn split_modules_parallel(
    modules: &[BundleModule],
    config: &BundleConfig,
) -> Result<Vec<Vec<ModuleSplit>>> {
    modules
        .par_iter()
        .map(|module| split_module(module, config))
        .collect()
}

fn check_dimension<V: TargetingValue>(
    dimension: TargetingDimension,
    unit: &str,
    input: Option<&DimensionTargeting<V>>,
    outputs: &[ModuleSplit],
    field: impl Fn(&ApkTargeting) -> Option<&DimensionTargeting<V>>,
) -> Result<()> {
    if input.is_some() {
        return Ok(());
    }
    let siblings: Vec<&DimensionTargeting<V>> =
        outputs.iter().filter_map(|s| field(&s.apk_targeting)).collect();
    validate_partition(dimension, unit, &siblings)
}

/// Check that the splits derived from one input partition every dimension
/// the input was not targeted on yet.
pub fn validate_sibling_partition(
    module: &bundlekit_schema::ModuleName,
    input: &ApkTargeting,
    outputs: &[ModuleSplit],
) -> Result<()> {
    use TargetingDimension as D;
    let unit = format!("the splits of module '{module}'");
    let unit = unit.as_str();
    check_dimension(D::Abi, unit, input.abi.as_ref(), outputs, |t| t.abi.as_ref())?;
    check_dimension(
        D::ScreenDensity,
        unit,
        input.screen_density.as_ref(),
        outputs,
        |t| t.screen_density.as_ref(),
    )?;
    check_dimension(D::Language, unit, input.language.as_ref(), outputs, |t| {
        t.language.as_ref()
    })?;
    check_dimension(
        D::TextureCompressionFormat,
        unit,
        input.texture_compression_format.as_ref(),
        outputs,
        |t| t.texture_compression_format.as_ref(),
    )?;
    check_dimension(D::DeviceTier, unit, input.device_tier.as_ref(), outputs, |t| {
        t.device_tier.as_ref()
    })?;
    check_dimension(D::CountrySet, unit, input.country_set.as_ref(), outputs, |t| {
        t.country_set.as_ref()
    })?;
    check_dimension(D::MultiAbi, unit, input.multi_abi.as_ref(), outputs, |t| {
        t.multi_abi.as_ref()
    })?;
    check_dimension(D::SdkVersion, unit, input.sdk_version.as_ref(), outputs, |t| {
        t.sdk_version.as_ref()
    })?;
    check_dimension(D::Sanitizer, unit, input.sanitizer.as_ref(), outputs, |t| {
        t.sanitizer.as_ref()
    })
}

/// Combine two splits of one module that share their targeting.
fn merge_split_pair(first: ModuleSplit, second: ModuleSplit) -> Result<ModuleSplit> {
    let mut entries = EntryMerger::new();
    entries.merge_all(&first.module_name, first.entries)?;
    entries.merge_all(&second.module_name, second.entries)?;
    Ok(ModuleSplit {
        entries: entries.into_entries()?,
        resource_table: merge_optional(
            first.resource_table,
            second.resource_table.as_ref(),
            merge_resource_tables,
        )?,
        assets_config: merge_optional(
            first.assets_config,
            second.assets_config.as_ref(),
            merge_assets_configs,
        )?,
        native_config: merge_optional(
            first.native_config,
            second.native_config.as_ref(),
            merge_native_configs,
        )?,
        apex_config: merge_optional(
            first.apex_config,
            second.apex_config.as_ref(),
            merge_apex_configs,
        )?,
        is_master_split: first.is_master_split || second.is_master_split,
        ..first
    })
}

/// Coalesce splits with equal `(ApkTargeting, VariantTargeting)` and mark
/// the one split with default targeting as master.
pub fn merge_same_targeting(splits: Vec<ModuleSplit>) -> Result<Vec<ModuleSplit>> {
    let count = splits.len();
    let mut groups: IndexMap<(ApkTargeting, VariantTargeting), ModuleSplit> = IndexMap::new();
    for split in splits {
        let key = (split.apk_targeting.clone(), split.variant_targeting.clone());
        match groups.entry(key) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                let placeholder = existing.derived(existing.apk_targeting.clone());
                let first = std::mem::replace(existing, placeholder);
                *existing = merge_split_pair(first, split)?;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(split);
            }
        }
    }

    let mut merged: Vec<ModuleSplit> = groups.into_values().collect();
    let masters = merged
        .iter()
        .filter(|s| s.apk_targeting.is_default())
        .count();
    if masters != 1 {
        let module = merged
            .first()
            .map(|s| s.module_name.to_string())
            .unwrap_or_default();
        return Err(BundleError::TargetingInvariant(format!(
            "Expected exactly one master split for module '{module}', found {masters}"
        )));
    }
    for split in &mut merged {
        split.is_master_split = split.apk_targeting.is_default();
    }
    tracing::debug!(before = count, after = merged.len(), "merged splits with same targeting");
    Ok(merged)
}

/// Give every split the SDK floor unless it already targets an SDK at or
/// above it.
pub fn inject_sdk_floor(splits: Vec<ModuleSplit>, floor: u32) -> Result<Vec<ModuleSplit>> {
    splits
        .into_iter()
        .map(|mut split| {
            let below_floor = split
                .apk_targeting
                .sdk_version
                .as_ref()
                .and_then(|sdk| sdk.values.first().copied())
                .filter(|min| *min < floor);
            if let Some(min) = below_floor {
                return Err(BundleError::TargetingInvariant(format!(
                    "Split of module '{}' targets SDK {min}, below the platform floor {floor}",
                    split.module_name
                )));
            }
            if split.apk_targeting.sdk_version.is_none() {
                split.apk_targeting.sdk_version = Some(DimensionTargeting::single(floor));
            }
            Ok(split)
        })
        .collect()
}

/// Remove and return the entries matching `take`.
pub(crate) fn take_entries(
    entries: &mut Vec<ModuleEntry>,
    take: impl Fn(&ModuleEntry) -> bool,
) -> Vec<ModuleEntry> {
    let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(entries).into_iter().partition(|e| take(e));
    *entries = kept;
    taken
}

/// Whether `entry` sits directly in one of `directories`.
pub(crate) fn in_directories(entry: &ModuleEntry, directories: &BTreeSet<ZipPath>) -> bool {
    entry
        .path
        .parent()
        .is_some_and(|parent| directories.contains(&parent))
}

/// Whether `entry` sits anywhere below one of `directories`.
pub(crate) fn under_directories(entry: &ModuleEntry, directories: &BTreeSet<ZipPath>) -> bool {
    directories.iter().any(|d| entry.is_under(d))
}

#[cfg(test)]
pub(crate) mod test_support {
    use bundlekit_schema::{AndroidManifest, BundleModule, ModuleEntry, ModuleName, ModuleSplit};

    use crate::targeting::generator::complete_module_configs;

    pub fn module(name: &str, paths: &[&str]) -> BundleModule {
        let entries = paths
            .iter()
            .map(|p| ModuleEntry::from_bytes(p, format!("content of {p}")))
            .collect();
        let module = BundleModule::new(ModuleName::new(name), AndroidManifest::new("com.example"), entries);
        complete_module_configs(&module).unwrap()
    }

    pub fn master(paths: &[&str]) -> ModuleSplit {
        ModuleSplit::for_module(&module("base", paths))
    }

    pub fn paths(split: &ModuleSplit) -> Vec<&str> {
        split.entries.iter().map(|e| e.path.as_str()).collect()
    }
}
