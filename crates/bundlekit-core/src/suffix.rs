//! Suffix stripping: collapse directories targeted on one dimension down to
//! a single value, for archives that cannot select between them at install
//! time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use bundlekit_schema::{
    Assets, AssetsDirectoryTargeting, DimensionTargeting, ModuleSplit, TargetedAssetsDirectory,
    TargetingDimension, ZipPath,
};
use indexmap::IndexMap;

use crate::config::{ConfigError, SuffixStripping};
use crate::error::{BundleError, Result};
use crate::merge::EntryMerger;
use crate::targeting::dimension::{
    AssetsDimension, CountrySetDimension, DeviceTierDimension, TextureCompressionFormatDimension,
};
use crate::targeting::directory::TargetedDirectory;

/// Dimension-erased suffix stripping, as configured per split dimension.
pub trait StripSuffixes: fmt::Debug + Send + Sync {
    /// Dimension whose suffixes this stripper handles.
    fn dimension(&self) -> TargetingDimension;

    /// Keep one value's directories per group and, if the policy is
    /// enabled, drop the suffix from the kept directory paths.
    fn apply(&self, split: ModuleSplit, policy: &SuffixStripping) -> Result<ModuleSplit>;

    /// Drop every suffix of the dimension without choosing a value.
    fn remove_all_suffixes(&self, split: ModuleSplit) -> Result<ModuleSplit>;
}

/// Stripper for the dimensions that support it: texture compression format,
/// device tier and country set.
pub fn suffix_stripper(dimension: TargetingDimension) -> Result<Box<dyn StripSuffixes>> {
    match dimension {
        TargetingDimension::TextureCompressionFormat => Ok(Box::new(
            SuffixStripper::<TextureCompressionFormatDimension>::new(),
        )),
        TargetingDimension::DeviceTier => Ok(Box::new(SuffixStripper::<DeviceTierDimension>::new())),
        TargetingDimension::CountrySet => Ok(Box::new(SuffixStripper::<CountrySetDimension>::new())),
        other => Err(BundleError::Config(ConfigError::Invalid(format!(
            "suffix stripping is not supported for dimension {other}"
        )))),
    }
}

/// Suffix stripping for one assets dimension `D`.
#[derive(Debug, Clone, Copy)]
pub struct SuffixStripper<D: AssetsDimension> {
    dimension: PhantomData<D>,
}

impl<D: AssetsDimension> Default for SuffixStripper<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: AssetsDimension> SuffixStripper<D> {
    /// Stripper for `D`.
    pub fn new() -> Self {
        Self {
            dimension: PhantomData,
        }
    }

    fn parse_directories(assets: &Assets) -> Result<Vec<TargetedDirectory>> {
        assets
            .directories
            .iter()
            .map(|node| TargetedDirectory::parse(&node.path))
            .collect()
    }

    /// Directories that lose the selection, per group of siblings.
    fn unselected_directories(
        split: &ModuleSplit,
        assets: &Assets,
        default_value: Option<&str>,
    ) -> Result<HashSet<ZipPath>> {
        let directories = Self::parse_directories(assets)?;
        let mut groups: IndexMap<ZipPath, Vec<&TargetedDirectory>> = IndexMap::new();
        for directory in &directories {
            groups
                .entry(directory.path_without(D::DIMENSION))
                .or_default()
                .push(directory);
        }

        let mut unselected = HashSet::new();
        for (group, members) in groups {
            if members.iter().all(|d| d.value(D::DIMENSION).is_none()) {
                continue;
            }
            let keep = default_value
                .and_then(|default| {
                    members
                        .iter()
                        .find(|d| d.value(D::DIMENSION) == Some(default))
                })
                .or_else(|| members.iter().find(|d| d.value(D::DIMENSION).is_none()))
                .ok_or_else(|| BundleError::ConfigurationGap {
                    dimension: D::DIMENSION,
                    module: split.module_name.clone(),
                    reason: match default_value {
                        Some(default) => format!(
                            "group '{group}' has neither a directory for the default value \
                             '{default}' nor a fallback directory"
                        ),
                        None => format!(
                            "group '{group}' has no fallback directory and no default suffix \
                             is configured"
                        ),
                    },
                })?;
            unselected.extend(
                members
                    .iter()
                    .filter(|d| d.path() != keep.path())
                    .map(|d| d.path().clone()),
            );
        }
        Ok(unselected)
    }

    /// Rewrite every directory without the dimension's suffix, collapsing
    /// directories that end up at the same path.
    fn strip_paths(mut split: ModuleSplit) -> Result<ModuleSplit> {
        let Some(assets) = split.assets_config.take() else {
            return Ok(split);
        };

        let mut renames: HashMap<ZipPath, ZipPath> = HashMap::new();
        let mut nodes: IndexMap<ZipPath, AssetsDirectoryTargeting> = IndexMap::new();
        for node in assets.directories {
            let new_path = TargetedDirectory::parse(&node.path)?.path_without(D::DIMENSION);
            let mut targeting = node.targeting;
            D::set_assets(&mut targeting, None);
            match nodes.get(&new_path) {
                Some(existing) if *existing != targeting => {
                    return Err(BundleError::TargetingInvariant(format!(
                        "Directories collapsing into '{new_path}' carry different targeting"
                    )));
                }
                Some(_) => {}
                None => {
                    nodes.insert(new_path.clone(), targeting);
                }
            }
            if new_path != node.path {
                renames.insert(node.path, new_path);
            }
        }

        let mut merger = EntryMerger::new();
        for entry in std::mem::take(&mut split.entries) {
            let renamed = entry
                .path
                .parent()
                .and_then(|parent| renames.get(&parent))
                .map(|directory| directory.join(entry.path.file_name()));
            let entry = match renamed {
                Some(path) => entry.with_path(path),
                None => entry,
            };
            merger.merge_entry(&split.module_name, entry)?;
        }
        split.entries = merger.into_entries()?;
        split.assets_config = Some(Assets {
            directories: nodes
                .into_iter()
                .map(|(path, targeting)| TargetedAssetsDirectory { path, targeting })
                .collect(),
        });
        Ok(split)
    }
}

impl<D: AssetsDimension> StripSuffixes for SuffixStripper<D> {
    fn dimension(&self) -> TargetingDimension {
        D::DIMENSION
    }

    fn apply(&self, mut split: ModuleSplit, policy: &SuffixStripping) -> Result<ModuleSplit> {
        let default_value = policy
            .default_suffix
            .as_deref()
            .map(|raw| {
                D::parse(raw).ok_or_else(|| {
                    BundleError::Config(ConfigError::Invalid(format!(
                        "invalid default suffix '{raw}' for dimension {}",
                        D::DIMENSION
                    )))
                })
            })
            .transpose()?;

        let Some(assets) = split.assets_config.clone() else {
            return Ok(split);
        };

        if D::apk(&split.apk_targeting).is_none() {
            let canonical_default = default_value.as_ref().map(ToString::to_string);
            let unselected =
                Self::unselected_directories(&split, &assets, canonical_default.as_deref())?;

            split.entries.retain(|entry| {
                entry
                    .path
                    .parent()
                    .is_none_or(|parent| !unselected.contains(&parent))
            });
            split.assets_config = Some(Assets {
                directories: assets
                    .directories
                    .into_iter()
                    .filter(|node| !unselected.contains(&node.path))
                    .collect(),
            });
            tracing::debug!(
                module = %split.module_name,
                dimension = %D::DIMENSION,
                dropped = unselected.len(),
                "selected directories for suffix stripping"
            );

            if let Some(default) = default_value {
                D::set_apk(&mut split.apk_targeting, DimensionTargeting::single(default.clone()));
                D::set_variant(&mut split.variant_targeting, DimensionTargeting::single(default));
            }
        }

        if policy.enabled {
            split = Self::strip_paths(split)?;
        }
        Ok(split)
    }

    fn remove_all_suffixes(&self, mut split: ModuleSplit) -> Result<ModuleSplit> {
        split.apk_targeting = split.apk_targeting.without(D::DIMENSION);
        split.variant_targeting = split.variant_targeting.without(D::DIMENSION);
        Self::strip_paths(split)
    }
}
