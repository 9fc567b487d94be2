//! `name#key_value` directory suffixes.
//!
//! A directory such as `assets/tex#tcf_astc/level#tier_1` is targeted on
//! texture compression format `astc` and device tier `1`. Directories that
//! only differ by suffixes form a *group* sharing one base path
//! (`assets/tex/level`).

use std::collections::{BTreeSet, HashSet};

use bundlekit_schema::{TargetingDimension, ZipPath};
use indexmap::IndexMap;

use crate::error::{BundleError, Result};
use crate::targeting::dimension::canonical_suffix_value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectorySuffix {
    pub dimension: TargetingDimension,
    /// Canonical value (`etc1_rgb8` even when written `etc1`).
    pub value: String,
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    suffixes: Vec<DirectorySuffix>,
}

/// A directory path parsed into names and targeting suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetedDirectory {
    path: ZipPath,
    segments: Vec<Segment>,
}

impl TargetedDirectory {
    pub fn parse(path: &ZipPath) -> Result<Self> {
        let invalid = |dimension, reason: String| BundleError::InvalidTargeting {
            dimension,
            unit: format!("directory '{path}'"),
            reason,
        };

        let mut seen = BTreeSet::new();
        let mut segments = Vec::new();
        for raw_segment in path.segments() {
            let mut parts = raw_segment.split('#');
            let name = parts.next().unwrap_or_default();
            if name.is_empty() {
                return Err(BundleError::TargetingInvariant(format!(
                    "Directory '{path}' contains a targeting suffix without a directory name"
                )));
            }

            let mut suffixes = Vec::new();
            for raw in parts {
                let dimension = raw
                    .split_once('_')
                    .and_then(|(key, _)| TargetingDimension::from_directory_key(key))
                    .ok_or_else(|| {
                        BundleError::TargetingInvariant(format!(
                            "Directory '{path}' has unrecognized targeting suffix '#{raw}'"
                        ))
                    })?;
                let (_, raw_value) = raw.split_once('_').unwrap_or_default();
                let value = canonical_suffix_value(dimension, raw_value)
                    .ok_or_else(|| invalid(dimension, format!("invalid value '{raw_value}'")))?;
                if !seen.insert(dimension) {
                    return Err(invalid(
                        dimension,
                        "the dimension is targeted more than once".to_string(),
                    ));
                }
                suffixes.push(DirectorySuffix {
                    dimension,
                    value,
                    raw: raw.to_string(),
                });
            }
            segments.push(Segment {
                name: name.to_string(),
                suffixes,
            });
        }
        Ok(Self {
            path: path.clone(),
            segments,
        })
    }

    pub fn path(&self) -> &ZipPath {
        &self.path
    }

    /// Path with every suffix removed; identifies the directory's group.
    pub fn base_path(&self) -> ZipPath {
        let names: Vec<&str> = self.segments.iter().map(|s| s.name.as_str()).collect();
        ZipPath::new(&names.join("/"))
    }

    /// Path with only the `dimension` suffix removed.
    pub fn path_without(&self, dimension: TargetingDimension) -> ZipPath {
        let segments: Vec<String> = self
            .segments
            .iter()
            .map(|segment| {
                let mut text = segment.name.clone();
                for suffix in segment.suffixes.iter().filter(|s| s.dimension != dimension) {
                    text.push('#');
                    text.push_str(&suffix.raw);
                }
                text
            })
            .collect();
        ZipPath::new(&segments.join("/"))
    }

    /// Suffixes from the outermost segment inwards.
    pub fn suffixes(&self) -> impl Iterator<Item = &DirectorySuffix> {
        self.segments.iter().flat_map(|s| &s.suffixes)
    }

    /// Targeted dimensions in nesting order.
    pub fn dimensions(&self) -> Vec<TargetingDimension> {
        self.suffixes().map(|s| s.dimension).collect()
    }

    pub fn value(&self, dimension: TargetingDimension) -> Option<&str> {
        self.suffixes()
            .find(|s| s.dimension == dimension)
            .map(|s| s.value.as_str())
    }

    pub fn is_targeted(&self) -> bool {
        self.suffixes().next().is_some()
    }
}

/// Group directories by base path, keeping first-seen order.
pub fn group_by_base_path(
    directories: &[TargetedDirectory],
) -> IndexMap<ZipPath, Vec<&TargetedDirectory>> {
    let mut groups: IndexMap<ZipPath, Vec<&TargetedDirectory>> = IndexMap::new();
    for directory in directories {
        groups.entry(directory.base_path()).or_default().push(directory);
    }
    groups
}

fn describe_dimensions(dimensions: &[TargetingDimension]) -> String {
    let names: Vec<&str> = dimensions.iter().map(TargetingDimension::as_str).collect();
    format!("[{}]", names.join(", "))
}

fn cartesian(sets: &[BTreeSet<String>]) -> Vec<Vec<String>> {
    sets.iter().fold(vec![Vec::new()], |combinations, set| {
        combinations
            .iter()
            .flat_map(|prefix| {
                set.iter().map(move |value| {
                    let mut combination = prefix.clone();
                    combination.push(value.clone());
                    combination
                })
            })
            .collect()
    })
}

/// Validate groups containing a directory with more than one suffix.
///
/// All targeted directories of such a group must use the same dimensions in
/// the same nesting order and must cover every combination of the group's
/// values. An untargeted fallback directory is allowed.
pub fn validate_nested_targeting(directories: &[TargetedDirectory]) -> Result<()> {
    for (base, group) in group_by_base_path(directories) {
        let Some(reference) = group.iter().copied().find(|d| d.dimensions().len() > 1) else {
            continue;
        };
        let reference_dimensions = reference.dimensions();
        let targeted: Vec<&TargetedDirectory> =
            group.into_iter().filter(|d| d.is_targeted()).collect();

        for directory in &targeted {
            let dimensions = directory.dimensions();
            if dimensions == reference_dimensions {
                continue;
            }
            let mut sorted = dimensions.clone();
            sorted.sort();
            let mut reference_sorted = reference_dimensions.clone();
            reference_sorted.sort();
            if sorted == reference_sorted {
                return Err(BundleError::TargetingInvariant(format!(
                    "Directories '{}' and '{}' nest the same targeting dimensions in a different order",
                    reference.path(),
                    directory.path()
                )));
            }
            return Err(BundleError::TargetingInvariant(format!(
                "Targeted directories of '{base}' must use the same dimensions in the same order: \
                 '{}' uses {} but '{}' uses {}",
                reference.path(),
                describe_dimensions(&reference_dimensions),
                directory.path(),
                describe_dimensions(&dimensions)
            )));
        }

        let value_sets: Vec<BTreeSet<String>> = reference_dimensions
            .iter()
            .map(|dimension| {
                targeted
                    .iter()
                    .filter_map(|d| d.value(*dimension))
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        let present: HashSet<Vec<String>> = targeted
            .iter()
            .map(|d| {
                reference_dimensions
                    .iter()
                    .map(|dimension| d.value(*dimension).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        if let Some(missing) = cartesian(&value_sets)
            .into_iter()
            .find(|combination| !present.contains(combination))
        {
            let described: Vec<String> = reference_dimensions
                .iter()
                .zip(&missing)
                .map(|(dimension, value)| format!("{dimension}={value}"))
                .collect();
            return Err(BundleError::TargetingInvariant(format!(
                "Directory group '{base}' has no directory for the combination {}",
                described.join(", ")
            )));
        }
    }
    Ok(())
}

/// Every group targeted on a directory-suffix dimension other than language
/// must declare the same set of values, so that each value's split carries
/// a version of every group.
pub fn validate_dimension_parity(directories: &[TargetedDirectory]) -> Result<()> {
    for dimension in [
        TargetingDimension::TextureCompressionFormat,
        TargetingDimension::DeviceTier,
        TargetingDimension::CountrySet,
    ] {
        let mut reference: Option<(ZipPath, BTreeSet<String>)> = None;
        for (base, group) in group_by_base_path(directories) {
            let values: BTreeSet<String> = group
                .iter()
                .filter_map(|d| d.value(dimension))
                .map(str::to_string)
                .collect();
            if values.is_empty() {
                continue;
            }
            if let Some((reference_base, reference_values)) = &reference {
                if *reference_values != values {
                    return Err(BundleError::InvalidTargeting {
                        dimension,
                        unit: format!("directory group '{base}'"),
                        reason: format!(
                            "values {values:?} differ from {reference_values:?} used by '{reference_base}'"
                        ),
                    });
                }
            } else {
                reference = Some((base, values));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(paths: &[&str]) -> Vec<TargetedDirectory> {
        paths
            .iter()
            .map(|p| TargetedDirectory::parse(&ZipPath::new(p)).unwrap())
            .collect()
    }

    #[test]
    fn parses_nested_suffixes() {
        let dir = TargetedDirectory::parse(&ZipPath::new("assets/tex#tcf_etc1/level#tier_1"))
            .unwrap();
        assert_eq!(dir.base_path(), ZipPath::new("assets/tex/level"));
        assert_eq!(
            dir.dimensions(),
            vec![
                TargetingDimension::TextureCompressionFormat,
                TargetingDimension::DeviceTier
            ]
        );
        assert_eq!(dir.value(TargetingDimension::TextureCompressionFormat), Some("etc1_rgb8"));
        assert_eq!(
            dir.path_without(TargetingDimension::TextureCompressionFormat),
            ZipPath::new("assets/tex/level#tier_1")
        );
    }

    #[test]
    fn rejects_unknown_key_and_repeated_dimension() {
        assert!(TargetedDirectory::parse(&ZipPath::new("assets/tex#gpu_adreno")).is_err());
        assert!(TargetedDirectory::parse(&ZipPath::new("assets/a#tier_1/b#tier_2")).is_err());
        assert!(TargetedDirectory::parse(&ZipPath::new("assets/tex#tcf_bc7")).is_err());
    }

    #[test]
    fn nested_full_product_with_fallback_is_valid() {
        let dirs = parse_all(&[
            "assets/tex",
            "assets/tex#tcf_astc#tier_0",
            "assets/tex#tcf_astc#tier_1",
            "assets/tex#tcf_etc2#tier_0",
            "assets/tex#tcf_etc2#tier_1",
        ]);
        validate_nested_targeting(&dirs).unwrap();
    }

    #[test]
    fn nested_missing_combination_is_named() {
        let dirs = parse_all(&[
            "assets/tex#tcf_astc#tier_0",
            "assets/tex#tcf_astc#tier_1",
            "assets/tex#tcf_etc2#tier_0",
        ]);
        let err = validate_nested_targeting(&dirs).unwrap_err();
        assert!(
            err.to_string()
                .contains("texture_compression_format=etc2, device_tier=1"),
            "{err}"
        );
    }

    #[test]
    fn nested_order_and_dimension_mismatches() {
        let reordered = parse_all(&["assets/tex#tcf_astc#tier_0", "assets/tex#tier_1#tcf_etc2"]);
        let err = validate_nested_targeting(&reordered).unwrap_err();
        assert!(err.to_string().contains("different order"), "{err}");

        let mixed = parse_all(&["assets/tex#tcf_astc#tier_0", "assets/tex#tcf_etc2"]);
        let err = validate_nested_targeting(&mixed).unwrap_err();
        assert!(err.to_string().contains("same dimensions"), "{err}");
    }

    #[test]
    fn parity_requires_same_values_across_groups() {
        let dirs = parse_all(&[
            "assets/tex#tcf_astc",
            "assets/tex#tcf_etc2",
            "assets/img#tcf_astc",
        ]);
        assert!(validate_dimension_parity(&dirs).is_err());

        let dirs = parse_all(&[
            "assets/tex#tcf_astc",
            "assets/tex#tcf_etc2",
            "assets/img#tcf_etc2",
            "assets/img#tcf_astc",
            "assets/music#lang_fr",
        ]);
        validate_dimension_parity(&dirs).unwrap();
    }
}
