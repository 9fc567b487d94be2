//! Targeting algebra: merging, alternatives and partition validation.

pub mod dimension;
pub mod directory;
pub mod generator;

use std::collections::BTreeSet;

use bundlekit_schema::{
    ApkTargeting, AssetsDirectoryTargeting, DimensionTargeting, TargetingDimension,
    TargetingValue,
};

use crate::error::{BundleError, Result};

/// Dimensions a shard may combine from its splits.
pub const SHARD_MERGEABLE_DIMENSIONS: [TargetingDimension; 3] = [
    TargetingDimension::Abi,
    TargetingDimension::ScreenDensity,
    TargetingDimension::Language,
];

/// Union of two targetings of the same dimension.
///
/// `values` become the union of both values; everything else either side
/// knew about becomes an alternative.
pub fn merge_dimension<V: TargetingValue>(
    a: &DimensionTargeting<V>,
    b: &DimensionTargeting<V>,
) -> DimensionTargeting<V> {
    let values: BTreeSet<V> = a.values.union(&b.values).cloned().collect();
    let universe: BTreeSet<V> = a.universe().union(&b.universe()).cloned().collect();
    let alternatives = universe.difference(&values).cloned().collect();
    DimensionTargeting {
        values,
        alternatives,
    }
}

fn merge_optional<V: TargetingValue>(
    a: Option<&DimensionTargeting<V>>,
    b: Option<&DimensionTargeting<V>>,
) -> Option<DimensionTargeting<V>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(merge_dimension(a, b)),
        (Some(t), None) | (None, Some(t)) => Some(t.clone()),
        (None, None) => None,
    }
}

/// Targeting of a fallback unit: every declared value becomes an alternative.
pub fn to_alternative<V: TargetingValue>(targeting: &DimensionTargeting<V>) -> DimensionTargeting<V> {
    DimensionTargeting {
        values: BTreeSet::new(),
        alternatives: targeting.values.clone(),
    }
}

/// [`to_alternative`] applied to every dimension of an assets directory.
pub fn to_alternative_assets(targeting: &AssetsDirectoryTargeting) -> AssetsDirectoryTargeting {
    AssetsDirectoryTargeting {
        abi: targeting.abi.as_ref().map(to_alternative),
        language: targeting.language.as_ref().map(to_alternative),
        texture_compression_format: targeting
            .texture_compression_format
            .as_ref()
            .map(to_alternative),
        device_tier: targeting.device_tier.as_ref().map(to_alternative),
        country_set: targeting.country_set.as_ref().map(to_alternative),
    }
}

fn describe<V: TargetingValue>(values: &BTreeSet<V>) -> String {
    let names: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(", "))
}

/// Reject targetings whose values and alternatives overlap.
pub fn validate_exclusive<V: TargetingValue>(
    dimension: TargetingDimension,
    unit: &str,
    targeting: &DimensionTargeting<V>,
) -> Result<()> {
    let overlap = targeting.overlap();
    if overlap.is_empty() {
        return Ok(());
    }
    Err(BundleError::InvalidTargeting {
        dimension,
        unit: unit.to_string(),
        reason: format!(
            "targeting values and alternatives must be mutually exclusive, both contain {}",
            describe(&overlap)
        ),
    })
}

fn validate_optional<V: TargetingValue>(
    dimension: TargetingDimension,
    unit: &str,
    targeting: Option<&DimensionTargeting<V>>,
) -> Result<()> {
    targeting.map_or(Ok(()), |t| validate_exclusive(dimension, unit, t))
}

/// Check every dimension of an APK targeting.
pub fn validate_apk_targeting(targeting: &ApkTargeting, unit: &str) -> Result<()> {
    use TargetingDimension as D;
    validate_optional(D::Abi, unit, targeting.abi.as_ref())?;
    validate_optional(D::ScreenDensity, unit, targeting.screen_density.as_ref())?;
    validate_optional(D::Language, unit, targeting.language.as_ref())?;
    validate_optional(
        D::TextureCompressionFormat,
        unit,
        targeting.texture_compression_format.as_ref(),
    )?;
    validate_optional(D::DeviceTier, unit, targeting.device_tier.as_ref())?;
    validate_optional(D::CountrySet, unit, targeting.country_set.as_ref())?;
    validate_optional(D::MultiAbi, unit, targeting.multi_abi.as_ref())?;
    validate_optional(D::SdkVersion, unit, targeting.sdk_version.as_ref())?;
    validate_optional(D::Sanitizer, unit, targeting.sanitizer.as_ref())
}

/// Check every dimension of an assets directory targeting.
pub fn validate_assets_targeting(targeting: &AssetsDirectoryTargeting, unit: &str) -> Result<()> {
    use TargetingDimension as D;
    validate_optional(D::Abi, unit, targeting.abi.as_ref())?;
    validate_optional(D::Language, unit, targeting.language.as_ref())?;
    validate_optional(
        D::TextureCompressionFormat,
        unit,
        targeting.texture_compression_format.as_ref(),
    )?;
    validate_optional(D::DeviceTier, unit, targeting.device_tier.as_ref())?;
    validate_optional(D::CountrySet, unit, targeting.country_set.as_ref())
}

/// Union of the targetings of splits merged into one shard.
///
/// Only ABI, screen density and language can be combined.
pub fn merge_apk_targeting_for_shard(a: &ApkTargeting, b: &ApkTargeting) -> Result<ApkTargeting> {
    for targeting in [a, b] {
        if let Some(dimension) = targeting
            .dimensions()
            .into_iter()
            .find(|d| !SHARD_MERGEABLE_DIMENSIONS.contains(d))
        {
            return Err(BundleError::TargetingInvariant(format!(
                "Unexpected {dimension} targeting while merging splits into a shard; \
                 only abi, screen_density and language can be merged"
            )));
        }
        validate_apk_targeting(targeting, "shard input")?;
    }
    Ok(ApkTargeting {
        abi: merge_optional(a.abi.as_ref(), b.abi.as_ref()),
        screen_density: merge_optional(a.screen_density.as_ref(), b.screen_density.as_ref()),
        language: merge_optional(a.language.as_ref(), b.language.as_ref()),
        ..ApkTargeting::default()
    })
}

/// Check that sibling targetings split one universe into disjoint parts
/// that together cover all of it.
pub fn validate_partition<V: TargetingValue>(
    dimension: TargetingDimension,
    unit: &str,
    siblings: &[&DimensionTargeting<V>],
) -> Result<()> {
    let Some(first) = siblings.first() else {
        return Ok(());
    };
    let universe = first.universe();
    let mut covered = BTreeSet::new();

    for sibling in siblings {
        validate_exclusive(dimension, unit, sibling)?;
        let sibling_universe = sibling.universe();
        if sibling_universe != universe {
            return Err(BundleError::InvalidTargeting {
                dimension,
                unit: unit.to_string(),
                reason: format!(
                    "sibling splits disagree on the set of values: {} vs {}",
                    describe(&universe),
                    describe(&sibling_universe)
                ),
            });
        }
        for value in &sibling.values {
            if !covered.insert(value.clone()) {
                return Err(BundleError::InvalidTargeting {
                    dimension,
                    unit: unit.to_string(),
                    reason: format!("value {value} is targeted by more than one split"),
                });
            }
        }
    }

    let missing: BTreeSet<V> = universe.difference(&covered).cloned().collect();
    if !missing.is_empty() {
        return Err(BundleError::InvalidTargeting {
            dimension,
            unit: unit.to_string(),
            reason: format!("no split serves {}", describe(&missing)),
        });
    }
    Ok(())
}

/// Dotted suffix naming a split's targeting (`arm64_v8a.xhdpi`), empty for
/// the master split.
pub fn targeting_suffix(targeting: &ApkTargeting) -> String {
    fn part<V: TargetingValue>(
        parts: &mut Vec<String>,
        targeting: Option<&DimensionTargeting<V>>,
        name: impl Fn(&V) -> String,
        fallback: &str,
    ) {
        if let Some(t) = targeting {
            if t.values.is_empty() {
                parts.push(fallback.to_string());
            } else {
                let names: Vec<String> = t.values.iter().map(&name).collect();
                parts.push(names.join("_"));
            }
        }
    }

    let mut parts = Vec::new();
    part(&mut parts, targeting.abi.as_ref(), |abi| abi.split_name(), "other_abi");
    part(&mut parts, targeting.sanitizer.as_ref(), ToString::to_string, "no_sanitizer");
    part(&mut parts, targeting.screen_density.as_ref(), ToString::to_string, "other_density");
    part(&mut parts, targeting.language.as_ref(), Clone::clone, "other_lang");
    part(
        &mut parts,
        targeting.texture_compression_format.as_ref(),
        ToString::to_string,
        "other_tcf",
    );
    part(&mut parts, targeting.device_tier.as_ref(), |tier| format!("tier_{tier}"), "other_tier");
    part(
        &mut parts,
        targeting.country_set.as_ref(),
        |countries| format!("countries_{countries}"),
        "other_countries",
    );
    part(&mut parts, targeting.multi_abi.as_ref(), ToString::to_string, "other_multi_abi");
    parts.join(".")
}
