//! Typed access to the dimensions that assets directories are targeted on.
//!
//! The assets splitter and the suffix stripper are written once against
//! [`AssetsDimension`] and instantiated per dimension.

use std::fmt;
use std::str::FromStr;

use bundlekit_schema::{
    ApkTargeting, AssetsDirectoryTargeting, DimensionTargeting, TargetingDimension,
    TargetingValue, TextureCompressionFormat, VariantTargeting,
};

pub trait AssetsDimension: fmt::Debug + Send + Sync + 'static {
    type Value: TargetingValue + FromStr + Send + Sync;

    const DIMENSION: TargetingDimension;

    fn assets(targeting: &AssetsDirectoryTargeting) -> Option<&DimensionTargeting<Self::Value>>;

    fn set_assets(
        targeting: &mut AssetsDirectoryTargeting,
        value: Option<DimensionTargeting<Self::Value>>,
    );

    fn apk(targeting: &ApkTargeting) -> Option<&DimensionTargeting<Self::Value>>;

    fn set_apk(targeting: &mut ApkTargeting, value: DimensionTargeting<Self::Value>);

    /// Variant-level field, for dimensions that have one.
    fn set_variant(_targeting: &mut VariantTargeting, _value: DimensionTargeting<Self::Value>) {}

    /// Parse a directory suffix value into its canonical form.
    fn parse(raw: &str) -> Option<Self::Value> {
        raw.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageDimension;

impl AssetsDimension for LanguageDimension {
    type Value = String;

    const DIMENSION: TargetingDimension = TargetingDimension::Language;

    fn assets(targeting: &AssetsDirectoryTargeting) -> Option<&DimensionTargeting<String>> {
        targeting.language.as_ref()
    }

    fn set_assets(targeting: &mut AssetsDirectoryTargeting, value: Option<DimensionTargeting<String>>) {
        targeting.language = value;
    }

    fn apk(targeting: &ApkTargeting) -> Option<&DimensionTargeting<String>> {
        targeting.language.as_ref()
    }

    fn set_apk(targeting: &mut ApkTargeting, value: DimensionTargeting<String>) {
        targeting.language = Some(value);
    }

    fn parse(raw: &str) -> Option<String> {
        (!raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphabetic()))
            .then(|| raw.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextureCompressionFormatDimension;

impl AssetsDimension for TextureCompressionFormatDimension {
    type Value = TextureCompressionFormat;

    const DIMENSION: TargetingDimension = TargetingDimension::TextureCompressionFormat;

    fn assets(
        targeting: &AssetsDirectoryTargeting,
    ) -> Option<&DimensionTargeting<TextureCompressionFormat>> {
        targeting.texture_compression_format.as_ref()
    }

    fn set_assets(
        targeting: &mut AssetsDirectoryTargeting,
        value: Option<DimensionTargeting<TextureCompressionFormat>>,
    ) {
        targeting.texture_compression_format = value;
    }

    fn apk(targeting: &ApkTargeting) -> Option<&DimensionTargeting<TextureCompressionFormat>> {
        targeting.texture_compression_format.as_ref()
    }

    fn set_apk(targeting: &mut ApkTargeting, value: DimensionTargeting<TextureCompressionFormat>) {
        targeting.texture_compression_format = Some(value);
    }

    fn set_variant(
        targeting: &mut VariantTargeting,
        value: DimensionTargeting<TextureCompressionFormat>,
    ) {
        targeting.texture_compression_format = Some(value);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceTierDimension;

impl AssetsDimension for DeviceTierDimension {
    type Value = i32;

    const DIMENSION: TargetingDimension = TargetingDimension::DeviceTier;

    fn assets(targeting: &AssetsDirectoryTargeting) -> Option<&DimensionTargeting<i32>> {
        targeting.device_tier.as_ref()
    }

    fn set_assets(targeting: &mut AssetsDirectoryTargeting, value: Option<DimensionTargeting<i32>>) {
        targeting.device_tier = value;
    }

    fn apk(targeting: &ApkTargeting) -> Option<&DimensionTargeting<i32>> {
        targeting.device_tier.as_ref()
    }

    fn set_apk(targeting: &mut ApkTargeting, value: DimensionTargeting<i32>) {
        targeting.device_tier = Some(value);
    }

    fn set_variant(targeting: &mut VariantTargeting, value: DimensionTargeting<i32>) {
        targeting.device_tier = Some(value);
    }

    fn parse(raw: &str) -> Option<i32> {
        raw.parse().ok().filter(|tier| *tier >= 0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountrySetDimension;

impl AssetsDimension for CountrySetDimension {
    type Value = String;

    const DIMENSION: TargetingDimension = TargetingDimension::CountrySet;

    fn assets(targeting: &AssetsDirectoryTargeting) -> Option<&DimensionTargeting<String>> {
        targeting.country_set.as_ref()
    }

    fn set_assets(targeting: &mut AssetsDirectoryTargeting, value: Option<DimensionTargeting<String>>) {
        targeting.country_set = value;
    }

    fn apk(targeting: &ApkTargeting) -> Option<&DimensionTargeting<String>> {
        targeting.country_set.as_ref()
    }

    fn set_apk(targeting: &mut ApkTargeting, value: DimensionTargeting<String>) {
        targeting.country_set = Some(value);
    }

    fn set_variant(targeting: &mut VariantTargeting, value: DimensionTargeting<String>) {
        targeting.country_set = Some(value);
    }

    fn parse(raw: &str) -> Option<String> {
        (!raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .then(|| raw.to_string())
    }
}

/// Canonical spelling of a suffix value (`etc1` → `etc1_rgb8`), or `None`
/// if the value is invalid for `dimension`.
pub fn canonical_suffix_value(dimension: TargetingDimension, raw: &str) -> Option<String> {
    fn canonical<D: AssetsDimension>(raw: &str) -> Option<String> {
        D::parse(raw).map(|value| value.to_string())
    }
    match dimension {
        TargetingDimension::Language => canonical::<LanguageDimension>(raw),
        TargetingDimension::TextureCompressionFormat => {
            canonical::<TextureCompressionFormatDimension>(raw)
        }
        TargetingDimension::DeviceTier => canonical::<DeviceTierDimension>(raw),
        TargetingDimension::CountrySet => canonical::<CountrySetDimension>(raw),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_values() {
        use TargetingDimension as D;
        assert_eq!(
            canonical_suffix_value(D::TextureCompressionFormat, "etc1").as_deref(),
            Some("etc1_rgb8")
        );
        assert_eq!(canonical_suffix_value(D::Language, "FR").as_deref(), Some("fr"));
        assert_eq!(canonical_suffix_value(D::DeviceTier, "2").as_deref(), Some("2"));
        assert_eq!(canonical_suffix_value(D::DeviceTier, "-1"), None);
        assert_eq!(canonical_suffix_value(D::CountrySet, "latam").as_deref(), Some("latam"));
        assert_eq!(canonical_suffix_value(D::TextureCompressionFormat, "bc7"), None);
        assert_eq!(canonical_suffix_value(D::Abi, "x86"), None);
    }
}
