//! Multi-dimensional delivery targeting.
//!
//! Every targeted unit (split, assets directory, native directory, APEX
//! image) declares, per dimension, the `values` it serves and the sibling
//! `alternatives` it excludes. Absence of a dimension means the unit is not
//! targeted on it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::abi::{Abi, MultiAbi};

/// Independent configuration axes a unit can be targeted on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TargetingDimension {
    /// Native instruction set.
    Abi,
    /// Screen density bucket.
    ScreenDensity,
    /// Device language.
    Language,
    /// Supported GPU texture compression format.
    TextureCompressionFormat,
    /// Developer-defined device performance tier.
    DeviceTier,
    /// Developer-defined set of countries.
    CountrySet,
    /// Set of ABIs served together (APEX images).
    MultiAbi,
    /// Minimum platform API level.
    SdkVersion,
    /// Native libraries built with a sanitizer.
    Sanitizer,
}

impl TargetingDimension {
    /// Every dimension, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Abi,
        Self::ScreenDensity,
        Self::Language,
        Self::TextureCompressionFormat,
        Self::DeviceTier,
        Self::CountrySet,
        Self::MultiAbi,
        Self::SdkVersion,
        Self::Sanitizer,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abi => "abi",
            Self::ScreenDensity => "screen_density",
            Self::Language => "language",
            Self::TextureCompressionFormat => "texture_compression_format",
            Self::DeviceTier => "device_tier",
            Self::CountrySet => "country_set",
            Self::MultiAbi => "multi_abi",
            Self::SdkVersion => "sdk_version",
            Self::Sanitizer => "sanitizer",
        }
    }

    /// Key used in `name#key_value` directory suffixes, for the dimensions
    /// that can target an assets directory by name.
    pub fn directory_key(&self) -> Option<&'static str> {
        match self {
            Self::Language => Some("lang"),
            Self::TextureCompressionFormat => Some("tcf"),
            Self::DeviceTier => Some("tier"),
            Self::CountrySet => Some("countries"),
            _ => None,
        }
    }

    /// Inverse of [`directory_key`](Self::directory_key).
    pub fn from_directory_key(key: &str) -> Option<Self> {
        match key {
            "lang" => Some(Self::Language),
            "tcf" => Some(Self::TextureCompressionFormat),
            "tier" => Some(Self::DeviceTier),
            "countries" => Some(Self::CountrySet),
            _ => None,
        }
    }
}

impl fmt::Display for TargetingDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetingDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown targeting dimension: {s}"))
    }
}

/// Named screen density buckets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DensityAlias {
    /// Density-independent resources.
    Nodpi,
    /// ~120 dpi.
    Ldpi,
    /// ~160 dpi.
    Mdpi,
    /// ~213 dpi.
    Tvdpi,
    /// ~240 dpi.
    Hdpi,
    /// ~320 dpi.
    Xhdpi,
    /// ~480 dpi.
    Xxhdpi,
    /// ~640 dpi.
    Xxxhdpi,
}

impl DensityAlias {
    /// Buckets a density split is generated for, lowest first.
    pub const BUCKETS: [Self; 7] = [
        Self::Ldpi,
        Self::Mdpi,
        Self::Tvdpi,
        Self::Hdpi,
        Self::Xhdpi,
        Self::Xxhdpi,
        Self::Xxxhdpi,
    ];

    /// Dots per inch of the bucket, as stored in resource configurations.
    pub fn dpi(self) -> u32 {
        match self {
            Self::Nodpi => crate::resources::DENSITY_NONE,
            Self::Ldpi => 120,
            Self::Mdpi => 160,
            Self::Tvdpi => 213,
            Self::Hdpi => 240,
            Self::Xhdpi => 320,
            Self::Xxhdpi => 480,
            Self::Xxxhdpi => 640,
        }
    }

    /// Lowercase qualifier name (`xhdpi`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nodpi => "nodpi",
            Self::Ldpi => "ldpi",
            Self::Mdpi => "mdpi",
            Self::Tvdpi => "tvdpi",
            Self::Hdpi => "hdpi",
            Self::Xhdpi => "xhdpi",
            Self::Xxhdpi => "xxhdpi",
            Self::Xxxhdpi => "xxxhdpi",
        }
    }
}

/// A screen density, either a named bucket or a raw dpi value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ScreenDensity {
    /// Named bucket.
    Alias(DensityAlias),
    /// Raw dots per inch.
    Dpi(u32),
}

impl ScreenDensity {
    /// Dots per inch of this density.
    pub fn dpi(self) -> u32 {
        match self {
            Self::Alias(alias) => alias.dpi(),
            Self::Dpi(dpi) => dpi,
        }
    }
}

impl fmt::Display for ScreenDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alias(alias) => write!(f, "{}", alias.as_str()),
            Self::Dpi(dpi) => write!(f, "{dpi}dpi"),
        }
    }
}

/// GPU texture compression formats assets can be targeted on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TextureCompressionFormat {
    /// ETC1 (`etc1_rgb8`, also written `etc1`).
    Etc1Rgb8,
    /// Paletted textures.
    Paletted,
    /// ATI 3Dc.
    ThreeDc,
    /// ATI texture compression.
    Atc,
    /// Luminance-alpha texture compression.
    Latc,
    /// S3 DXT1.
    Dxt1,
    /// S3 texture compression.
    S3tc,
    /// `PowerVR` texture compression.
    Pvrtc,
    /// Adaptive scalable texture compression.
    Astc,
    /// ETC2.
    Etc2,
}

impl TextureCompressionFormat {
    /// Canonical suffix value (`etc1_rgb8`, `3dc`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Etc1Rgb8 => "etc1_rgb8",
            Self::Paletted => "paletted",
            Self::ThreeDc => "3dc",
            Self::Atc => "atc",
            Self::Latc => "latc",
            Self::Dxt1 => "dxt1",
            Self::S3tc => "s3tc",
            Self::Pvrtc => "pvrtc",
            Self::Astc => "astc",
            Self::Etc2 => "etc2",
        }
    }
}

impl fmt::Display for TextureCompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TextureCompressionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "etc1_rgb8" | "etc1" => Ok(Self::Etc1Rgb8),
            "paletted" => Ok(Self::Paletted),
            "3dc" => Ok(Self::ThreeDc),
            "atc" => Ok(Self::Atc),
            "latc" => Ok(Self::Latc),
            "dxt1" => Ok(Self::Dxt1),
            "s3tc" => Ok(Self::S3tc),
            "pvrtc" => Ok(Self::Pvrtc),
            "astc" => Ok(Self::Astc),
            "etc2" => Ok(Self::Etc2),
            _ => Err(format!("Unknown texture compression format: {s}")),
        }
    }
}

/// Sanitizers native libraries can be built with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Sanitizer {
    /// Hardware-assisted address sanitizer (`-hwasan` directories).
    Hwaddress,
}

impl fmt::Display for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hwaddress => write!(f, "hwaddress"),
        }
    }
}

/// Bound shared by every dimension value type.
pub trait TargetingValue: Ord + Clone + fmt::Debug + fmt::Display {}

impl<T: Ord + Clone + fmt::Debug + fmt::Display> TargetingValue for T {}

/// Targeting of one unit on one dimension.
///
/// `values` and `alternatives` must be disjoint; their union is the
/// dimension's *universe* and must agree across siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionTargeting<V: Ord> {
    /// Values this unit serves.
    pub values: BTreeSet<V>,
    /// Sibling values this unit explicitly does not serve.
    pub alternatives: BTreeSet<V>,
}

impl<V: Ord> Default for DimensionTargeting<V> {
    fn default() -> Self {
        Self {
            values: BTreeSet::new(),
            alternatives: BTreeSet::new(),
        }
    }
}

impl<V: TargetingValue> DimensionTargeting<V> {
    /// Build a targeting from explicit values and alternatives.
    pub fn new(
        values: impl IntoIterator<Item = V>,
        alternatives: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            values: values.into_iter().collect(),
            alternatives: alternatives.into_iter().collect(),
        }
    }

    /// Targeting that serves exactly `value` with no alternatives.
    pub fn single(value: V) -> Self {
        Self::new([value], [])
    }

    /// Whether neither values nor alternatives are declared.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.alternatives.is_empty()
    }

    /// `values ∪ alternatives`.
    pub fn universe(&self) -> BTreeSet<V> {
        self.values.union(&self.alternatives).cloned().collect()
    }

    /// Values declared both as served and as alternatives.
    pub fn overlap(&self) -> BTreeSet<V> {
        self.values
            .intersection(&self.alternatives)
            .cloned()
            .collect()
    }
}

/// Targeting of a whole APK (split or shard).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApkTargeting {
    /// ABI targeting.
    pub abi: Option<DimensionTargeting<Abi>>,
    /// Screen density targeting.
    pub screen_density: Option<DimensionTargeting<ScreenDensity>>,
    /// Language targeting.
    pub language: Option<DimensionTargeting<String>>,
    /// Texture compression format targeting.
    pub texture_compression_format: Option<DimensionTargeting<TextureCompressionFormat>>,
    /// Device tier targeting.
    pub device_tier: Option<DimensionTargeting<i32>>,
    /// Country set targeting.
    pub country_set: Option<DimensionTargeting<String>>,
    /// Multi-ABI targeting.
    pub multi_abi: Option<DimensionTargeting<MultiAbi>>,
    /// Minimum SDK targeting.
    pub sdk_version: Option<DimensionTargeting<u32>>,
    /// Sanitizer targeting.
    pub sanitizer: Option<DimensionTargeting<Sanitizer>>,
}

impl ApkTargeting {
    /// Whether no dimension is targeted.
    pub fn is_default(&self) -> bool {
        self.dimensions().is_empty()
    }

    /// Dimensions carrying a targeting.
    pub fn dimensions(&self) -> BTreeSet<TargetingDimension> {
        let present = [
            (TargetingDimension::Abi, self.abi.is_some()),
            (TargetingDimension::ScreenDensity, self.screen_density.is_some()),
            (TargetingDimension::Language, self.language.is_some()),
            (
                TargetingDimension::TextureCompressionFormat,
                self.texture_compression_format.is_some(),
            ),
            (TargetingDimension::DeviceTier, self.device_tier.is_some()),
            (TargetingDimension::CountrySet, self.country_set.is_some()),
            (TargetingDimension::MultiAbi, self.multi_abi.is_some()),
            (TargetingDimension::SdkVersion, self.sdk_version.is_some()),
            (TargetingDimension::Sanitizer, self.sanitizer.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(dimension, set)| set.then_some(dimension))
            .collect()
    }

    /// Whether `dimension` carries a targeting.
    pub fn targets(&self, dimension: TargetingDimension) -> bool {
        self.dimensions().contains(&dimension)
    }

    /// Copy of this targeting with `dimension` removed.
    pub fn without(&self, dimension: TargetingDimension) -> Self {
        let mut targeting = self.clone();
        match dimension {
            TargetingDimension::Abi => targeting.abi = None,
            TargetingDimension::ScreenDensity => targeting.screen_density = None,
            TargetingDimension::Language => targeting.language = None,
            TargetingDimension::TextureCompressionFormat => {
                targeting.texture_compression_format = None;
            }
            TargetingDimension::DeviceTier => targeting.device_tier = None,
            TargetingDimension::CountrySet => targeting.country_set = None,
            TargetingDimension::MultiAbi => targeting.multi_abi = None,
            TargetingDimension::SdkVersion => targeting.sdk_version = None,
            TargetingDimension::Sanitizer => targeting.sanitizer = None,
        }
        targeting
    }
}

/// Targeting applied to a whole release variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantTargeting {
    /// Minimum SDK of the variant.
    pub sdk_version: Option<DimensionTargeting<u32>>,
    /// ABI of the variant.
    pub abi: Option<DimensionTargeting<Abi>>,
    /// Screen density of the variant.
    pub screen_density: Option<DimensionTargeting<ScreenDensity>>,
    /// Multi-ABI of the variant.
    pub multi_abi: Option<DimensionTargeting<MultiAbi>>,
    /// Texture compression format of the variant.
    pub texture_compression_format: Option<DimensionTargeting<TextureCompressionFormat>>,
    /// Device tier of the variant.
    pub device_tier: Option<DimensionTargeting<i32>>,
    /// Country set of the variant.
    pub country_set: Option<DimensionTargeting<String>>,
}

impl VariantTargeting {
    /// Whether no dimension is targeted.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Copy of this targeting with `dimension` removed.
    pub fn without(&self, dimension: TargetingDimension) -> Self {
        let mut targeting = self.clone();
        match dimension {
            TargetingDimension::SdkVersion => targeting.sdk_version = None,
            TargetingDimension::Abi => targeting.abi = None,
            TargetingDimension::ScreenDensity => targeting.screen_density = None,
            TargetingDimension::MultiAbi => targeting.multi_abi = None,
            TargetingDimension::TextureCompressionFormat => {
                targeting.texture_compression_format = None;
            }
            TargetingDimension::DeviceTier => targeting.device_tier = None,
            TargetingDimension::CountrySet => targeting.country_set = None,
            TargetingDimension::Language | TargetingDimension::Sanitizer => {}
        }
        targeting
    }
}

/// Targeting of one assets directory, derived from its `#key_value` suffixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetsDirectoryTargeting {
    /// ABI targeting.
    pub abi: Option<DimensionTargeting<Abi>>,
    /// Language targeting (`#lang_`).
    pub language: Option<DimensionTargeting<String>>,
    /// Texture compression format targeting (`#tcf_`).
    pub texture_compression_format: Option<DimensionTargeting<TextureCompressionFormat>>,
    /// Device tier targeting (`#tier_`).
    pub device_tier: Option<DimensionTargeting<i32>>,
    /// Country set targeting (`#countries_`).
    pub country_set: Option<DimensionTargeting<String>>,
}

impl AssetsDirectoryTargeting {
    /// Whether no dimension is targeted.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Targeting of one `lib/<abi>[-hwasan]` directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeDirectoryTargeting {
    /// ABI the libraries are built for.
    pub abi: Abi,
    /// Sanitizer the libraries are built with, if any.
    pub sanitizer: Option<Sanitizer>,
}

/// Targeting of one APEX image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApexImageTargeting {
    /// ABI sets served by this image, against the other images.
    pub multi_abi: DimensionTargeting<MultiAbi>,
}
