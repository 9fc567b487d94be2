//! Bundle configuration: which dimensions to split on, suffix stripping
//! policies, compression and dex merging options.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bundlekit_schema::{ANDROID_L_API_VERSION, TargetingDimension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`BundleConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "parsing")]
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "parsing")]
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format for {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration of a bundle build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub optimizations: Optimizations,
    pub standalone: StandaloneConfig,
    /// Platform floor injected into every split's SDK targeting.
    pub split_sdk_floor: u32,
    pub dexer: DexerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Optimizations {
    pub split_dimensions: Vec<SplitDimension>,
    pub uncompress_native_libraries: bool,
    pub uncompress_dex_files: bool,
}

/// One `[[optimizations.split_dimensions]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDimension {
    pub dimension: TargetingDimension,
    /// Keep the dimension in the master split instead of splitting on it.
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub suffix_stripping: SuffixStripping,
}

/// Policy for collapsing directories targeted on one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SuffixStripping {
    /// Also remove the suffix from the surviving directory paths.
    pub enabled: bool,
    /// Value whose directories are kept in shards.
    pub default_suffix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DexMergingStrategy {
    /// Merge dex files of several modules when the platform needs it.
    #[default]
    MergeIfNeeded,
    /// Only ever renumber dex files.
    NeverMerge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StandaloneConfig {
    pub dex_merging_strategy: DexMergingStrategy,
    pub main_dex_list: Option<PathBuf>,
    pub proguard_map: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexerConfig {
    /// Explicit path to `d8`; looked up on `PATH` otherwise.
    pub path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for DexerConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: 600,
        }
    }
}

impl DexerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Optimizations {
    fn default() -> Self {
        let split_on = |dimension| SplitDimension {
            dimension,
            negate: false,
            suffix_stripping: SuffixStripping::default(),
        };
        Self {
            split_dimensions: vec![
                split_on(TargetingDimension::Abi),
                split_on(TargetingDimension::ScreenDensity),
                split_on(TargetingDimension::Language),
            ],
            uncompress_native_libraries: false,
            uncompress_dex_files: false,
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            optimizations: Optimizations::default(),
            standalone: StandaloneConfig::default(),
            split_sdk_floor: ANDROID_L_API_VERSION,
            dexer: DexerConfig::default(),
        }
    }
}

const STRIPPABLE_DIMENSIONS: [TargetingDimension; 3] = [
    TargetingDimension::TextureCompressionFormat,
    TargetingDimension::DeviceTier,
    TargetingDimension::CountrySet,
];

impl BundleConfig {
    /// Load a config, choosing TOML or JSON by file extension.
    #[cfg(feature = "parsing")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "parsing")]
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::new();
        for split in &self.optimizations.split_dimensions {
            if seen.contains(&split.dimension) {
                return Err(ConfigError::Invalid(format!(
                    "dimension {} is configured more than once",
                    split.dimension
                )));
            }
            seen.push(split.dimension);

            let stripping = &split.suffix_stripping;
            let strips = stripping.enabled || stripping.default_suffix.is_some();
            if strips && !STRIPPABLE_DIMENSIONS.contains(&split.dimension) {
                return Err(ConfigError::Invalid(format!(
                    "suffix stripping is not supported for dimension {}",
                    split.dimension
                )));
            }
            if matches!(
                split.dimension,
                TargetingDimension::MultiAbi | TargetingDimension::SdkVersion
            ) {
                return Err(ConfigError::Invalid(format!(
                    "dimension {} cannot be configured as a split dimension",
                    split.dimension
                )));
            }
        }
        if self.dexer.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "dexer.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether splits are generated along `dimension`.
    pub fn splits_on(&self, dimension: TargetingDimension) -> bool {
        self.optimizations
            .split_dimensions
            .iter()
            .any(|s| s.dimension == dimension && !s.negate)
    }

    /// Suffix stripping policy of `dimension`, default if unconfigured.
    pub fn suffix_stripping(&self, dimension: TargetingDimension) -> SuffixStripping {
        self.optimizations
            .split_dimensions
            .iter()
            .find(|s| s.dimension == dimension)
            .map(|s| s.suffix_stripping.clone())
            .unwrap_or_default()
    }
}
