//! Bundle modules and the splits derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::directories::{ApexImages, Assets, NativeLibraries};
use crate::entry::{ModuleEntry, ZipPath};
use crate::manifest::AndroidManifest;
use crate::resources::ResourceTable;
use crate::targeting::{ApkTargeting, VariantTargeting};
use crate::DEX_DIRECTORY;

/// Name of a bundle module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleName(String);

impl ModuleName {
    /// Name of the base module.
    pub const BASE: &'static str = "base";

    /// Create a module name.
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The base module's name.
    pub fn base() -> Self {
        Self::new(Self::BASE)
    }

    /// Whether this is the base module.
    pub fn is_base(&self) -> bool {
        self.0 == Self::BASE
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for ModuleName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<&str> for ModuleName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A module of a bundle, before splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleModule {
    /// Module name.
    pub name: ModuleName,
    /// Module manifest.
    pub manifest: AndroidManifest,
    /// Files of the module, in archive order.
    pub entries: Vec<ModuleEntry>,
    /// Compiled resources, if the module has any.
    pub resource_table: Option<ResourceTable>,
    /// Targeting of `assets/` directories.
    pub assets_config: Option<Assets>,
    /// Targeting of `lib/` directories.
    pub native_config: Option<NativeLibraries>,
    /// Targeting of APEX images.
    pub apex_config: Option<ApexImages>,
}

impl BundleModule {
    /// Module without resources or directory configs.
    pub fn new(name: ModuleName, manifest: AndroidManifest, entries: Vec<ModuleEntry>) -> Self {
        Self {
            name,
            manifest,
            entries,
            resource_table: None,
            assets_config: None,
            native_config: None,
            apex_config: None,
        }
    }

    /// Entries under `dex/`.
    pub fn dex_entries(&self) -> impl Iterator<Item = &ModuleEntry> {
        let dex = ZipPath::new(DEX_DIRECTORY);
        self.entries.iter().filter(move |e| e.is_under(&dex))
    }
}

/// Role of a produced archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    /// Configuration split of a module.
    #[default]
    Split,
    /// Self-contained APK for devices without split support.
    Standalone,
    /// System image APK.
    System,
    /// Single APK carrying every configuration.
    Universal,
    /// APEX system image shard.
    Apex,
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Split => "split",
            Self::Standalone => "standalone",
            Self::System => "system",
            Self::Universal => "universal",
            Self::Apex => "apex",
        };
        write!(f, "{name}")
    }
}

/// A delivery unit produced from one module, or a shard merged from several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSplit {
    /// Owning module.
    pub module_name: ModuleName,
    /// Role of the split.
    pub split_type: SplitType,
    /// Device configuration the split serves.
    pub apk_targeting: ApkTargeting,
    /// Release variant the split belongs to.
    pub variant_targeting: VariantTargeting,
    /// Whether this is the module's master split.
    pub is_master_split: bool,
    /// Files of the split, in order.
    pub entries: Vec<ModuleEntry>,
    /// Resources kept in this split.
    pub resource_table: Option<ResourceTable>,
    /// Assets directories kept in this split.
    pub assets_config: Option<Assets>,
    /// Native directories kept in this split.
    pub native_config: Option<NativeLibraries>,
    /// APEX images kept in this split.
    pub apex_config: Option<ApexImages>,
    /// Manifest of the split.
    pub manifest: AndroidManifest,
}

impl ModuleSplit {
    /// The untargeted master split holding all of a module's content.
    pub fn for_module(module: &BundleModule) -> Self {
        Self {
            module_name: module.name.clone(),
            split_type: SplitType::Split,
            apk_targeting: ApkTargeting::default(),
            variant_targeting: VariantTargeting::default(),
            is_master_split: true,
            entries: module.entries.clone(),
            resource_table: module.resource_table.clone(),
            assets_config: module.assets_config.clone(),
            native_config: module.native_config.clone(),
            apex_config: module.apex_config.clone(),
            manifest: module.manifest.clone(),
        }
    }

    /// A non-master split of the same module and variant, with `apk_targeting`
    /// and no content.
    pub fn derived(&self, apk_targeting: ApkTargeting) -> Self {
        Self {
            module_name: self.module_name.clone(),
            split_type: self.split_type,
            apk_targeting,
            variant_targeting: self.variant_targeting.clone(),
            is_master_split: false,
            entries: Vec::new(),
            resource_table: None,
            assets_config: None,
            native_config: None,
            apex_config: None,
            manifest: self.manifest.clone(),
        }
    }

    /// Entries under `dex/`.
    pub fn dex_entries(&self) -> impl Iterator<Item = &ModuleEntry> {
        let dex = ZipPath::new(DEX_DIRECTORY);
        self.entries.iter().filter(move |e| e.is_under(&dex))
    }

    /// Whether the split carries neither entries nor resources.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self
                .resource_table
                .as_ref()
                .is_none_or(ResourceTable::is_empty)
    }
}
