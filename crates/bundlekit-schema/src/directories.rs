//! Per-directory targeting configs of a module: assets, native libraries
//! and APEX images.

use serde::{Deserialize, Serialize};

use crate::entry::ZipPath;
use crate::targeting::{ApexImageTargeting, AssetsDirectoryTargeting, NativeDirectoryTargeting};

/// Targeting of the `assets/` directories of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Assets {
    /// Directories that directly contain asset files.
    pub directories: Vec<TargetedAssetsDirectory>,
}

/// One assets directory and its targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedAssetsDirectory {
    /// Directory path, suffixes included (`assets/tex#tcf_astc`).
    pub path: ZipPath,
    /// Targeting derived from the path.
    pub targeting: AssetsDirectoryTargeting,
}

/// Targeting of the `lib/` directories of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NativeLibraries {
    /// One node per `lib/<abi>[-hwasan]` directory.
    pub directories: Vec<TargetedNativeDirectory>,
}

/// One native library directory and its targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedNativeDirectory {
    /// Directory path (`lib/arm64-v8a`).
    pub path: ZipPath,
    /// ABI and sanitizer of the directory.
    pub targeting: NativeDirectoryTargeting,
}

/// Targeting of the system images of an APEX module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApexImages {
    /// One node per `apex/<abis>.img` image.
    pub images: Vec<TargetedApexImage>,
}

/// One APEX image and its targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedApexImage {
    /// Image path (`apex/x86_64.x86.img`).
    pub path: ZipPath,
    /// Companion build-info entry, if present.
    pub build_info_path: Option<ZipPath>,
    /// Multi-ABI targeting of the image.
    pub targeting: ApexImageTargeting,
}
