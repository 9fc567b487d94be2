//! Shared value types for bundlekit.
//!
//! Everything here is plain data: targeting, module entries, resource
//! tables, directory configs, manifests and the module/split containers
//! that the splitting and merging engine in `bundlekit-core` transforms.

pub mod abi;
pub mod codec;
pub mod digest;
pub mod directories;
pub mod entry;
pub mod manifest;
pub mod module;
pub mod resources;
pub mod targeting;

// Re-exports
pub use abi::*;
pub use digest::*;
pub use directories::*;
pub use entry::*;
pub use manifest::*;
pub use module::*;
pub use resources::*;
pub use targeting::*;

/// Directory holding compiled dex files inside a module.
pub const DEX_DIRECTORY: &str = "dex";

/// Directory holding assets inside a module.
pub const ASSETS_DIRECTORY: &str = "assets";

/// Directory holding native libraries inside a module.
pub const LIB_DIRECTORY: &str = "lib";

/// Directory holding APEX images inside a module.
pub const APEX_DIRECTORY: &str = "apex";

/// Lowest API level on which split APKs can be installed.
pub const ANDROID_L_API_VERSION: u32 = 21;

/// Lowest API level that can load native libraries straight from an uncompressed APK.
pub const ANDROID_M_API_VERSION: u32 = 23;

/// Lowest API level that can run dex files straight from an uncompressed APK.
pub const ANDROID_Q_API_VERSION: u32 = 29;
