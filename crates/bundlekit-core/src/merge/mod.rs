//! Structural merging of entries, resource tables and directory configs.

pub mod directories;
pub mod entries;
pub mod resources;

pub use directories::{
    merge_apex_configs, merge_assets_configs, merge_native_configs, merge_optional,
};
pub use entries::EntryMerger;
pub use resources::merge_resource_tables;
