//! Manifest fusion for shards built from several modules.

use std::collections::BTreeSet;

use bundlekit_schema::{AndroidManifest, FUSED_MODULE_NAMES_KEY, ModuleName};

use crate::error::{BundleError, Result};

/// Fuses the manifests of the modules merged into one archive.
pub trait ManifestFuser: Send + Sync {
    fn fuse(&self, manifests: &[(ModuleName, AndroidManifest)]) -> Result<AndroidManifest>;
}

/// Takes the base manifest and appends the components and metadata of the
/// other modules that base does not declare yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct FusingManifestMerger;

impl ManifestFuser for FusingManifestMerger {
    fn fuse(&self, manifests: &[(ModuleName, AndroidManifest)]) -> Result<AndroidManifest> {
        let mut seen = BTreeSet::new();
        for (module, _) in manifests {
            if !seen.insert(module) {
                return Err(BundleError::ManifestFusion(format!(
                    "more than one manifest for module '{module}'"
                )));
            }
        }
        let Some((_, base)) = manifests.iter().find(|(module, _)| module.is_base()) else {
            return Err(BundleError::ManifestFusion(
                "the base module manifest is required".to_string(),
            ));
        };
        if manifests.len() == 1 {
            return Ok(base.clone());
        }

        let mut fused = base.clone();
        for (_, manifest) in manifests.iter().filter(|(module, _)| !module.is_base()) {
            for component in &manifest.components {
                if !fused.components.contains(component) {
                    fused.components.push(component.clone());
                }
            }
            for metadata in &manifest.metadata {
                if fused.metadata_value(&metadata.name).is_none() {
                    fused.metadata.push(metadata.clone());
                }
            }
        }
        let names: Vec<&str> = manifests.iter().map(|(module, _)| module.as_str()).collect();
        fused.set_metadata(FUSED_MODULE_NAMES_KEY, names.join(","));
        tracing::debug!(modules = %names.join(","), "fused manifests");
        Ok(fused)
    }
}
