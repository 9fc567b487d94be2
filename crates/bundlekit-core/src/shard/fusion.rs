use bundlekit_schema::{BundleModule, ModuleEntry, ModuleName, ModuleType};
use indexmap::IndexMap;

use super::dex::rename_dex_from_all_modules;
use crate::error::{BundleError, Result};
use crate::manifest::ManifestFuser;
use crate::merge::{
    EntryMerger, merge_apex_configs, merge_assets_configs, merge_native_configs, merge_optional,
    merge_resource_tables,
};

/// Folds permanent install-time feature modules into the base module.
pub struct ModuleFuser<'a> {
    manifest_fuser: &'a dyn ManifestFuser,
}

impl<'a> ModuleFuser<'a> {
    pub fn new(manifest_fuser: &'a dyn ManifestFuser) -> Self {
        Self { manifest_fuser }
    }

    /// Whether `module` is folded into base.
    pub fn is_fused(module: &BundleModule) -> bool {
        module.name.is_base()
            || (module.manifest.module_type == ModuleType::Feature
                && module.manifest.is_permanent_install_time())
    }

    /// The fused base module, followed by the modules left as they are.
    pub fn fuse(&self, modules: &[BundleModule]) -> Result<Vec<BundleModule>> {
        let (selected, others): (Vec<&BundleModule>, Vec<&BundleModule>) =
            modules.iter().partition(|m| Self::is_fused(m));
        let Some(base) = selected.iter().find(|m| m.name.is_base()) else {
            return Err(BundleError::TargetingInvariant(
                "Cannot fuse modules of a bundle without a base module".to_string(),
            ));
        };
        if selected.len() == 1 {
            return Ok(modules.to_vec());
        }

        let mut entries = EntryMerger::new();
        let mut dex_by_module: IndexMap<ModuleName, Vec<ModuleEntry>> = IndexMap::new();
        let mut manifests = Vec::with_capacity(selected.len());
        let mut fused = BundleModule::new(ModuleName::base(), base.manifest.clone(), Vec::new());

        for module in &selected {
            let dex: Vec<ModuleEntry> = module.dex_entries().cloned().collect();
            let plain = module.entries.iter().filter(|e| !dex.contains(e)).cloned();
            entries.merge_all(&module.name, plain)?;
            dex_by_module.insert(module.name.clone(), dex);
            manifests.push((module.name.clone(), module.manifest.clone()));

            fused.resource_table = merge_optional(
                fused.resource_table,
                module.resource_table.as_ref(),
                merge_resource_tables,
            )?;
            fused.assets_config = merge_optional(
                fused.assets_config,
                module.assets_config.as_ref(),
                merge_assets_configs,
            )?;
            fused.native_config = merge_optional(
                fused.native_config,
                module.native_config.as_ref(),
                merge_native_configs,
            )?;
            fused.apex_config =
                merge_optional(fused.apex_config, module.apex_config.as_ref(), merge_apex_configs)?;
        }

        fused.entries = entries.into_entries()?;
        fused.entries.extend(rename_dex_from_all_modules(&dex_by_module)?);
        fused.manifest = self.manifest_fuser.fuse(&manifests)?;
        tracing::info!(
            fused = selected.len(),
            remaining = others.len(),
            "fused install-time modules into base"
        );

        let mut result = vec![fused];
        result.extend(others.into_iter().cloned());
        Ok(result)
    }
}
