//! Shard merging: combine splits of several modules into self-contained
//! archives for devices that cannot install splits.

pub mod dex;
pub mod fusion;
pub mod standalone;

use std::path::{Path, PathBuf};

use bundlekit_schema::{
    ANDROID_L_API_VERSION, AndroidManifest, ApkTargeting, ByteSource, DEX_DIRECTORY, ModuleEntry,
    ModuleName, ModuleSplit, SplitType, TargetingDimension, VariantTargeting, ZipPath,
};
use indexmap::IndexMap;

pub use dex::rename_dex_from_all_modules;
pub use fusion::ModuleFuser;
pub use standalone::generate_standalone_shards;

use crate::config::{DexMergingStrategy, StandaloneConfig};
use crate::dex::{DexMergeCache, DexMergeKey, DexMergeRequest, DexMerger};
use crate::error::{BundleError, Result};
use crate::manifest::ManifestFuser;
use crate::merge::{
    EntryMerger, merge_apex_configs, merge_assets_configs, merge_native_configs, merge_optional,
    merge_resource_tables,
};
use crate::targeting::merge_apk_targeting_for_shard;

/// How dex files of several modules end up in one shard.
#[derive(Debug, Clone, Default)]
pub struct DexMergeOptions {
    pub strategy: DexMergingStrategy,
    pub bundle_has_feature_modules: bool,
    pub main_dex_list: Option<PathBuf>,
    pub proguard_map: Option<PathBuf>,
}

impl DexMergeOptions {
    pub fn from_config(config: &StandaloneConfig, bundle_has_feature_modules: bool) -> Self {
        Self {
            strategy: config.dex_merging_strategy,
            bundle_has_feature_modules,
            main_dex_list: config.main_dex_list.clone(),
            proguard_map: config.proguard_map.clone(),
        }
    }
}

/// Merges splits into shards. Dex merges go through the shared cache, so
/// shards reducing to the same dex inputs invoke the dexer once.
pub struct ShardMerger<'a> {
    dex_cache: &'a DexMergeCache,
    dex_merger: &'a dyn DexMerger,
    manifest_fuser: &'a dyn ManifestFuser,
    options: DexMergeOptions,
    work_dir: PathBuf,
}

impl<'a> ShardMerger<'a> {
    pub fn new(
        dex_cache: &'a DexMergeCache,
        dex_merger: &'a dyn DexMerger,
        manifest_fuser: &'a dyn ManifestFuser,
        options: DexMergeOptions,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dex_cache,
            dex_merger,
            manifest_fuser,
            options,
            work_dir: work_dir.into(),
        }
    }

    pub fn manifest_fuser(&self) -> &'a dyn ManifestFuser {
        self.manifest_fuser
    }

    /// Merge `splits` into one shard of type `split_type`.
    ///
    /// Only ABI, screen density and language targeting can be combined.
    /// Each module must contribute a single manifest.
    pub fn merge_single_shard(
        &self,
        splits: &[ModuleSplit],
        split_type: SplitType,
    ) -> Result<ModuleSplit> {
        let mut apk_targeting = ApkTargeting::default();
        let mut manifests: IndexMap<ModuleName, AndroidManifest> = IndexMap::new();
        let mut entries = EntryMerger::new();
        let mut dex_by_module: IndexMap<ModuleName, Vec<ModuleEntry>> = IndexMap::new();
        let mut resource_table = None;
        let mut assets_config = None;
        let mut native_config = None;
        let mut apex_config = None;

        for split in splits {
            resource_table = merge_optional(
                resource_table,
                split.resource_table.as_ref(),
                merge_resource_tables,
            )?;
            apk_targeting = merge_apk_targeting_for_shard(&apk_targeting, &split.apk_targeting)?;

            match manifests.get(&split.module_name) {
                Some(existing) if *existing != split.manifest => {
                    return Err(BundleError::ManifestFusion(format!(
                        "splits of module '{}' carry different manifests",
                        split.module_name
                    )));
                }
                Some(_) => {}
                None => {
                    manifests.insert(split.module_name.clone(), split.manifest.clone());
                }
            }

            let dex_entries = dex_by_module.entry(split.module_name.clone()).or_default();
            let dex = ZipPath::new(DEX_DIRECTORY);
            for entry in &split.entries {
                if entry.is_under(&dex) {
                    if let Some(existing) = dex_entries.iter().find(|e| e.path == entry.path) {
                        if !existing.content_equals(entry)? {
                            return Err(BundleError::EntryConflict {
                                path: entry.path.clone(),
                                first: split.module_name.clone(),
                                second: split.module_name.clone(),
                            });
                        }
                    } else {
                        dex_entries.push(entry.clone());
                    }
                } else {
                    entries.merge_entry(&split.module_name, entry.clone())?;
                }
            }

            assets_config =
                merge_optional(assets_config, split.assets_config.as_ref(), merge_assets_configs)?;
            native_config =
                merge_optional(native_config, split.native_config.as_ref(), merge_native_configs)?;
            apex_config =
                merge_optional(apex_config, split.apex_config.as_ref(), merge_apex_configs)?;
        }
        dex_by_module.retain(|_, entries| !entries.is_empty());

        let manifests: Vec<(ModuleName, AndroidManifest)> = manifests.into_iter().collect();
        let manifest = self.manifest_fuser.fuse(&manifests)?;
        let mut merged_entries = entries.into_entries()?;
        merged_entries.extend(self.merge_dex(&dex_by_module, &manifest)?);

        tracing::debug!(
            splits = splits.len(),
            modules = manifests.len(),
            %split_type,
            "merged shard"
        );
        Ok(ModuleSplit {
            module_name: ModuleName::base(),
            split_type,
            apk_targeting,
            variant_targeting: VariantTargeting::default(),
            is_master_split: false,
            entries: merged_entries,
            resource_table,
            assets_config,
            native_config,
            apex_config,
            manifest,
        })
    }

    /// Merge the master split of an APEX module with exactly one of its
    /// image splits.
    pub fn merge_apex_shard(&self, splits: &[ModuleSplit]) -> Result<ModuleSplit> {
        let (masters, images): (Vec<&ModuleSplit>, Vec<&ModuleSplit>) =
            splits.iter().partition(|s| s.is_master_split);
        let [master] = masters.as_slice() else {
            return Err(BundleError::TargetingInvariant(format!(
                "An APEX shard needs exactly one master split, got {}",
                masters.len()
            )));
        };
        let [image] = images.as_slice() else {
            return Err(BundleError::TargetingInvariant(format!(
                "An APEX shard needs exactly one image split, got {}",
                images.len()
            )));
        };
        let only_multi_abi = image
            .apk_targeting
            .dimensions()
            .into_iter()
            .filter(|d| *d != TargetingDimension::SdkVersion)
            .all(|d| d == TargetingDimension::MultiAbi);
        if !only_multi_abi || image.apk_targeting.multi_abi.is_none() {
            return Err(BundleError::TargetingInvariant(
                "The non-master split of an APEX shard must target multi-ABI only".to_string(),
            ));
        }

        let mut entries = EntryMerger::new();
        entries.merge_all(&master.module_name, master.entries.iter().cloned())?;
        entries.merge_all(&image.module_name, image.entries.iter().cloned())?;
        let apex_config =
            merge_optional(master.apex_config.clone(), image.apex_config.as_ref(), merge_apex_configs)?;
        let apk_targeting = ApkTargeting {
            multi_abi: image.apk_targeting.multi_abi.clone(),
            ..ApkTargeting::default()
        };

        Ok(ModuleSplit {
            split_type: SplitType::Apex,
            apk_targeting,
            variant_targeting: VariantTargeting::default(),
            is_master_split: false,
            entries: entries.into_entries()?,
            apex_config,
            ..(*master).clone()
        })
    }

    /// Dex entries of the shard under the configured policy.
    fn merge_dex(
        &self,
        dex_by_module: &IndexMap<ModuleName, Vec<ModuleEntry>>,
        manifest: &AndroidManifest,
    ) -> Result<Vec<ModuleEntry>> {
        if dex_by_module.len() <= 1 || !self.options.bundle_has_feature_modules {
            return rename_dex_from_all_modules(dex_by_module);
        }
        let min_sdk = manifest.effective_min_sdk();
        if self.options.strategy == DexMergingStrategy::NeverMerge
            || min_sdk >= ANDROID_L_API_VERSION
        {
            tracing::debug!(min_sdk, strategy = ?self.options.strategy, "renaming dex files without merging");
            return rename_dex_from_all_modules(dex_by_module);
        }

        let inputs: Vec<&ModuleEntry> = dex_by_module.values().flatten().collect();
        let key = DexMergeKey::from_entries(inputs.iter().copied())?;
        let files = self
            .dex_cache
            .get_or_merge(&key, || self.run_dexer(&key, dex_by_module, manifest))?;

        let dex = ZipPath::new(DEX_DIRECTORY);
        files
            .iter()
            .map(|file| {
                let name = file.file_name().map(|n| n.to_string_lossy().into_owned());
                let name = name.ok_or_else(|| {
                    BundleError::TargetingInvariant(format!(
                        "Dex merger returned an invalid path {}",
                        file.display()
                    ))
                })?;
                Ok(ModuleEntry::new(dex.join(&name), ByteSource::from_file(file.clone())))
            })
            .collect()
    }

    fn run_dexer(
        &self,
        key: &DexMergeKey,
        dex_by_module: &IndexMap<ModuleName, Vec<ModuleEntry>>,
        manifest: &AndroidManifest,
    ) -> Result<Vec<PathBuf>> {
        let root = self
            .work_dir
            .join("dex-merging")
            .join(key.digest().as_str());
        let input_dir = root.join("input");
        let output_dir = root.join("output");
        for dir in [&input_dir, &output_dir] {
            if dir.exists() {
                std::fs::remove_dir_all(dir).map_err(BundleError::io_at(dir))?;
            }
            std::fs::create_dir_all(dir).map_err(BundleError::io_at(dir))?;
        }

        let mut dex_files = Vec::new();
        for (module, entries) in dex_by_module {
            let module_dir = input_dir.join(module.as_str());
            std::fs::create_dir_all(&module_dir).map_err(BundleError::io_at(&module_dir))?;
            for entry in entries {
                let path = module_dir.join(entry.path.file_name());
                write_entry(entry, &path)?;
                dex_files.push(path);
            }
        }

        let request = DexMergeRequest {
            dex_files: &dex_files,
            output_dir: &output_dir,
            main_dex_list: self.options.main_dex_list.as_deref(),
            proguard_map: self.options.proguard_map.as_deref(),
            is_debuggable: manifest.debuggable,
            min_sdk: manifest.effective_min_sdk(),
        };
        Ok(self.dex_merger.merge(&request)?)
    }
}

fn write_entry(entry: &ModuleEntry, path: &Path) -> Result<()> {
    let mut reader = entry.content.open().map_err(BundleError::io_at(path))?;
    let mut file = std::fs::File::create(path).map_err(BundleError::io_at(path))?;
    std::io::copy(&mut reader, &mut file).map_err(BundleError::io_at(path))?;
    Ok(())
}
