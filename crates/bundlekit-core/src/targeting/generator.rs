//! Derive directory configs of a module from its entry paths.

use std::collections::{BTreeMap, BTreeSet};

use bundlekit_schema::{
    APEX_DIRECTORY, ASSETS_DIRECTORY, Abi, ApexImageTargeting, ApexImages, Assets,
    AssetsDirectoryTargeting, BundleModule, DimensionTargeting, LIB_DIRECTORY, ModuleEntry,
    MultiAbi, NativeDirectoryTargeting, NativeLibraries, Sanitizer, TargetedApexImage,
    TargetedAssetsDirectory, TargetedNativeDirectory, TargetingDimension, ZipPath,
};
use indexmap::{IndexMap, IndexSet};

use crate::error::{BundleError, Result};
use crate::targeting::dimension::{
    AssetsDimension, CountrySetDimension, DeviceTierDimension, LanguageDimension,
    TextureCompressionFormatDimension,
};
use crate::targeting::directory::{
    TargetedDirectory, group_by_base_path, validate_dimension_parity, validate_nested_targeting,
};
use crate::targeting::{to_alternative, validate_assets_targeting};

const HWASAN_SUFFIX: &str = "-hwasan";
const APEX_IMAGE_EXTENSION: &str = ".img";
const APEX_BUILD_INFO_EXTENSION: &str = ".build_info.pb";

/// Fill in every directory config the module does not carry yet and
/// validate the ones it does.
pub fn complete_module_configs(module: &BundleModule) -> Result<BundleModule> {
    let mut module = module.clone();
    if module.assets_config.is_none() {
        module.assets_config = generate_assets_config(&module.entries)?;
    } else if let Some(assets) = &module.assets_config {
        for directory in &assets.directories {
            validate_assets_targeting(&directory.targeting, &format!("directory '{}'", directory.path))?;
        }
    }
    if module.native_config.is_none() {
        module.native_config = generate_native_config(&module.entries)?;
    }
    if module.apex_config.is_none() {
        module.apex_config = generate_apex_config(&module.entries)?;
    }
    Ok(module)
}

/// Assets config from `assets/` directory names.
///
/// Every directory that directly holds files gets a node. Within a group of
/// sibling directories, a directory suffixed with value `v` targets `{v}`
/// with the other values of the group as alternatives; the unsuffixed
/// fallback directory only carries alternatives.
pub fn generate_assets_config(entries: &[ModuleEntry]) -> Result<Option<Assets>> {
    let root = ZipPath::new(ASSETS_DIRECTORY);
    let paths: IndexSet<ZipPath> = entries
        .iter()
        .filter(|e| e.is_under(&root))
        .filter_map(|e| e.path.parent())
        .collect();
    if paths.is_empty() {
        return Ok(None);
    }

    let directories = paths
        .iter()
        .map(TargetedDirectory::parse)
        .collect::<Result<Vec<_>>>()?;
    validate_nested_targeting(&directories)?;
    validate_dimension_parity(&directories)?;

    let mut group_values: IndexMap<ZipPath, BTreeMap<TargetingDimension, BTreeSet<String>>> =
        IndexMap::new();
    for (base, group) in group_by_base_path(&directories) {
        let values = group_values.entry(base).or_default();
        for suffix in group.iter().flat_map(|d| d.suffixes()) {
            values
                .entry(suffix.dimension)
                .or_default()
                .insert(suffix.value.clone());
        }
    }

    let mut nodes = Vec::new();
    for directory in &directories {
        let mut targeting = AssetsDirectoryTargeting::default();
        if let Some(dimensions) = group_values.get(&directory.base_path()) {
            for (dimension, values) in dimensions {
                match dimension {
                    TargetingDimension::Language => {
                        set_dimension::<LanguageDimension>(&mut targeting, directory, values)?;
                    }
                    TargetingDimension::TextureCompressionFormat => {
                        set_dimension::<TextureCompressionFormatDimension>(
                            &mut targeting,
                            directory,
                            values,
                        )?;
                    }
                    TargetingDimension::DeviceTier => {
                        set_dimension::<DeviceTierDimension>(&mut targeting, directory, values)?;
                    }
                    TargetingDimension::CountrySet => {
                        set_dimension::<CountrySetDimension>(&mut targeting, directory, values)?;
                    }
                    _ => {}
                }
            }
        }
        nodes.push(TargetedAssetsDirectory {
            path: directory.path().clone(),
            targeting,
        });
    }

    tracing::debug!(directories = nodes.len(), "generated assets config");
    Ok(Some(Assets { directories: nodes }))
}

fn set_dimension<D: AssetsDimension>(
    targeting: &mut AssetsDirectoryTargeting,
    directory: &TargetedDirectory,
    group_values: &BTreeSet<String>,
) -> Result<()> {
    let parse = |raw: &str| {
        D::parse(raw).ok_or_else(|| BundleError::InvalidTargeting {
            dimension: D::DIMENSION,
            unit: format!("directory '{}'", directory.path()),
            reason: format!("invalid value '{raw}'"),
        })
    };
    let universe = group_values
        .iter()
        .map(|raw| parse(raw))
        .collect::<Result<BTreeSet<D::Value>>>()?;

    let dimension_targeting = match directory.value(D::DIMENSION) {
        Some(raw) => {
            let value = parse(raw)?;
            let alternatives: Vec<D::Value> =
                universe.into_iter().filter(|v| *v != value).collect();
            DimensionTargeting::new([value], alternatives)
        }
        None => to_alternative(&DimensionTargeting::new(universe, [])),
    };
    D::set_assets(targeting, Some(dimension_targeting));
    Ok(())
}

/// Native config from `lib/<abi>[-hwasan]/` directories.
pub fn generate_native_config(entries: &[ModuleEntry]) -> Result<Option<NativeLibraries>> {
    let root = ZipPath::new(LIB_DIRECTORY);
    let mut directories: IndexMap<ZipPath, NativeDirectoryTargeting> = IndexMap::new();

    for entry in entries.iter().filter(|e| e.is_under(&root)) {
        let Some(name) = entry.path.segments().nth(1).filter(|_| entry.path.depth() > 2) else {
            return Err(BundleError::TargetingInvariant(format!(
                "Native library '{}' must be placed in an ABI directory under lib/",
                entry.path
            )));
        };
        let directory = root.join(name);
        if directories.contains_key(&directory) {
            continue;
        }
        let (abi_name, sanitizer) = match name.strip_suffix(HWASAN_SUFFIX) {
            Some(abi_name) => (abi_name, Some(Sanitizer::Hwaddress)),
            None => (name, None),
        };
        let abi: Abi = abi_name.parse().map_err(|_| {
            BundleError::TargetingInvariant(format!(
                "Unrecognized native library directory '{directory}'"
            ))
        })?;
        directories.insert(directory, NativeDirectoryTargeting { abi, sanitizer });
    }

    if directories.is_empty() {
        return Ok(None);
    }
    Ok(Some(NativeLibraries {
        directories: directories
            .into_iter()
            .map(|(path, targeting)| TargetedNativeDirectory { path, targeting })
            .collect(),
    }))
}

/// APEX images config from `apex/<abi>.<abi>.img` file names.
pub fn generate_apex_config(entries: &[ModuleEntry]) -> Result<Option<ApexImages>> {
    let root = ZipPath::new(APEX_DIRECTORY);
    let paths: BTreeSet<&ZipPath> = entries
        .iter()
        .filter(|e| e.is_under(&root))
        .map(|e| &e.path)
        .collect();

    let mut images: Vec<(ZipPath, MultiAbi)> = Vec::new();
    for path in &paths {
        let Some(stem) = path.file_name().strip_suffix(APEX_IMAGE_EXTENSION) else {
            continue;
        };
        let multi_abi: MultiAbi = stem.parse().map_err(|e| {
            BundleError::TargetingInvariant(format!("Invalid APEX image name '{path}': {e}"))
        })?;
        images.push(((*path).clone(), multi_abi));
    }
    if images.is_empty() {
        return Ok(None);
    }

    let universe: BTreeSet<MultiAbi> = images.iter().map(|(_, m)| m.clone()).collect();
    if universe.len() != images.len() {
        return Err(BundleError::TargetingInvariant(
            "Every APEX image must target a distinct set of ABIs".to_string(),
        ));
    }

    let images = images
        .into_iter()
        .map(|(path, multi_abi)| {
            let stem = path
                .file_name()
                .trim_end_matches(APEX_IMAGE_EXTENSION)
                .to_string();
            let build_info = root.join(&format!("{stem}{APEX_BUILD_INFO_EXTENSION}"));
            let alternatives = universe.iter().filter(|m| **m != multi_abi).cloned();
            TargetedApexImage {
                build_info_path: paths.contains(&build_info).then_some(build_info.clone()),
                targeting: ApexImageTargeting {
                    multi_abi: DimensionTargeting::new([multi_abi.clone()], alternatives),
                },
                path,
            }
        })
        .collect();
    Ok(Some(ApexImages { images }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundlekit_schema::TextureCompressionFormat;

    fn entries(paths: &[&str]) -> Vec<ModuleEntry> {
        paths
            .iter()
            .map(|p| ModuleEntry::from_bytes(p, p.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn assets_targeting_for_group_with_fallback() {
        let assets = generate_assets_config(&entries(&[
            "assets/tex/a.png",
            "assets/tex#tcf_etc1/a.png",
            "assets/tex#tcf_astc/a.png",
            "assets/music/theme.ogg",
        ]))
        .unwrap()
        .unwrap();

        let by_path: BTreeMap<&str, &AssetsDirectoryTargeting> = assets
            .directories
            .iter()
            .map(|d| (d.path.as_str(), &d.targeting))
            .collect();

        use TextureCompressionFormat::{Astc, Etc1Rgb8};
        assert_eq!(
            by_path["assets/tex#tcf_etc1"].texture_compression_format,
            Some(DimensionTargeting::new([Etc1Rgb8], [Astc]))
        );
        assert_eq!(
            by_path["assets/tex"].texture_compression_format,
            Some(DimensionTargeting::new([], [Etc1Rgb8, Astc]))
        );
        assert!(by_path["assets/music"].is_default());
    }

    #[test]
    fn no_assets_means_no_config() {
        assert_eq!(generate_assets_config(&entries(&["dex/classes.dex"])).unwrap(), None);
    }

    #[test]
    fn native_directories_with_sanitizer() {
        let native = generate_native_config(&entries(&[
            "lib/arm64-v8a/libfoo.so",
            "lib/arm64-v8a/libbar.so",
            "lib/arm64-v8a-hwasan/libfoo.so",
            "lib/x86/libfoo.so",
        ]))
        .unwrap()
        .unwrap();
        let targetings: Vec<_> = native.directories.iter().map(|d| &d.targeting).collect();
        assert_eq!(targetings.len(), 3);
        assert_eq!(targetings[1].sanitizer, Some(Sanitizer::Hwaddress));
        assert_eq!(targetings[1].abi, Abi::Arm64V8a);
    }

    #[test]
    fn native_library_outside_abi_directory_is_rejected() {
        assert!(generate_native_config(&entries(&["lib/libfoo.so"])).is_err());
        assert!(generate_native_config(&entries(&["lib/sparc/libfoo.so"])).is_err());
    }

    #[test]
    fn apex_images_target_each_other() {
        let apex = generate_apex_config(&entries(&[
            "apex/x86_64.x86.img",
            "apex/x86_64.x86.build_info.pb",
            "apex/arm64_v8a.img",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(apex.images.len(), 2);
        let x86 = apex
            .images
            .iter()
            .find(|i| i.path.as_str() == "apex/x86_64.x86.img")
            .unwrap();
        assert_eq!(
            x86.build_info_path,
            Some(ZipPath::new("apex/x86_64.x86.build_info.pb"))
        );
        assert_eq!(x86.targeting.multi_abi.alternatives.len(), 1);
    }
}
