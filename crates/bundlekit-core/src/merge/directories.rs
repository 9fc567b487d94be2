//! Path-keyed union of assets, native and APEX configs.

use bundlekit_schema::{ApexImages, Assets, NativeLibraries, ZipPath};

use crate::error::{BundleError, Result};

fn union_by_path<T: Clone + PartialEq>(
    kind: &str,
    first: &[T],
    second: &[T],
    path: impl Fn(&T) -> &ZipPath,
) -> Result<Vec<T>> {
    let mut merged: Vec<T> = first.to_vec();
    for node in second {
        match merged.iter().find(|m| path(m) == path(node)) {
            Some(existing) if existing == node => {}
            Some(_) => {
                return Err(BundleError::TargetingInvariant(format!(
                    "Conflicting targeting for {kind} '{}'",
                    path(node)
                )));
            }
            None => merged.push(node.clone()),
        }
    }
    Ok(merged)
}

pub fn merge_assets_configs(first: &Assets, second: &Assets) -> Result<Assets> {
    Ok(Assets {
        directories: union_by_path(
            "assets directory",
            &first.directories,
            &second.directories,
            |d| &d.path,
        )?,
    })
}

pub fn merge_native_configs(first: &NativeLibraries, second: &NativeLibraries) -> Result<NativeLibraries> {
    Ok(NativeLibraries {
        directories: union_by_path(
            "native directory",
            &first.directories,
            &second.directories,
            |d| &d.path,
        )?,
    })
}

/// Images defined on both sides must also agree on their build-info path.
pub fn merge_apex_configs(first: &ApexImages, second: &ApexImages) -> Result<ApexImages> {
    Ok(ApexImages {
        images: union_by_path("APEX image", &first.images, &second.images, |i| &i.path)?,
    })
}

/// Fold `next` into an optional accumulator with `merge`.
pub fn merge_optional<T: Clone>(
    accumulated: Option<T>,
    next: Option<&T>,
    merge: impl FnOnce(&T, &T) -> Result<T>,
) -> Result<Option<T>> {
    match (accumulated, next) {
        (Some(a), Some(b)) => merge(&a, b).map(Some),
        (Some(a), None) => Ok(Some(a)),
        (None, b) => Ok(b.cloned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundlekit_schema::{
        Abi, AssetsDirectoryTargeting, DimensionTargeting, NativeDirectoryTargeting,
        TargetedAssetsDirectory, TargetedNativeDirectory,
    };

    fn assets(nodes: &[(&str, AssetsDirectoryTargeting)]) -> Assets {
        Assets {
            directories: nodes
                .iter()
                .map(|(path, targeting)| TargetedAssetsDirectory {
                    path: ZipPath::new(path),
                    targeting: targeting.clone(),
                })
                .collect(),
        }
    }

    #[test]
    fn assets_union_keeps_shared_nodes_once() {
        let first = assets(&[("assets/a", AssetsDirectoryTargeting::default())]);
        let second = assets(&[
            ("assets/a", AssetsDirectoryTargeting::default()),
            ("assets/b", AssetsDirectoryTargeting::default()),
        ]);
        let merged = merge_assets_configs(&first, &second).unwrap();
        assert_eq!(merged.directories.len(), 2);
    }

    #[test]
    fn conflicting_targeting_for_same_path_fails() {
        let first = assets(&[("assets/tex", AssetsDirectoryTargeting::default())]);
        let second = assets(&[(
            "assets/tex",
            AssetsDirectoryTargeting {
                language: Some(DimensionTargeting::single("fr".to_string())),
                ..AssetsDirectoryTargeting::default()
            },
        )]);
        let err = merge_assets_configs(&first, &second).unwrap_err();
        assert!(err.to_string().contains("assets/tex"));
    }

    #[test]
    fn native_union() {
        let node = |path: &str, abi| TargetedNativeDirectory {
            path: ZipPath::new(path),
            targeting: NativeDirectoryTargeting {
                abi,
                sanitizer: None,
            },
        };
        let first = NativeLibraries {
            directories: vec![node("lib/x86", Abi::X86)],
        };
        let second = NativeLibraries {
            directories: vec![node("lib/arm64-v8a", Abi::Arm64V8a)],
        };
        assert_eq!(
            merge_native_configs(&first, &second).unwrap().directories.len(),
            2
        );
    }
}
