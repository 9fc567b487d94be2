//! Id-keyed merge of resource tables.

use std::borrow::Cow;
use std::fmt::Debug;

use bundlekit_schema::{
    ConfigValue, Overlayable, OverlayableItem, Package, ResourceEntry, ResourceTable,
    ResourceType, StripSource,
};
use indexmap::IndexMap;

use crate::error::{BundleError, Result};

/// Merge two resource tables into one.
///
/// Packages, types and entries are matched by id, keeping the first table's
/// order and appending ids only the second table has. Matched nodes must
/// agree on their scalar fields; source references are ignored in that
/// comparison. Config values are unioned. When the source pools differ the
/// first pool is kept and the second table loses its source references.
pub fn merge_resource_tables(first: &ResourceTable, second: &ResourceTable) -> Result<ResourceTable> {
    let second = if first.source_pool == second.source_pool {
        Cow::Borrowed(second)
    } else {
        tracing::debug!("source pools differ, stripping sources of the second table");
        Cow::Owned(second.strip_source())
    };

    let overlayables = merge_overlayables(&first.overlayables, &second.overlayables)?;
    let first_packages = remap_overlayables(&first.packages, &first.overlayables, &overlayables)?;
    let second_packages = remap_overlayables(&second.packages, &second.overlayables, &overlayables)?;

    let packages = merge_by_id(&first_packages, &second_packages, |p| p.id, merge_packages)?;
    Ok(ResourceTable {
        source_pool: first.source_pool.clone(),
        packages,
        overlayables,
    })
}

fn merge_overlayables(first: &[Overlayable], second: &[Overlayable]) -> Result<Vec<Overlayable>> {
    let mut merged: Vec<Overlayable> = first.to_vec();
    for overlayable in second {
        match merged.iter().find(|o| o.name == overlayable.name) {
            Some(existing) => ensure_same(
                "actor",
                || format!("overlayable '{}'", overlayable.name),
                &existing.actor,
                &overlayable.actor,
            )?,
            None => merged.push(overlayable.clone()),
        }
    }
    Ok(merged)
}

/// Re-point every overlayable index of `packages` from `old` to `merged`.
fn remap_overlayables(
    packages: &[Package],
    old: &[Overlayable],
    merged: &[Overlayable],
) -> Result<Vec<Package>> {
    let remap = |item: &OverlayableItem| -> Result<OverlayableItem> {
        let name = &old
            .get(item.overlayable_idx as usize)
            .ok_or_else(|| BundleError::FieldMismatch {
                field: "overlayable_idx",
                context: "overlayable item".to_string(),
                first: item.overlayable_idx.to_string(),
                second: format!("{} declared overlayables", old.len()),
            })?
            .name;
        let new_idx = merged.iter().position(|o| o.name == *name).unwrap_or_default();
        Ok(OverlayableItem {
            overlayable_idx: new_idx as u32,
            ..item.clone()
        })
    };

    packages
        .iter()
        .map(|package| {
            let types = package
                .types
                .iter()
                .map(|res_type| {
                    let entries = res_type
                        .entries
                        .iter()
                        .map(|entry| {
                            Ok(ResourceEntry {
                                overlayable_item: entry.overlayable_item.as_ref().map(remap).transpose()?,
                                ..entry.clone()
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(ResourceType {
                        entries,
                        ..res_type.clone()
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Package {
                types,
                ..package.clone()
            })
        })
        .collect()
}

fn merge_by_id<T: Clone>(
    first: &[T],
    second: &[T],
    id: impl Fn(&T) -> u32,
    merge: impl Fn(&T, &T) -> Result<T>,
) -> Result<Vec<T>> {
    let mut merged: IndexMap<u32, T> = IndexMap::new();
    for item in first.iter().chain(second) {
        match merged.get_mut(&id(item)) {
            Some(existing) => *existing = merge(existing, item)?,
            None => {
                merged.insert(id(item), item.clone());
            }
        }
    }
    Ok(merged.into_values().collect())
}

fn ensure_same<T: PartialEq + Debug>(
    field: &'static str,
    context: impl FnOnce() -> String,
    first: &T,
    second: &T,
) -> Result<()> {
    if first == second {
        return Ok(());
    }
    Err(BundleError::FieldMismatch {
        field,
        context: context(),
        first: format!("{first:?}"),
        second: format!("{second:?}"),
    })
}

fn merge_packages(first: &Package, second: &Package) -> Result<Package> {
    ensure_same("name", || format!("package 0x{:x}", first.id), &first.name, &second.name)?;
    let types = merge_by_id(&first.types, &second.types, |t| t.id, |a, b| {
        merge_types(first, a, b)
    })?;
    Ok(Package {
        types,
        ..first.clone()
    })
}

fn merge_types(package: &Package, first: &ResourceType, second: &ResourceType) -> Result<ResourceType> {
    ensure_same(
        "name",
        || format!("type 0x{:x} of package '{}'", first.id, package.name),
        &first.name,
        &second.name,
    )?;
    let entries = merge_by_id(&first.entries, &second.entries, |e| e.id, |a, b| {
        merge_entries(first, a, b)
    })?;
    Ok(ResourceType {
        entries,
        ..first.clone()
    })
}

fn merge_entries(
    res_type: &ResourceType,
    first: &ResourceEntry,
    second: &ResourceEntry,
) -> Result<ResourceEntry> {
    let context = || format!("entry '{}/{}' (0x{:x})", res_type.name, first.name, first.id);
    ensure_same("name", context, &first.name, &second.name)?;
    ensure_same(
        "visibility",
        context,
        &first.visibility.strip_source(),
        &second.visibility.strip_source(),
    )?;
    ensure_same(
        "allow_new",
        context,
        &first.allow_new.as_ref().map(StripSource::strip_source),
        &second.allow_new.as_ref().map(StripSource::strip_source),
    )?;
    ensure_same(
        "overlayable_item",
        context,
        &first.overlayable_item.as_ref().map(StripSource::strip_source),
        &second.overlayable_item.as_ref().map(StripSource::strip_source),
    )?;
    Ok(ResourceEntry {
        config_values: merge_config_values(&first.config_values, &second.config_values),
        ..first.clone()
    })
}

/// Ordered union of config values, comparing source-free projections.
fn merge_config_values(first: &[ConfigValue], second: &[ConfigValue]) -> Vec<ConfigValue> {
    let mut seen: Vec<ConfigValue> = Vec::new();
    let mut merged = Vec::new();
    for value in first.iter().chain(second) {
        let projection = value.strip_source();
        if !seen.contains(&projection) {
            seen.push(projection);
            merged.push(value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use bundlekit_schema::{
        Configuration, Item, SourceRef, Value, Visibility, VisibilityLevel, ZipPath,
    };

    fn string_value(text: &str, locale: &str) -> ConfigValue {
        ConfigValue {
            config: Configuration {
                locale: locale.to_string(),
                ..Configuration::default()
            },
            value: Value {
                source: Some(SourceRef {
                    path_idx: 0,
                    line: 3,
                    column: 1,
                }),
                comment: String::new(),
                weak: false,
                item: Item::String(text.to_string()),
            },
        }
    }

    fn entry(id: u32, name: &str, values: Vec<ConfigValue>) -> ResourceEntry {
        ResourceEntry {
            id,
            name: name.to_string(),
            visibility: Visibility::default(),
            allow_new: None,
            overlayable_item: None,
            config_values: values,
        }
    }

    fn table(pool: &[u8], entries: Vec<ResourceEntry>) -> ResourceTable {
        ResourceTable {
            source_pool: pool.to_vec(),
            packages: vec![Package {
                id: 0x7f,
                name: "com.example".to_string(),
                types: vec![ResourceType {
                    id: 2,
                    name: "string".to_string(),
                    entries,
                }],
            }],
            overlayables: Vec::new(),
        }
    }

    fn sample() -> ResourceTable {
        let mut table = table(
            b"res/values/strings.xml",
            vec![
                entry(0, "app_name", vec![string_value("App", ""), string_value("Appli", "fr")]),
                entry(1, "title", vec![string_value("Title", "")]),
            ],
        );
        table.packages[0].types.push(ResourceType {
            id: 3,
            name: "drawable".to_string(),
            entries: vec![entry(
                0,
                "icon",
                vec![ConfigValue {
                    config: Configuration {
                        density: 320,
                        ..Configuration::default()
                    },
                    value: Value {
                        source: None,
                        comment: String::new(),
                        weak: false,
                        item: Item::File {
                            path: ZipPath::new("res/drawable-xhdpi/icon.png"),
                        },
                    },
                }],
            )],
        });
        table.overlayables.push(Overlayable {
            name: "ThemeResources".to_string(),
            actor: "overlay://theme".to_string(),
            source: None,
        });
        table
    }

    #[test]
    fn merging_a_table_with_itself_is_identity() {
        let table = sample();
        assert_eq!(merge_resource_tables(&table, &table).unwrap(), table);
    }

    #[test]
    fn entries_union_by_id_in_first_table_order() {
        let first = table(b"pool", vec![entry(1, "b", vec![string_value("B", "")])]);
        let second = table(
            b"pool",
            vec![
                entry(0, "a", vec![string_value("A", "")]),
                entry(1, "b", vec![string_value("Bee", "de")]),
            ],
        );
        let merged = merge_resource_tables(&first, &second).unwrap();
        let entries = &merged.packages[0].types[0].entries;
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(entries[0].config_values.len(), 2);
    }

    #[test]
    fn scalar_mismatch_names_the_field() {
        let first = table(b"pool", vec![entry(1, "b", Vec::new())]);
        let mut public = entry(1, "b", Vec::new());
        public.visibility.level = VisibilityLevel::Public;
        let second = table(b"pool", vec![public]);
        let err = merge_resource_tables(&first, &second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralFieldMismatch);
        assert!(err.to_string().contains("'visibility'"), "{err}");
    }

    #[test]
    fn differing_pools_keep_first_pool_and_strip_second() {
        let first = table(b"pool-a", vec![entry(0, "a", vec![string_value("A", "")])]);
        let second = table(b"pool-b", vec![entry(1, "b", vec![string_value("B", "")])]);
        let merged = merge_resource_tables(&first, &second).unwrap();
        assert_eq!(merged.source_pool, b"pool-a".to_vec());
        let entries = &merged.packages[0].types[0].entries;
        assert!(entries[0].config_values[0].value.source.is_some());
        assert!(entries[1].config_values[0].value.source.is_none());
    }

    #[test]
    fn same_value_with_different_source_is_not_duplicated() {
        let first = table(b"pool-a", vec![entry(0, "a", vec![string_value("A", "")])]);
        let second = table(b"pool-b", vec![entry(0, "a", vec![string_value("A", "")])]);
        let merged = merge_resource_tables(&first, &second).unwrap();
        assert_eq!(merged.packages[0].types[0].entries[0].config_values.len(), 1);
    }

    #[test]
    fn overlayable_indices_are_remapped() {
        let overlayable = |name: &str| Overlayable {
            name: name.to_string(),
            actor: String::new(),
            source: None,
        };
        let item = |idx| OverlayableItem {
            overlayable_idx: idx,
            policies: vec!["public".to_string()],
            source: None,
            comment: String::new(),
        };

        let mut first = table(b"pool", vec![entry(0, "a", Vec::new())]);
        first.overlayables = vec![overlayable("First")];
        first.packages[0].types[0].entries[0].overlayable_item = Some(item(0));

        let mut second = table(b"pool", vec![entry(1, "b", Vec::new())]);
        second.overlayables = vec![overlayable("Second"), overlayable("First")];
        second.packages[0].types[0].entries[0].overlayable_item = Some(item(0));

        let merged = merge_resource_tables(&first, &second).unwrap();
        let names: Vec<&str> = merged.overlayables.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        let entries = &merged.packages[0].types[0].entries;
        assert_eq!(entries[0].overlayable_item.as_ref().unwrap().overlayable_idx, 0);
        assert_eq!(entries[1].overlayable_item.as_ref().unwrap().overlayable_idx, 1);
    }
}
