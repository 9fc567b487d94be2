use std::collections::{BTreeMap, BTreeSet};

use bundlekit_core::merge::merge_resource_tables;
use bundlekit_core::splitter::{AbiNativeLibrariesSplitter, ModuleSplitSplitter};
use bundlekit_core::targeting::generator::complete_module_configs;
use bundlekit_core::targeting::{merge_dimension, validate_partition};
use bundlekit_schema::{
    Abi, AndroidManifest, BundleModule, ConfigValue, Configuration, DimensionTargeting, Item,
    ModuleEntry, ModuleName, ModuleSplit, Package, ResourceEntry, ResourceTable, ResourceType,
    TargetingDimension, Value,
};
use proptest::prelude::*;

const ABIS: [Abi; 5] = [Abi::ArmeabiV7a, Abi::Arm64V8a, Abi::X86, Abi::X86_64, Abi::Riscv64];

fn table(entries: BTreeMap<u32, BTreeMap<String, String>>) -> ResourceTable {
    let entries = entries
        .into_iter()
        .map(|(id, values)| ResourceEntry {
            id,
            name: format!("entry_{id}"),
            config_values: values
                .into_iter()
                .map(|(locale, text)| ConfigValue {
                    config: Configuration {
                        locale,
                        ..Configuration::default()
                    },
                    value: Value {
                        source: None,
                        comment: String::new(),
                        weak: false,
                        item: Item::String(text),
                    },
                })
                .collect(),
            ..ResourceEntry::default()
        })
        .collect();
    ResourceTable {
        packages: vec![Package {
            id: 0x7f,
            name: "com.example".to_string(),
            types: vec![ResourceType {
                id: 1,
                name: "string".to_string(),
                entries,
            }],
        }],
        ..ResourceTable::default()
    }
}

fn entries_strategy() -> impl Strategy<Value = BTreeMap<u32, BTreeMap<String, String>>> {
    proptest::collection::btree_map(
        0u32..64,
        proptest::collection::btree_map(
            proptest::sample::select(vec!["", "en", "fr", "de-DE", "pt-BR"]).prop_map(String::from),
            "[a-z]{0,8}",
            0..4,
        ),
        0..12,
    )
}

fn abi_subset() -> impl Strategy<Value = BTreeSet<Abi>> {
    proptest::sample::subsequence(ABIS.to_vec(), 1..=ABIS.len())
        .prop_map(|abis| abis.into_iter().collect())
}

proptest! {
    #[test]
    fn merging_a_table_with_itself_changes_nothing(entries in entries_strategy()) {
        let table = table(entries);
        prop_assert_eq!(merge_resource_tables(&table, &table).unwrap(), table);
    }

    #[test]
    fn table_merge_keeps_every_value(
        first in entries_strategy(),
        second in entries_strategy(),
    ) {
        let (first, second) = (table(first), table(second));
        let merged = merge_resource_tables(&first, &second).unwrap();
        for value in first.config_values().chain(second.config_values()) {
            prop_assert!(merged.config_values().any(|v| v == value));
        }
    }

    #[test]
    fn abi_splits_partition_the_declared_abis(abis in abi_subset()) {
        let entries = abis
            .iter()
            .map(|abi| {
                ModuleEntry::from_bytes(&format!("lib/{}/libapp.so", abi.as_str()), abi.to_string())
            })
            .chain([ModuleEntry::from_bytes("dex/classes.dex", "dex")])
            .collect();
        let module = BundleModule::new(ModuleName::base(), AndroidManifest::new("com.example"), entries);
        let module = complete_module_configs(&module).unwrap();

        let splits = AbiNativeLibrariesSplitter.split(ModuleSplit::for_module(&module)).unwrap();
        let targetings: Vec<&DimensionTargeting<Abi>> =
            splits.iter().filter_map(|s| s.apk_targeting.abi.as_ref()).collect();
        prop_assert_eq!(targetings.len(), abis.len());
        validate_partition(TargetingDimension::Abi, "abi splits", &targetings).unwrap();
        for targeting in targetings {
            prop_assert_eq!(targeting.universe(), abis.clone());
        }
    }

    #[test]
    fn merged_targeting_covers_both_sides(a in abi_subset(), b in abi_subset()) {
        let universe: BTreeSet<Abi> = a.union(&b).copied().collect();
        let left = DimensionTargeting::new(a.iter().copied(), universe.difference(&a).copied());
        let right = DimensionTargeting::new(b.iter().copied(), universe.difference(&b).copied());
        let merged = merge_dimension(&left, &right);
        prop_assert_eq!(&merged.values, &universe);
        prop_assert!(merged.alternatives.is_empty());
        prop_assert_eq!(merge_dimension(&merged, &merged), merged);
    }
}
