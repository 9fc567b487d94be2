use bundlekit_core::config::{BundleConfig, SplitDimension, SuffixStripping};
use bundlekit_core::suffix::suffix_stripper;
use bundlekit_core::targeting::validate_partition;
use bundlekit_core::{ErrorKind, split_module, split_modules_parallel};
use bundlekit_schema::{
    AndroidManifest, BundleModule, ModuleEntry, ModuleName, ModuleSplit, TargetingDimension,
    TextureCompressionFormat,
};

fn module(name: &str, paths: &[&str]) -> BundleModule {
    let entries = paths
        .iter()
        .map(|p| ModuleEntry::from_bytes(p, format!("{name}:{p}")))
        .collect();
    BundleModule::new(ModuleName::new(name), AndroidManifest::new("com.example.game"), entries)
}

fn config(dimensions: &[TargetingDimension]) -> BundleConfig {
    let mut config = BundleConfig::default();
    config.optimizations.split_dimensions = dimensions
        .iter()
        .map(|dimension| SplitDimension {
            dimension: *dimension,
            negate: false,
            suffix_stripping: SuffixStripping::default(),
        })
        .collect();
    config
}

fn paths(split: &ModuleSplit) -> Vec<&str> {
    split.entries.iter().map(|e| e.path.as_str()).collect()
}

fn game() -> BundleModule {
    module(
        "base",
        &[
            "dex/classes.dex",
            "lib/x86/libgame.so",
            "lib/arm64-v8a/libgame.so",
            "lib/armeabi-v7a/libgame.so",
            "assets/voice#lang_fr/intro.ogg",
            "assets/voice#lang_de/intro.ogg",
            "assets/voice/intro.ogg",
            "assets/textures#tcf_etc1/sky.pkm",
            "assets/textures#tcf_astc/sky.astc",
            "assets/textures/sky.png",
        ],
    )
}

#[test]
fn every_dimension_is_partitioned_and_nothing_is_lost() {
    let config = config(&[
        TargetingDimension::Abi,
        TargetingDimension::Language,
        TargetingDimension::TextureCompressionFormat,
    ]);
    let module = game();
    let splits = split_module(&module, &config).unwrap();

    assert_eq!(splits.iter().filter(|s| s.is_master_split).count(), 1);
    let abis: Vec<_> = splits.iter().filter_map(|s| s.apk_targeting.abi.as_ref()).collect();
    assert_eq!(abis.len(), 3);
    validate_partition(TargetingDimension::Abi, "abi splits", &abis).unwrap();

    let languages: Vec<_> = splits
        .iter()
        .filter_map(|s| s.apk_targeting.language.as_ref())
        .collect();
    assert_eq!(languages.len(), 2);
    validate_partition(TargetingDimension::Language, "language splits", &languages).unwrap();

    let formats: Vec<_> = splits
        .iter()
        .filter_map(|s| s.apk_targeting.texture_compression_format.as_ref())
        .collect();
    validate_partition(
        TargetingDimension::TextureCompressionFormat,
        "texture splits",
        &formats,
    )
    .unwrap();

    let mut all: Vec<&str> = splits.iter().flat_map(paths).collect();
    all.sort_unstable();
    let mut expected: Vec<&str> = module.entries.iter().map(|e| e.path.as_str()).collect();
    expected.sort_unstable();
    assert_eq!(all, expected);

    for split in &splits {
        assert_eq!(
            split.apk_targeting.sdk_version.as_ref().map(|t| t.values.clone()),
            Some([21].into_iter().collect())
        );
    }
}

#[test]
fn texture_split_is_collapsed_onto_its_base_directory() {
    let config = config(&[TargetingDimension::TextureCompressionFormat]);
    let splits = split_module(&game(), &config).unwrap();
    let etc1 = splits
        .into_iter()
        .find(|s| {
            s.apk_targeting
                .texture_compression_format
                .as_ref()
                .is_some_and(|t| t.values.contains(&TextureCompressionFormat::Etc1Rgb8))
        })
        .unwrap();
    assert_eq!(paths(&etc1), vec!["assets/textures#tcf_etc1/sky.pkm"]);

    let policy = SuffixStripping {
        enabled: true,
        default_suffix: Some("etc1".to_string()),
    };
    let stripped = suffix_stripper(TargetingDimension::TextureCompressionFormat)
        .unwrap()
        .apply(etc1, &policy)
        .unwrap();
    assert_eq!(paths(&stripped), vec!["assets/textures/sky.pkm"]);
    assert!(
        stripped
            .apk_targeting
            .texture_compression_format
            .as_ref()
            .is_some_and(|t| t.values.contains(&TextureCompressionFormat::Etc1Rgb8))
    );
}

#[test]
fn missing_default_and_fallback_is_a_configuration_gap() {
    let module = module(
        "base",
        &["assets/textures#tcf_astc/sky.astc", "assets/textures#tcf_pvrtc/sky.pvr"],
    );
    let split = ModuleSplit::for_module(
        &bundlekit_core::targeting::generator::complete_module_configs(&module).unwrap(),
    );
    let policy = SuffixStripping {
        enabled: true,
        default_suffix: Some("etc1".to_string()),
    };
    let err = suffix_stripper(TargetingDimension::TextureCompressionFormat)
        .unwrap()
        .apply(split, &policy)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigurationGap);
}

#[test]
fn modules_split_in_parallel_keep_their_order() {
    let modules = vec![
        game(),
        module("feature", &["dex/classes.dex", "lib/x86/libfeature.so"]),
        module("assets", &["assets/levels/1.bin"]),
    ];
    let splits = split_modules_parallel(&modules, &BundleConfig::default()).unwrap();
    let names: Vec<&ModuleName> = splits.iter().map(|s| &s[0].module_name).collect();
    assert_eq!(
        names,
        vec![
            &ModuleName::base(),
            &ModuleName::new("feature"),
            &ModuleName::new("assets")
        ]
    );
    assert_eq!(splits[2].len(), 1);
}
