use bundlekit_core::io::{read_module_archive, split_archive_name, write_split_archive};
use bundlekit_core::{BundleConfig, split_module};
use bundlekit_schema::{
    AndroidManifest, BundleModule, ModuleEntry, ModuleName, ModuleSplit,
};

fn module() -> BundleModule {
    let mut manifest = AndroidManifest::new("com.example.app");
    manifest.min_sdk_version = Some(24);
    BundleModule::new(
        ModuleName::base(),
        manifest,
        vec![
            ModuleEntry::from_bytes("dex/classes.dex", "dex"),
            ModuleEntry::from_bytes("lib/x86/libapp.so", "x86"),
            ModuleEntry::from_bytes("lib/arm64-v8a/libapp.so", "arm64"),
            ModuleEntry::from_bytes("assets/config.json", "{}"),
        ],
    )
}

#[test]
fn module_survives_a_trip_through_zip() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("base.zip");
    write_split_archive(&ModuleSplit::for_module(&module()), &archive).unwrap();

    let read = read_module_archive(&archive, &dir.path().join("staging")).unwrap();
    assert_eq!(read.name, ModuleName::base());
    assert_eq!(read.manifest, module().manifest);
    let mut expected: Vec<String> = module().entries.iter().map(|e| e.path.to_string()).collect();
    expected.sort();
    let actual: Vec<String> = read.entries.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(actual, expected);
    for entry in &read.entries {
        let original = module()
            .entries
            .into_iter()
            .find(|e| e.path == entry.path)
            .unwrap();
        assert!(entry.content_equals(&original).unwrap());
    }
}

#[test]
fn splits_of_a_read_module_are_written_with_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("base.zip");
    write_split_archive(&ModuleSplit::for_module(&module()), &archive).unwrap();
    let read = read_module_archive(&archive, &dir.path().join("staging")).unwrap();

    let mut config = BundleConfig::default();
    config.optimizations.uncompress_native_libraries = true;
    let splits = split_module(&read, &config).unwrap();
    assert_eq!(splits.len(), 3);

    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    let mut names = Vec::new();
    for split in &splits {
        let name = split_archive_name(split);
        write_split_archive(split, &out.join(&name)).unwrap();
        names.push(name);
    }
    names.sort();
    assert_eq!(names, vec!["base-arm64_v8a.zip", "base-master.zip", "base-x86.zip"]);

    let x86 = read_module_archive(&out.join("base-x86.zip"), &dir.path().join("x86")).unwrap();
    let lib = x86
        .entries
        .iter()
        .find(|e| e.path.as_str() == "lib/x86/libapp.so")
        .unwrap();
    assert!(lib.force_uncompressed);
}
