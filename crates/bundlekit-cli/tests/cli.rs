//! End-to-end runs of the `bundlekit` binary.

use std::path::Path;
use std::process::Command;

use bundlekit_core::io::write_split_archive;
use bundlekit_schema::{AndroidManifest, BundleModule, ModuleEntry, ModuleName, ModuleSplit};
use tempfile::TempDir;

fn bundlekit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bundlekit"))
}

fn write_module(dir: &Path) -> std::path::PathBuf {
    let module = BundleModule::new(
        ModuleName::base(),
        AndroidManifest::new("com.example.app"),
        vec![
            ModuleEntry::from_bytes("dex/classes.dex", "dex"),
            ModuleEntry::from_bytes("lib/x86/libapp.so", "x86"),
            ModuleEntry::from_bytes("lib/arm64-v8a/libapp.so", "arm64"),
        ],
    );
    let path = dir.join("base.zip");
    write_split_archive(&ModuleSplit::for_module(&module), &path).expect("failed to write module");
    path
}

#[test]
fn help_lists_subcommands() {
    let output = bundlekit().arg("--help").output().expect("failed to run bundlekit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("split"));
    assert!(stdout.contains("shard"));
}

#[test]
fn split_writes_one_archive_per_split() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let module = write_module(dir.path());
    let out = dir.path().join("splits");

    let output = bundlekit()
        .args(["split", "--module"])
        .arg(&module)
        .arg("--output")
        .arg(&out)
        .output()
        .expect("failed to run bundlekit");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(out.join("base-master.zip").is_file());
    assert!(out.join("base-x86.zip").is_file());
    assert!(out.join("base-arm64_v8a.zip").is_file());
}

#[test]
fn shard_writes_standalone_archives() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let module = write_module(dir.path());
    let out = dir.path().join("shards");

    let output = bundlekit()
        .args(["shard", "--module"])
        .arg(&module)
        .arg("--output")
        .arg(&out)
        .output()
        .expect("failed to run bundlekit");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(out.join("standalone-x86.zip").is_file());
    assert!(out.join("standalone-arm64_v8a.zip").is_file());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("standalone-x86.zip"));
}

#[test]
fn unreadable_config_fails_with_context() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let module = write_module(dir.path());
    let config = dir.path().join("bundle.yaml");
    std::fs::write(&config, "nope").expect("failed to write config");

    let output = bundlekit()
        .args(["split", "--module"])
        .arg(&module)
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(dir.path().join("out"))
        .output()
        .expect("failed to run bundlekit");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}
