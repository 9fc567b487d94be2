use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bundlekit_schema::codec::{
    self, APEX_ENTRY, ASSETS_ENTRY, CodecError, MANIFEST_ENTRY, NATIVE_ENTRY, RESOURCES_ENTRY,
};
use bundlekit_schema::{
    AndroidManifest, BundleModule, ByteSource, ModuleEntry, ModuleName, ModuleSplit, SplitType,
    ZipPath,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{BundleError, Result};
use crate::targeting::generator::complete_module_configs;
use crate::targeting::targeting_suffix;

const METADATA_ENTRIES: [&str; 5] = [
    MANIFEST_ENTRY,
    RESOURCES_ENTRY,
    ASSETS_ENTRY,
    NATIVE_ENTRY,
    APEX_ENTRY,
];

/// Source of a module's files and encoded metadata.
pub trait ArchiveReader {
    /// Regular entries sorted by path; metadata entries are left out.
    fn entries(&mut self) -> Result<Vec<ModuleEntry>>;

    /// Raw bytes of a metadata entry, `None` if the archive has none.
    fn metadata(&mut self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Reads a zip module archive. Entries are extracted into a staging
/// directory once and handed out as file-backed content.
pub struct ZipArchiveReader {
    archive: ZipArchive<File>,
    path: PathBuf,
    staging_dir: PathBuf,
}

impl std::fmt::Debug for ZipArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchiveReader")
            .field("path", &self.path)
            .field("staging_dir", &self.staging_dir)
            .finish_non_exhaustive()
    }
}

impl ZipArchiveReader {
    pub fn open(path: &Path, staging_dir: impl Into<PathBuf>) -> Result<Self> {
        let file = File::open(path).map_err(BundleError::io_at(path))?;
        Ok(Self {
            archive: ZipArchive::new(file)?,
            path: path.to_path_buf(),
            staging_dir: staging_dir.into(),
        })
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn entries(&mut self) -> Result<Vec<ModuleEntry>> {
        fs::create_dir_all(&self.staging_dir).map_err(BundleError::io_at(&self.staging_dir))?;
        let mut entries = Vec::new();

        for i in 0..self.archive.len() {
            let mut file = self.archive.by_index(i)?;
            if file.is_dir() || METADATA_ENTRIES.contains(&file.name()) {
                continue;
            }
            let Some(relative_path) = file.enclosed_name() else {
                return Err(BundleError::Archive(ZipError::InvalidArchive(
                    "entry path escapes the archive root".into(),
                )));
            };

            let absolute_path = self.staging_dir.join(&relative_path);
            if let Some(parent) = absolute_path.parent() {
                fs::create_dir_all(parent).map_err(BundleError::io_at(parent))?;
            }
            let mut outfile = File::create(&absolute_path).map_err(BundleError::io_at(&absolute_path))?;
            io::copy(&mut file, &mut outfile).map_err(BundleError::io_at(&absolute_path))?;

            entries.push(ModuleEntry {
                path: ZipPath::new(file.name()),
                content: ByteSource::from_file(absolute_path),
                force_uncompressed: file.compression() == CompressionMethod::Stored,
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(archive = %self.path.display(), entries = entries.len(), "read archive entries");
        Ok(entries)
    }

    fn metadata(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.archive.by_name(name) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn decode_optional<T: DeserializeOwned>(
    reader: &mut dyn ArchiveReader,
    name: &'static str,
) -> Result<Option<T>> {
    reader
        .metadata(name)?
        .map(|bytes| codec::decode(name, &bytes))
        .transpose()
        .map_err(BundleError::from)
}

/// Assemble a module from an archive. Directory configs missing from the
/// archive are generated from directory names.
pub fn read_module(reader: &mut dyn ArchiveReader) -> Result<BundleModule> {
    let manifest: AndroidManifest = decode_optional(reader, MANIFEST_ENTRY)?.ok_or_else(|| {
        BundleError::Decode(CodecError::Decode {
            what: MANIFEST_ENTRY,
            reason: "the archive has no manifest".to_string(),
        })
    })?;
    let name = manifest
        .split_id
        .as_deref()
        .map_or_else(ModuleName::base, ModuleName::new);

    let mut module = BundleModule::new(name, manifest, reader.entries()?);
    module.resource_table = decode_optional(reader, RESOURCES_ENTRY)?;
    module.assets_config = decode_optional(reader, ASSETS_ENTRY)?;
    module.native_config = decode_optional(reader, NATIVE_ENTRY)?;
    module.apex_config = decode_optional(reader, APEX_ENTRY)?;
    complete_module_configs(&module)
}

/// [`read_module`] over a zip file, staging its entries under `staging_dir`.
pub fn read_module_archive(path: &Path, staging_dir: &Path) -> Result<BundleModule> {
    let mut reader = ZipArchiveReader::open(path, staging_dir)?;
    let module = read_module(&mut reader)?;
    tracing::info!(
        module = %module.name,
        archive = %path.display(),
        entries = module.entries.len(),
        "read module"
    );
    Ok(module)
}

/// File name for a split archive, e.g. `base-master.zip`,
/// `base-arm64_v8a.zip` or `standalone-x86.hdpi.zip`.
pub fn split_archive_name(split: &ModuleSplit) -> String {
    let suffix = targeting_suffix(&split.apk_targeting);
    let prefix = match split.split_type {
        SplitType::Standalone | SplitType::Apex => "standalone".to_string(),
        _ => split.module_name.to_string(),
    };
    match (suffix.is_empty(), split.is_master_split) {
        (true, true) => format!("{prefix}-master.zip"),
        (true, false) => format!("{prefix}.zip"),
        (false, _) => format!("{prefix}-{suffix}.zip"),
    }
}

fn write_metadata<T: Serialize>(
    writer: &mut ZipWriter<File>,
    name: &'static str,
    value: Option<&T>,
) -> Result<()> {
    if let Some(value) = value {
        writer.start_file(name, SimpleFileOptions::default())?;
        writer.write_all(&codec::encode(name, value)?)?;
    }
    Ok(())
}

/// Write `split` as a zip archive. Entries marked `force_uncompressed` are
/// stored, everything else is deflated.
pub fn write_split_archive(split: &ModuleSplit, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(BundleError::io_at(path))?;
    let mut writer = ZipWriter::new(file);

    for entry in &split.entries {
        let method = if entry.force_uncompressed {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        writer.start_file(entry.path.as_str(), SimpleFileOptions::default().compression_method(method))?;
        let mut content = entry.content.open().map_err(BundleError::io_at(path))?;
        io::copy(&mut content, &mut writer).map_err(BundleError::io_at(path))?;
    }

    write_metadata(&mut writer, MANIFEST_ENTRY, Some(&split.manifest))?;
    write_metadata(&mut writer, RESOURCES_ENTRY, split.resource_table.as_ref())?;
    write_metadata(&mut writer, ASSETS_ENTRY, split.assets_config.as_ref())?;
    write_metadata(&mut writer, NATIVE_ENTRY, split.native_config.as_ref())?;
    write_metadata(&mut writer, APEX_ENTRY, split.apex_config.as_ref())?;
    writer.finish()?;

    tracing::debug!(path = %path.display(), entries = split.entries.len(), "wrote split archive");
    Ok(())
}
