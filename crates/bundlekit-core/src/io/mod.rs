//! Module archives on disk.
//!
//! A module archive is a zip holding the module's files plus its manifest,
//! resource table and directory configs encoded with
//! [`bundlekit_schema::codec`]. Splits and shards are written back in the
//! same layout.

pub mod archive;

pub use archive::{
    ArchiveReader, ZipArchiveReader, read_module, read_module_archive, split_archive_name,
    write_split_archive,
};
