//! Archive paths and lazily read entry content.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// Normalized forward-slash path of an entry inside a module or split.
///
/// Leading, trailing and repeated slashes are dropped, so `"/assets//x/"`
/// and `"assets/x"` are the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ZipPath(String);

impl ZipPath {
    /// Create a normalized path.
    pub fn new(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Self(segments.join("/"))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, or `""` for the root.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Enclosing directory, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::default(),
        })
    }

    /// Append a relative path.
    pub fn join(&self, relative: &str) -> Self {
        Self::new(&format!("{}/{relative}", self.0))
    }

    /// Segment-wise prefix test: `lib/x86/a.so` starts with `lib/x86` but
    /// `lib/x86_64/a.so` does not.
    pub fn starts_with(&self, prefix: &ZipPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    /// Remainder after a segment-wise prefix.
    pub fn strip_prefix(&self, prefix: &ZipPath) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        if prefix.is_root() {
            return Some(self.clone());
        }
        Some(Self::new(&self.0[prefix.0.len()..]))
    }

    /// Proper ancestors, innermost first, excluding the root.
    pub fn ancestors(&self) -> impl Iterator<Item = ZipPath> + '_ {
        let mut current = self.parent();
        std::iter::from_fn(move || {
            let next = current.take().filter(|p| !p.is_root())?;
            current = next.parent();
            Some(next)
        })
    }
}

impl fmt::Display for ZipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ZipPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for ZipPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where the bytes of an entry come from.
///
/// File-backed sources are only opened when read. Equality of two sources
/// is structural; use [`ByteSource::content_equals`] to compare bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    /// Bytes held in memory.
    Memory(Bytes),
    /// Bytes stored in a file on disk.
    File(PathBuf),
}

impl ByteSource {
    /// In-memory source.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Memory(bytes.into())
    }

    /// File-backed source, read lazily.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// On-disk location, if file-backed.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::File(path) => Some(path),
        }
    }

    /// Open a reader over the content.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file-backed source cannot be opened.
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Self::File(path) => Ok(Box::new(File::open(path)?)),
        }
    }

    /// Read the whole content.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file-backed source cannot be read.
    pub fn read_all(&self) -> io::Result<Bytes> {
        match self {
            Self::Memory(bytes) => Ok(bytes.clone()),
            Self::File(path) => Ok(Bytes::from(std::fs::read(path)?)),
        }
    }

    /// BLAKE3 digest of the content.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file-backed source cannot be read.
    pub fn digest(&self) -> io::Result<ContentDigest> {
        match self {
            Self::Memory(bytes) => Ok(ContentDigest::compute(bytes)),
            Self::File(_) => ContentDigest::compute_reader(self.open()?),
        }
    }

    /// Whether both sources yield the same bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file-backed source cannot be read.
    pub fn content_equals(&self, other: &ByteSource) -> io::Result<bool> {
        match (self, other) {
            (Self::Memory(a), Self::Memory(b)) => Ok(a == b),
            (Self::File(a), Self::File(b)) if a == b => Ok(true),
            _ => Ok(self.digest()? == other.digest()?),
        }
    }
}

/// One file of a module or split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Location inside the archive.
    pub path: ZipPath,
    /// Content source.
    pub content: ByteSource,
    /// Whether the entry must be stored without compression.
    pub force_uncompressed: bool,
}

impl ModuleEntry {
    /// Create a compressible entry.
    pub fn new(path: ZipPath, content: ByteSource) -> Self {
        Self {
            path,
            content,
            force_uncompressed: false,
        }
    }

    /// Create an in-memory entry; convenient for fixtures.
    pub fn from_bytes(path: &str, bytes: impl Into<Bytes>) -> Self {
        Self::new(ZipPath::new(path), ByteSource::from_bytes(bytes))
    }

    /// Same content under another path.
    pub fn with_path(&self, path: ZipPath) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }

    /// Same entry, marked to be stored uncompressed.
    pub fn uncompressed(self) -> Self {
        Self {
            force_uncompressed: true,
            ..self
        }
    }

    /// Whether the entry lives under `directory` (segment-wise).
    pub fn is_under(&self, directory: &ZipPath) -> bool {
        self.path.starts_with(directory) && self.path != *directory
    }

    /// Byte-wise content comparison, ignoring path and compression flag.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if either content cannot be read.
    pub fn content_equals(&self, other: &ModuleEntry) -> io::Result<bool> {
        self.content.content_equals(&other.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_path_normalizes_slashes() {
        assert_eq!(ZipPath::new("/assets//tex/"), ZipPath::new("assets/tex"));
        assert_eq!(ZipPath::new("assets/tex").join("a.png").as_str(), "assets/tex/a.png");
    }

    #[test]
    fn zip_path_prefix_is_segment_wise() {
        let lib = ZipPath::new("lib/x86");
        assert!(ZipPath::new("lib/x86/libfoo.so").starts_with(&lib));
        assert!(!ZipPath::new("lib/x86_64/libfoo.so").starts_with(&lib));
        assert_eq!(
            ZipPath::new("lib/x86/libfoo.so").strip_prefix(&lib),
            Some(ZipPath::new("libfoo.so"))
        );
    }

    #[test]
    fn zip_path_ancestors_innermost_first() {
        let ancestors: Vec<String> = ZipPath::new("a/b/c.txt")
            .ancestors()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(ancestors, vec!["a/b", "a"]);
        assert_eq!(ZipPath::new("a").parent(), Some(ZipPath::default()));
    }

    #[test]
    fn file_and_memory_sources_compare_by_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.dex");
        std::fs::write(&path, b"dex\n035").unwrap();

        let on_disk = ByteSource::from_file(&path);
        assert!(on_disk.content_equals(&ByteSource::from_bytes(&b"dex\n035"[..])).unwrap());
        assert!(!on_disk.content_equals(&ByteSource::from_bytes(&b"dex\n039"[..])).unwrap());
        assert_ne!(on_disk, ByteSource::from_bytes(&b"dex\n035"[..]));
    }
}
