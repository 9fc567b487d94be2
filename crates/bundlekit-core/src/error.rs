//! Error types of the splitting and merging engine.

use std::path::PathBuf;
use std::time::Duration;

use bundlekit_schema::codec::CodecError;
use bundlekit_schema::{ModuleName, TargetingDimension, ZipPath};
use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T, E = BundleError> = std::result::Result<T, E>;

/// Broad failure categories, for callers that branch on the kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Targeting overlap, universe mismatch, coverage gap or composition error.
    TargetingInvariantViolation,
    /// Two entries claim the same path with different content, or a path is
    /// both a file and a directory.
    EntryConflict,
    /// Resource table nodes with the same id disagree on a scalar field.
    StructuralFieldMismatch,
    /// Suffix stripping found neither the default nor a fallback directory.
    ConfigurationGap,
    /// An external tool failed.
    ToolInvocationFailure,
    /// Filesystem or archive failure.
    Io,
    /// Undecodable archive metadata.
    Decode,
    /// Invalid configuration file.
    Config,
}

/// Errors from splitting, merging and sharding.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Invalid {dimension} targeting of {unit}: {reason}")]
    InvalidTargeting {
        dimension: TargetingDimension,
        unit: String,
        reason: String,
    },

    #[error("{0}")]
    TargetingInvariant(String),

    #[error("Modules '{first}' and '{second}' both contain entry '{path}' with different content")]
    EntryConflict {
        path: ZipPath,
        first: ModuleName,
        second: ModuleName,
    },

    #[error("Path '{path}' is used both as a file and as a directory")]
    FileDirectoryCollision { path: ZipPath },

    #[error("Expected same value of field '{field}' for {context}, got '{first}' and '{second}'")]
    FieldMismatch {
        field: &'static str,
        context: String,
        first: String,
        second: String,
    },

    #[error("Failed to fuse manifests: {0}")]
    ManifestFusion(String),

    #[error("Cannot strip {dimension} suffixes of module '{module}': {reason}")]
    ConfigurationGap {
        dimension: TargetingDimension,
        module: ModuleName,
        reason: String,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BundleError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTargeting { .. } | Self::TargetingInvariant(_) => {
                ErrorKind::TargetingInvariantViolation
            }
            Self::EntryConflict { .. } | Self::FileDirectoryCollision { .. } => {
                ErrorKind::EntryConflict
            }
            Self::FieldMismatch { .. } | Self::ManifestFusion(_) => {
                ErrorKind::StructuralFieldMismatch
            }
            Self::ConfigurationGap { .. } => ErrorKind::ConfigurationGap,
            Self::Tool(_) => ErrorKind::ToolInvocationFailure,
            Self::Io(_) | Self::IoAt { .. } | Self::Archive(_) => ErrorKind::Io,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::IoAt { path, source }
    }
}

/// Failures of an external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Could not locate '{tool}': {reason}")]
    NotFound { tool: String, reason: String },

    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with exit code {code:?}:\n{output}")]
    Failed {
        tool: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{tool} timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },

    #[error(
        "Dex merging failed because the result does not fit into a single dex file and \
         multidex is not supported by the input; provide a main-dex list:\n{output}"
    )]
    DexOverflow { output: String },

    #[error("Output directory {0} must exist and be empty")]
    OutputDirectoryNotEmpty(PathBuf),

    #[error("{tool} produced unreadable output in {dir}: {reason}")]
    UnreadableOutput {
        tool: String,
        dir: PathBuf,
        reason: String,
    },
}
