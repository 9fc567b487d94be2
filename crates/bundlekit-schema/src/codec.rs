//! Binary encoding of manifests, resource tables and directory configs as
//! they are stored inside module archives.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Archive entry holding the encoded [`AndroidManifest`](crate::AndroidManifest).
pub const MANIFEST_ENTRY: &str = "manifest.pb";
/// Archive entry holding the encoded [`ResourceTable`](crate::ResourceTable).
pub const RESOURCES_ENTRY: &str = "resources.pb";
/// Archive entry holding the encoded [`Assets`](crate::Assets) config.
pub const ASSETS_ENTRY: &str = "assets.pb";
/// Archive entry holding the encoded [`NativeLibraries`](crate::NativeLibraries) config.
pub const NATIVE_ENTRY: &str = "native.pb";
/// Archive entry holding the encoded [`ApexImages`](crate::ApexImages) config.
pub const APEX_ENTRY: &str = "apex.pb";

/// Errors raised while encoding or decoding an archive metadata entry.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("Failed to encode {what}: {reason}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// Underlying serializer message.
        reason: String,
    },

    /// The bytes do not describe a value of the expected type.
    #[error("Failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// Underlying deserializer message.
        reason: String,
    },
}

/// Encode `value` with postcard.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Encode {
        what,
        reason: e.to_string(),
    })
}

/// Decode a postcard-encoded value.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if `bytes` is not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Decode {
        what,
        reason: e.to_string(),
    })
}
