//! Binary persistence for gallery artifacts.
//!
//! Two files, written side by side and overwritten unconditionally on each
//! run:
//!
//! | File | Codec | Contents |
//! |------|-------|----------|
//! | `gallery_feats.bin` | [`FeatureFileCodec`] | N×D f32 matrix, big-endian |
//! | `gallery_index.bin` | [`IndexFileCodec`] | index → filename entries |
//!
//! Both start with the same 32-byte header (magic, version, counts); floats
//! are stored big-endian for cross-platform stability. Decoding fails fast
//! on bad magic, unknown versions, and truncated buffers.

mod features;
mod index;

use bytemuck::{Pod, Zeroable};

pub use features::{FeatureFileCodec, FeatureMatrix};
pub use index::IndexFileCodec;

/// Feature matrix artifact file name.
pub const FEATURE_FILE_NAME: &str = "gallery_feats.bin";

/// Index table artifact file name.
pub const INDEX_FILE_NAME: &str = "gallery_index.bin";

/// Magic bytes for the feature matrix file: "SGFT".
pub const FEATURE_MAGIC: [u8; 4] = *b"SGFT";

/// Magic bytes for the index file: "SGIX".
pub const INDEX_MAGIC: [u8; 4] = *b"SGIX";

/// Binary format version. Increment when either layout changes.
pub const STORE_VERSION: u16 = 1;

/// Fixed-size header shared by both artifact files (32 bytes).
///
/// Layout (multi-byte values big-endian in the encoded stream):
/// - [0..4] magic
/// - [4..6] version: u16
/// - [6..8] flags: u16 (reserved, zero)
/// - [8..12] count: u32 (rows / entries)
/// - [12..16] dim: u32 (feature dimension; zero for the index file)
/// - [16..32] reserved
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct StoreHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub flags: u16,
    pub count: u32,
    pub dim: u32,
    pub _reserved: [u8; 16],
}

const _HEADER_SIZE_CHECK: () = assert!(
    std::mem::size_of::<StoreHeader>() == 32,
    "StoreHeader must be exactly 32 bytes"
);

/// Header length in bytes.
pub const HEADER_LEN: usize = 32;

impl StoreHeader {
    pub(crate) fn new(magic: [u8; 4], count: u32, dim: u32) -> Self {
        Self {
            magic,
            version: STORE_VERSION.to_be(),
            flags: 0,
            count: count.to_be(),
            dim: dim.to_be(),
            _reserved: [0; 16],
        }
    }

    pub(crate) fn count(&self) -> u32 {
        u32::from_be(self.count)
    }

    pub(crate) fn dim(&self) -> u32 {
        u32::from_be(self.dim)
    }
}

/// Parse and validate a header from the front of a buffer.
pub(crate) fn decode_header(bytes: &[u8], magic: [u8; 4]) -> Result<StoreHeader, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::BufferTooShort {
            needed: HEADER_LEN,
            available: bytes.len(),
        });
    }
    let header: &StoreHeader = bytemuck::try_from_bytes(&bytes[0..HEADER_LEN])
        .map_err(|_| DecodeError::InvalidMagic)?;
    if header.magic != magic {
        return Err(DecodeError::InvalidMagic);
    }
    let version = u16::from_be(header.version);
    if version > STORE_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    Ok(*header)
}

/// Errors during artifact encoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("filename too long to index ({length} bytes): {name}")]
    NameTooLong { name: String, length: usize },

    #[error("row {row} has {actual} values, feature matrix dimension is {expected}")]
    RowDimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("too many entries for the index format: {0}")]
    TooManyEntries(usize),
}

/// Errors during artifact decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported format version: {0} (max supported: {STORE_VERSION})")]
    UnsupportedVersion(u16),

    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },

    #[error("corrupt entry {index}: {reason}")]
    CorruptEntry { index: usize, reason: String },

    #[error("trailing bytes after payload: {0}")]
    TrailingBytes(usize),
}
