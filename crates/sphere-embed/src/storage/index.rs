//! Codec for the index → filename artifact.

use bytemuck::bytes_of;

use crate::gallery::GalleryIndex;

use super::{decode_header, DecodeError, EncodeError, StoreHeader, HEADER_LEN, INDEX_MAGIC};

/// Binary encoder/decoder for [`GalleryIndex`].
///
/// Payload: per entry, index u32 (big-endian), name length u16
/// (big-endian), UTF-8 name bytes. Entries are written in index order and
/// validated to be sequential from zero on decode.
#[derive(Debug, Default)]
pub struct IndexFileCodec;

impl IndexFileCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode an index table.
    pub fn encode(&self, index: &GalleryIndex) -> Result<Vec<u8>, EncodeError> {
        let count = u32::try_from(index.len())
            .map_err(|_| EncodeError::TooManyEntries(index.len()))?;
        let header = StoreHeader::new(INDEX_MAGIC, count, 0);

        let mut buffer = Vec::with_capacity(HEADER_LEN + index.len() * 24);
        buffer.extend_from_slice(bytes_of(&header));
        for (i, name) in index.iter() {
            let name_bytes = name.as_bytes();
            let length = u16::try_from(name_bytes.len()).map_err(|_| {
                EncodeError::NameTooLong {
                    name: name.to_string(),
                    length: name_bytes.len(),
                }
            })?;
            buffer.extend_from_slice(&i.to_be_bytes());
            buffer.extend_from_slice(&length.to_be_bytes());
            buffer.extend_from_slice(name_bytes);
        }
        Ok(buffer)
    }

    /// Decode an index table, validating sequential indices and UTF-8.
    pub fn decode(&self, bytes: &[u8]) -> Result<GalleryIndex, DecodeError> {
        let header = decode_header(bytes, INDEX_MAGIC)?;
        let count = header.count() as usize;

        let mut names = Vec::with_capacity(count);
        let mut offset = HEADER_LEN;
        for entry in 0..count {
            if bytes.len() < offset + 6 {
                return Err(DecodeError::BufferTooShort {
                    needed: offset + 6,
                    available: bytes.len(),
                });
            }
            let stored = u32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]);
            if stored as usize != entry {
                return Err(DecodeError::CorruptEntry {
                    index: entry,
                    reason: format!("expected sequential index {}, found {}", entry, stored),
                });
            }
            let length =
                u16::from_be_bytes([bytes[offset + 4], bytes[offset + 5]]) as usize;
            offset += 6;

            if bytes.len() < offset + length {
                return Err(DecodeError::BufferTooShort {
                    needed: offset + length,
                    available: bytes.len(),
                });
            }
            let name = std::str::from_utf8(&bytes[offset..offset + length]).map_err(|e| {
                DecodeError::CorruptEntry {
                    index: entry,
                    reason: format!("invalid UTF-8 name: {}", e),
                }
            })?;
            names.push(name.to_string());
            offset += length;
        }

        if offset != bytes.len() {
            return Err(DecodeError::TrailingBytes(bytes.len() - offset));
        }

        Ok(GalleryIndex::from_assigned(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> GalleryIndex {
        GalleryIndex::from_names(vec![
            "c.jpg".to_string(),
            "a.jpg".to_string(),
            "b.jpg".to_string(),
        ])
    }

    #[test]
    fn encode_writes_magic() {
        let bytes = IndexFileCodec::new().encode(&sample_index()).unwrap();
        assert_eq!(&bytes[0..4], b"SGIX");
    }

    #[test]
    fn round_trip_preserves_assignment() {
        let codec = IndexFileCodec::new();
        let decoded = codec.decode(&codec.encode(&sample_index()).unwrap()).unwrap();
        assert_eq!(decoded.get(0), Some("a.jpg"));
        assert_eq!(decoded.get(1), Some("b.jpg"));
        assert_eq!(decoded.get(2), Some("c.jpg"));
        assert_eq!(decoded.len(), 3);
    }

    #[test]
    fn decode_rejects_non_sequential_indices() {
        let mut bytes = IndexFileCodec::new().encode(&sample_index()).unwrap();
        // Corrupt the first entry's index.
        bytes[HEADER_LEN + 3] = 7;
        assert!(matches!(
            IndexFileCodec::new().decode(&bytes),
            Err(DecodeError::CorruptEntry { index: 0, .. })
        ));
    }

    #[test]
    fn decode_rejects_truncation_mid_entry() {
        let bytes = IndexFileCodec::new().encode(&sample_index()).unwrap();
        let truncated = &bytes[..bytes.len() - 2];
        assert!(matches!(
            IndexFileCodec::new().decode(truncated),
            Err(DecodeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn unicode_names_round_trip() {
        let codec = IndexFileCodec::new();
        let index = GalleryIndex::from_names(vec!["kuva-äö.jpg".to_string()]);
        let decoded = codec.decode(&codec.encode(&index).unwrap()).unwrap();
        assert_eq!(decoded.get(0), Some("kuva-äö.jpg"));
    }
}
