//! Codec for the N×D feature matrix artifact.

use bytemuck::bytes_of;

use super::{decode_header, DecodeError, EncodeError, StoreHeader, FEATURE_MAGIC, HEADER_LEN};

/// Row-major f32 matrix of gallery embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    /// Create an empty matrix with the given row dimension.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Row dimension.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows.
    #[must_use]
    pub fn count(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    /// Append one embedding row.
    pub fn push_row(&mut self, row: &[f32]) -> Result<(), EncodeError> {
        if row.len() != self.dim {
            return Err(EncodeError::RowDimensionMismatch {
                row: self.count(),
                expected: self.dim,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Borrow one row.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Flat row-major data.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Binary encoder/decoder for [`FeatureMatrix`].
#[derive(Debug, Default)]
pub struct FeatureFileCodec;

impl FeatureFileCodec {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode a matrix: header plus big-endian f32 payload.
    pub fn encode(&self, matrix: &FeatureMatrix) -> Result<Vec<u8>, EncodeError> {
        let count = u32::try_from(matrix.count())
            .map_err(|_| EncodeError::TooManyEntries(matrix.count()))?;
        let header = StoreHeader::new(FEATURE_MAGIC, count, matrix.dim() as u32);

        let mut buffer = Vec::with_capacity(HEADER_LEN + matrix.data().len() * 4);
        buffer.extend_from_slice(bytes_of(&header));
        for &value in matrix.data() {
            buffer.extend_from_slice(&value.to_be_bytes());
        }
        Ok(buffer)
    }

    /// Decode a matrix, validating magic, version, and exact payload size.
    pub fn decode(&self, bytes: &[u8]) -> Result<FeatureMatrix, DecodeError> {
        let header = decode_header(bytes, FEATURE_MAGIC)?;
        let count = header.count() as usize;
        let dim = header.dim() as usize;

        let needed = HEADER_LEN + count * dim * 4;
        if bytes.len() < needed {
            return Err(DecodeError::BufferTooShort {
                needed,
                available: bytes.len(),
            });
        }
        if bytes.len() > needed {
            return Err(DecodeError::TrailingBytes(bytes.len() - needed));
        }

        let mut data = Vec::with_capacity(count * dim);
        for i in 0..count * dim {
            let offset = HEADER_LEN + i * 4;
            data.push(f32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]));
        }
        Ok(FeatureMatrix { dim, data })
    }
}
