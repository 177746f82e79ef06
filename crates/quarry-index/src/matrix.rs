//! Dense embedding matrix with a little-endian binary codec.
//!
//! Row order is id-map order; the codec persists rows verbatim so a
//! reloaded matrix is byte-identical to the ingested one.

use std::io::{Read, Write};
use std::path::Path;

use quarry_core::errors::{IndexError, QuarryResult};

/// Fixed-dimension row-major f32 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    dims: usize,
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            rows: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    /// Append a row, enforcing the fixed dimensionality.
    pub fn push(&mut self, row: Vec<f32>) -> QuarryResult<()> {
        if row.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: row.len(),
            }
            .into());
        }
        self.rows.push(row);
        Ok(())
    }

    /// Write the matrix: `u64` row count, `u64` dims, then rows as LE f32.
    pub fn write(&self, path: &Path) -> QuarryResult<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&(self.rows.len() as u64).to_le_bytes())?;
        file.write_all(&(self.dims as u64).to_le_bytes())?;
        for row in &self.rows {
            let bytes: Vec<u8> = row.iter().flat_map(|f| f.to_le_bytes()).collect();
            file.write_all(&bytes)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Read a matrix previously written by [`EmbeddingMatrix::write`].
    pub fn read(path: &Path) -> QuarryResult<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let row_count = u64::from_le_bytes(header) as usize;
        file.read_exact(&mut header)?;
        let dims = u64::from_le_bytes(header) as usize;

        let mut body = Vec::new();
        file.read_to_end(&mut body)?;
        let expected = row_count
            .checked_mul(dims)
            .and_then(|cells| cells.checked_mul(4))
            .ok_or_else(|| IndexError::CorruptSnapshot {
                details: format!("implausible matrix header: {row_count} rows x {dims} dims"),
            })?;
        if body.len() != expected {
            return Err(IndexError::CorruptSnapshot {
                details: format!(
                    "matrix body is {} bytes, expected {expected} ({row_count} rows x {dims} dims)",
                    body.len()
                ),
            }
            .into());
        }

        let mut rows = Vec::with_capacity(row_count);
        for chunk in body.chunks_exact(dims * 4) {
            let row: Vec<f32> = chunk
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            rows.push(row);
        }
        Ok(Self { dims, rows })
    }
}
