//! Chunked 4-D pixel store.
//!
//! Layout follows Zarr v2 with no compressor: a `.zarray` metadata document at the root and
//! one blob per `(1, 1, chunk, chunk)` chunk keyed `{r}.{b}.{cy}.{cx}`, holding little-endian
//! `u16` samples in C order. Edge chunks are stored full size, padded with the fill value.
//! Chunks that were never written read back as the fill value.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::ports::{join_path, ByteStore};
use ndarray::{s, Array2, ArrayView2};
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;

const FILL_VALUE: u16 = 0;

#[derive(Debug, Clone, Serialize)]
struct ArrayMetadata {
    zarr_format: u8,
    shape: Vec<usize>,
    chunks: Vec<usize>,
    dtype: String,
    compressor: Option<serde_json::Value>,
    fill_value: u16,
    order: String,
    filters: Option<serde_json::Value>,
}

/// `(revisit, band, y, x)` array of 16-bit pixels stored chunk by chunk
#[derive(Clone)]
pub struct ChunkedArray {
    store: Arc<dyn ByteStore>,
    root: String,
    shape: [usize; 4],
    chunk: usize,
}

impl std::fmt::Debug for ChunkedArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedArray")
            .field("root", &self.root)
            .field("shape", &self.shape)
            .field("chunk", &self.chunk)
            .finish()
    }
}

impl ChunkedArray {
    /// Create an array, replacing any metadata already at `root`
    pub fn create(
        store: Arc<dyn ByteStore>,
        root: &str,
        shape: [usize; 4],
        chunk: usize,
    ) -> Result<Self> {
        if chunk == 0 {
            return Err(EoflowError::Shape("chunk size must be greater than zero".to_string()));
        }

        let metadata = ArrayMetadata {
            zarr_format: 2,
            shape: shape.to_vec(),
            chunks: vec![1, 1, chunk, chunk],
            dtype: "<u2".to_string(),
            compressor: None,
            fill_value: FILL_VALUE,
            order: "C".to_string(),
            filters: None,
        };

        store.mkdir(root)?;
        let bytes = serde_json::to_vec_pretty(&metadata)?;
        store.write(&join_path(root, ".zarray"), &bytes)?;

        tracing::debug!(root, ?shape, chunk, "Created chunked array");
        Ok(Self { store, root: root.to_string(), shape, chunk })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Number of chunks along y and x
    pub fn chunk_grid(&self) -> (usize, usize) {
        (self.shape[2].div_ceil(self.chunk), self.shape[3].div_ceil(self.chunk))
    }

    fn chunk_key(&self, revisit: usize, band: usize, cy: usize, cx: usize) -> String {
        join_path(&self.root, &format!("{}.{}.{}.{}", revisit, band, cy, cx))
    }

    fn check_plane(&self, revisit: usize, band: usize) -> Result<()> {
        if revisit >= self.shape[0] || band >= self.shape[1] {
            return Err(EoflowError::Shape(format!(
                "plane ({}, {}) outside array of shape {:?}",
                revisit, band, self.shape
            )));
        }
        Ok(())
    }

    /// Store one full `(y, x)` plane, chunk by chunk
    pub fn write_band(&self, revisit: usize, band: usize, data: ArrayView2<'_, u16>) -> Result<()> {
        self.check_plane(revisit, band)?;
        if data.dim() != (self.shape[2], self.shape[3]) {
            return Err(EoflowError::Shape(format!(
                "band of shape {:?} does not fit plane {}x{}",
                data.dim(),
                self.shape[2],
                self.shape[3]
            )));
        }

        let (rows, cols) = self.chunk_grid();
        for cy in 0..rows {
            for cx in 0..cols {
                let y0 = cy * self.chunk;
                let x0 = cx * self.chunk;
                let y1 = (y0 + self.chunk).min(self.shape[2]);
                let x1 = (x0 + self.chunk).min(self.shape[3]);
                self.write_chunk(revisit, band, cy, cx, data.slice(s![y0..y1, x0..x1]))?;
            }
        }
        Ok(())
    }

    /// Store one chunk. Blocks smaller than a chunk are padded with the fill value.
    pub fn write_chunk(
        &self,
        revisit: usize,
        band: usize,
        cy: usize,
        cx: usize,
        block: ArrayView2<'_, u16>,
    ) -> Result<()> {
        let (h, w) = block.dim();
        if h > self.chunk || w > self.chunk {
            return Err(EoflowError::Shape(format!(
                "block {:?} larger than chunk {}",
                block.dim(),
                self.chunk
            )));
        }

        let mut bytes = Vec::with_capacity(self.chunk * self.chunk * 2);
        for y in 0..self.chunk {
            for x in 0..self.chunk {
                let value = if y < h && x < w { block[[y, x]] } else { FILL_VALUE };
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        self.store.write(&self.chunk_key(revisit, band, cy, cx), &bytes)
    }

    /// Read one full chunk
    pub fn read_chunk(&self, revisit: usize, band: usize, cy: usize, cx: usize) -> Result<Array2<u16>> {
        let key = self.chunk_key(revisit, band, cy, cx);
        if !self.store.exists(&key)? {
            return Ok(Array2::from_elem((self.chunk, self.chunk), FILL_VALUE));
        }

        let bytes = self.store.read(&key)?;
        if bytes.len() != self.chunk * self.chunk * 2 {
            return Err(EoflowError::Decode {
                path: key,
                reason: format!("chunk holds {} bytes, expected {}", bytes.len(), self.chunk * self.chunk * 2),
            });
        }

        let values = bytes.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]])).collect();
        Array2::from_shape_vec((self.chunk, self.chunk), values)
            .map_err(|e| EoflowError::Shape(e.to_string()))
    }

    /// Read a rectangular region of one plane. The region must lie inside the array.
    pub fn read_region(
        &self,
        revisit: usize,
        band: usize,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Array2<u16>> {
        self.check_plane(revisit, band)?;
        if rows.end > self.shape[2] || cols.end > self.shape[3] || rows.start > rows.end || cols.start > cols.end {
            return Err(EoflowError::Shape(format!(
                "region {:?} x {:?} outside plane {}x{}",
                rows, cols, self.shape[2], self.shape[3]
            )));
        }

        let mut out = Array2::<u16>::zeros((rows.len(), cols.len()));
        if rows.is_empty() || cols.is_empty() {
            return Ok(out);
        }

        for cy in rows.start / self.chunk..=(rows.end - 1) / self.chunk {
            for cx in cols.start / self.chunk..=(cols.end - 1) / self.chunk {
                let chunk = self.read_chunk(revisit, band, cy, cx)?;

                let y0 = (cy * self.chunk).max(rows.start);
                let y1 = ((cy + 1) * self.chunk).min(rows.end);
                let x0 = (cx * self.chunk).max(cols.start);
                let x1 = ((cx + 1) * self.chunk).min(cols.end);

                out.slice_mut(s![y0 - rows.start..y1 - rows.start, x0 - cols.start..x1 - cols.start])
                    .assign(&chunk.slice(s![
                        y0 - cy * self.chunk..y1 - cy * self.chunk,
                        x0 - cx * self.chunk..x1 - cx * self.chunk
                    ]));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoflow_store::MemoryStore;

    fn array(store: &MemoryStore) -> ChunkedArray {
        ChunkedArray::create(Arc::new(store.clone()), "scratch/30UXC.zarr", [2, 1, 5, 5], 2).unwrap()
    }

    #[test]
    fn test_metadata_written() {
        let store = MemoryStore::new();
        array(&store);

        let meta: serde_json::Value =
            serde_json::from_slice(&store.read("scratch/30UXC.zarr/.zarray").unwrap()).unwrap();
        assert_eq!(meta["shape"], serde_json::json!([2, 1, 5, 5]));
        assert_eq!(meta["chunks"], serde_json::json!([1, 1, 2, 2]));
        assert_eq!(meta["dtype"], "<u2");
        assert_eq!(meta["zarr_format"], 2);
        assert_eq!(meta["fill_value"], 0);
        assert!(meta["compressor"].is_null());
    }

    #[test]
    fn test_write_band_and_read_region() {
        let store = MemoryStore::new();
        let arr = array(&store);
        let band = Array2::from_shape_fn((5, 5), |(r, c)| (r * 10 + c) as u16);

        arr.write_band(1, 0, band.view()).unwrap();
        // 3 x 3 chunks, edge chunks padded to full size
        assert_eq!(store.list("scratch/30UXC.zarr/1.0.").len(), 9);
        assert_eq!(store.read("scratch/30UXC.zarr/1.0.2.2").unwrap().len(), 8);

        let region = arr.read_region(1, 0, 1..4, 2..5).unwrap();
        assert_eq!(region, band.slice(s![1..4, 2..5]));
        assert_eq!(arr.read_region(1, 0, 0..5, 0..5).unwrap(), band);
    }

    #[test]
    fn test_unwritten_chunks_read_as_fill() {
        let store = MemoryStore::new();
        let arr = array(&store);
        let region = arr.read_region(0, 0, 0..3, 0..3).unwrap();
        assert!(region.iter().all(|v| *v == 0));
    }

    #[test]
    fn test_out_of_bounds() {
        let store = MemoryStore::new();
        let arr = array(&store);
        assert!(arr.read_region(0, 0, 0..6, 0..2).is_err());
        assert!(arr.read_region(2, 0, 0..1, 0..1).is_err());
        assert!(arr.write_band(0, 0, Array2::zeros((4, 4)).view()).is_err());
    }
}
