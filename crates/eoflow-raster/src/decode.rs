//! Band image decoding.

use eoflow_core::error::{EoflowError, Result};
use ndarray::Array2;
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult, Limits};

/// Decodes one band image into 16-bit pixels.
///
/// Implementations are shared between fill workers and must be thread safe.
pub trait BandDecoder: Send + Sync {
    /// File extension of the encoded band images, without the dot
    fn extension(&self) -> &str;

    /// Decode `bytes` read from `path` (used for error context only)
    fn decode(&self, path: &str, bytes: &[u8]) -> Result<Array2<u16>>;
}

/// Decoder for single-channel GeoTIFF band images
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffBandDecoder;

impl BandDecoder for TiffBandDecoder {
    fn extension(&self) -> &str {
        "tif"
    }

    fn decode(&self, path: &str, bytes: &[u8]) -> Result<Array2<u16>> {
        let decode_error = |reason: String| EoflowError::Decode { path: path.to_string(), reason };

        let decoder = Decoder::new(Cursor::new(bytes))
            .map_err(|e| decode_error(format!("Failed to create decoder: {}", e)))?;
        // Full Sentinel-2 bands exceed the default buffer limits
        let mut decoder = decoder.with_limits(Limits::unlimited());

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| decode_error(format!("Failed to read dimensions: {}", e)))?;

        let data = match decoder.read_image() {
            Ok(DecodingResult::U16(v)) => v,
            Ok(DecodingResult::U8(v)) => v.into_iter().map(u16::from).collect(),
            Ok(_) => return Err(decode_error("Unsupported sample format".to_string())),
            Err(e) => return Err(decode_error(format!("Failed to decode image: {}", e))),
        };

        // Verify data length
        let expected_len = height as usize * width as usize;
        if data.len() != expected_len {
            return Err(decode_error(format!(
                "Data length mismatch: got {}, expected {}",
                data.len(),
                expected_len
            )));
        }

        Array2::from_shape_vec((height as usize, width as usize), data)
            .map_err(|e| decode_error(format!("Failed to create array: {}", e)))
    }
}

/// Encode a 16-bit band as an uncompressed grayscale TIFF
pub fn encode_tiff(band: &Array2<u16>) -> Result<Vec<u8>> {
    use tiff::encoder::{colortype, TiffEncoder};

    let (height, width) = band.dim();
    let data: Vec<u16> = band.iter().copied().collect();
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder =
            TiffEncoder::new(&mut cursor).map_err(|e| EoflowError::Serialization(e.to_string()))?;
        encoder
            .write_image::<colortype::Gray16>(width as u32, height as u32, &data)
            .map_err(|e| EoflowError::Serialization(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
