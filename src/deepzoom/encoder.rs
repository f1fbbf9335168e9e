//! JPEG tile encoder.
//!
//! Rendered tiles are always re-encoded: tiles come from resampled regions,
//! never straight from the source file.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::TileError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// JPEG encoder for rendered tiles.
#[derive(Debug, Clone, Copy)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegTileEncoder {
    /// Create an encoder; quality is clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a tile.
    pub fn encode(&self, tile: &RgbImage) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode_image(tile)
            .map_err(|e| TileError::Encode {
                message: e.to_string(),
            })?;
        Ok(Bytes::from(output))
    }
}

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
