//! Decoding a whole TIFF image into memory.
//!
//! Used for associated images (thumbnail, label, macro), which are small
//! enough to hold at once. Both tiled and stripped layouts are handled, with
//! JPEG or no compression; 8-bit chunky samples only.

use image::{imageops, RgbImage};
use tracing::debug;

use crate::error::{SlideError, TiffError};
use crate::io::RangeReader;

use super::jpeg::decode_jpeg;
use super::tiff::{compression_name, Compression, Ifd, TiffHeader, TiffTag, TileData};

/// Read and decode the full image described by `ifd`.
pub async fn read_ifd_image<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    ifd: &Ifd,
) -> Result<RgbImage, SlideError> {
    let order = header.byte_order;
    let width = ifd
        .image_width(order)
        .ok_or(TiffError::MissingTag("ImageWidth"))?;
    let height = ifd
        .image_height(order)
        .ok_or(TiffError::MissingTag("ImageLength"))?;

    let raw_compression = ifd.compression(order);
    let compression = Compression::from_u16(raw_compression)
        .filter(|c| c.is_image_decodable())
        .ok_or_else(|| TiffError::UnsupportedCompression(compression_name(raw_compression)))?;

    let planar = ifd
        .get_entry_by_tag(TiffTag::PlanarConfiguration)
        .and_then(|e| e.inline_u32(order))
        .unwrap_or(1);
    if planar != 1 {
        return Err(SlideError::Decode {
            message: "planar sample layout is not supported".to_string(),
        });
    }
    let samples = ifd.samples_per_pixel(order);

    // Chunk grid: (chunk width, chunk height, chunks per row)
    let (data, chunk_w, chunk_h, per_row) = if ifd.is_tiled() {
        let tw = ifd
            .tile_width(order)
            .ok_or(TiffError::MissingTag("TileWidth"))?;
        let th = ifd
            .tile_height(order)
            .ok_or(TiffError::MissingTag("TileLength"))?;
        let data = TileData::load_tiles(reader, header, ifd).await?;
        (data, tw, th, width.div_ceil(tw.max(1)))
    } else {
        let rows = ifd.rows_per_strip(order).unwrap_or(height).min(height);
        let data = TileData::load_strips(reader, header, ifd).await?;
        (data, width, rows, 1)
    };
    if chunk_w == 0 || chunk_h == 0 {
        return Err(SlideError::Decode {
            message: "zero-sized tiles or strips".to_string(),
        });
    }
    debug!(
        width,
        height,
        chunks = data.offsets.len(),
        compression = compression.name(),
        "Decoding associated image"
    );

    let mut image = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    for (index, (&offset, &len)) in data.offsets.iter().zip(&data.byte_counts).enumerate() {
        if len == 0 {
            continue;
        }
        let bytes = reader.read_exact_at(offset, len as usize).await?;
        let chunk = match compression {
            Compression::Jpeg => decode_jpeg(data.jpeg_tables.as_deref(), &bytes)?,
            _ => {
                // Last strip may hold fewer rows
                let row = (index as u32 / per_row) * chunk_h;
                let rows = if per_row == 1 {
                    chunk_h.min(height.saturating_sub(row))
                } else {
                    chunk_h
                };
                raw_to_rgb(&bytes, chunk_w, rows, samples)?
            }
        };
        let x = (index as u32 % per_row) * chunk_w;
        let y = (index as u32 / per_row) * chunk_h;
        imageops::replace(&mut image, &chunk, x as i64, y as i64);
    }

    Ok(image)
}

/// Convert uncompressed 8-bit gray, RGB or RGBA samples to RGB.
pub fn raw_to_rgb(data: &[u8], width: u32, height: u32, samples: u16) -> Result<RgbImage, SlideError> {
    let samples = samples as usize;
    let pixels = width as usize * height as usize;
    if !matches!(samples, 1 | 3 | 4) || data.len() < pixels * samples {
        return Err(SlideError::Decode {
            message: format!(
                "expected {pixels} pixels of {samples} samples, got {} bytes",
                data.len()
            ),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for px in data[..pixels * samples].chunks_exact(samples) {
        match samples {
            1 => rgb.extend_from_slice(&[px[0], px[0], px[0]]),
            _ => rgb.extend_from_slice(&px[..3]),
        }
    }
    RgbImage::from_raw(width, height, rgb).ok_or_else(|| SlideError::Decode {
        message: "pixel buffer size mismatch".to_string(),
    })
}
