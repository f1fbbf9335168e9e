//! JPEG stream handling for TIFF-embedded tiles.
//!
//! TIFF files with JPEG compression may store "abbreviated" streams per tile
//! or strip: the quantization (DQT) and Huffman (DHT) tables are stored once
//! in the `JPEGTables` tag and left out of each chunk. Such a chunk has to be
//! spliced with the tables before a standard decoder can read it:
//!
//! ```text
//! tables: SOI DQT DHT EOI
//! chunk:  SOI SOF SOS <data> EOI
//! merged: SOI DQT DHT SOF SOS <data> EOI
//! ```

use bytes::{Bytes, BytesMut};
use image::RgbImage;

use crate::error::SlideError;

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const DHT: [u8; 2] = [0xFF, 0xC4];
pub const DQT: [u8; 2] = [0xFF, 0xDB];
pub const SOS: [u8; 2] = [0xFF, 0xDA];

/// Walk the marker segments before SOS and report whether DQT/DHT tables
/// are present. Returns `None` when the data does not start with SOI or no
/// SOS is reached.
fn scan_header(data: &[u8]) -> Option<bool> {
    if data.len() < 4 || data[0..2] != SOI {
        return None;
    }

    let mut has_tables = false;
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = [data[pos], data[pos + 1]];
        match marker {
            SOS => return Some(has_tables),
            DQT | DHT => has_tables = true,
            _ => {}
        }
        // Fill bytes and standalone markers carry no length
        if marker[1] == 0xFF || marker[1] == 0x01 || (0xD0..=0xD9).contains(&marker[1]) {
            pos += if marker[1] == 0xFF { 1 } else { 2 };
            continue;
        }
        if pos + 3 >= data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 2 + length;
    }
    None
}

/// Whether `data` is a JPEG stream missing its DQT/DHT tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    scan_header(data) == Some(false)
}

/// Splice `tables` (minus its EOI) with `chunk` (minus its SOI).
pub fn merge_jpeg_tables(tables: &[u8], chunk: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(chunk);
    }
    if chunk.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let chunk = chunk.strip_prefix(&SOI).unwrap_or(chunk);

    let mut merged = BytesMut::with_capacity(tables.len() + chunk.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(chunk);
    merged.freeze()
}

/// Produce a self-contained JPEG stream from a chunk and optional tables.
pub fn prepare_jpeg(tables: Option<&[u8]>, chunk: &[u8]) -> Bytes {
    match tables {
        Some(tables) if !chunk.starts_with(&SOI) || is_abbreviated_stream(chunk) => {
            merge_jpeg_tables(tables, chunk)
        }
        _ => Bytes::copy_from_slice(chunk),
    }
}

/// Decode a chunk to RGB, merging `tables` first when needed.
pub fn decode_jpeg(tables: Option<&[u8]>, chunk: &[u8]) -> Result<RgbImage, SlideError> {
    let stream = prepare_jpeg(tables, chunk);
    image::load_from_memory_with_format(&stream, image::ImageFormat::Jpeg)
        .map(|img| img.to_rgb8())
        .map_err(|e| SlideError::Decode {
            message: e.to_string(),
        })
}
