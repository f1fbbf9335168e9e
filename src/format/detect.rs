//! Slide format detection.
//!
//! Detection looks at the TIFF header and the first IFD only:
//!
//! - **Aperio SVS**: ImageDescription starts with "Aperio"
//! - **Generic TIFF**: any other TIFF whose first image is tiled
//!
//! Everything else (non-TIFF data, stripped TIFFs) is unsupported and the
//! file is skipped by the tiler.

use crate::error::SlideError;
use crate::io::RangeReader;

use super::tiff::{read_header, read_ifd, ByteOrder, TiffTag, ValueReader, TIFF_HEADER_SIZE};

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    AperioSvs,
    GenericTiff,
}

impl SlideFormat {
    /// Value of the `openslide.vendor` property.
    pub const fn vendor(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "aperio",
            SlideFormat::GenericTiff => "generic-tiff",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic TIFF",
        }
    }
}

const APERIO_MARKER: &str = "Aperio";

/// Detect the format of a slide.
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, SlideError> {
    let mut magic = [0u8; TIFF_HEADER_SIZE];
    if reader.size() >= TIFF_HEADER_SIZE as u64 {
        magic.copy_from_slice(&reader.read_exact_at(0, TIFF_HEADER_SIZE).await?);
    }
    if !is_tiff_header(&magic) {
        return Err(SlideError::UnsupportedFormat {
            reason: format!("{} is not a TIFF file", reader.identifier()),
        });
    }

    let header = read_header(reader).await?;
    let ifd = read_ifd(reader, &header, header.first_ifd_offset).await?;

    if !ifd.is_tiled() {
        return Err(SlideError::UnsupportedFormat {
            reason: format!("{} is not a tiled TIFF", reader.identifier()),
        });
    }

    if let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) {
        let description = ValueReader::new(reader, &header).read_string(entry).await?;
        if description.starts_with(APERIO_MARKER) {
            return Ok(SlideFormat::AperioSvs);
        }
    }
    Ok(SlideFormat::GenericTiff)
}

/// Cheap check for TIFF or BigTIFF magic.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }
    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };
    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    #[test]
    fn test_is_tiff_header() {
        assert!(is_tiff_header(&[0x49, 0x49, 0x2A, 0x00, 8, 0, 0, 0]));
        assert!(is_tiff_header(&[0x4D, 0x4D, 0x00, 0x2B, 0, 8, 0, 0]));
        assert!(!is_tiff_header(&[0x49, 0x49, 0x00, 0x00, 8, 0, 0, 0]));
        assert!(!is_tiff_header(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, 0x4A, 0x46]));
        assert!(!is_tiff_header(b"PK\x03\x04\x14\x00\x00\x00"));
        assert!(!is_tiff_header(&[0x49, 0x49, 0x2A]));
    }

    #[tokio::test]
    async fn test_detect_rejects_non_tiff() {
        let reader = MemoryReader::new(b"just some text, not a slide".to_vec(), "mem://text");
        assert!(matches!(
            detect_format(&reader).await,
            Err(SlideError::UnsupportedFormat { .. })
        ));

        let tiny = MemoryReader::new(vec![0x49, 0x49], "mem://tiny");
        assert!(matches!(
            detect_format(&tiny).await,
            Err(SlideError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_vendor_names() {
        assert_eq!(SlideFormat::AperioSvs.vendor(), "aperio");
        assert_eq!(SlideFormat::GenericTiff.vendor(), "generic-tiff");
    }
}
