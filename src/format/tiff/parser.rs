//! TIFF header and IFD parsing.
//!
//! ## Classic TIFF header (8 bytes)
//! ```text
//! 0-1  byte order ("II" little-endian, "MM" big-endian)
//! 2-3  version 42
//! 4-7  first IFD offset (u32)
//! ```
//!
//! ## BigTIFF header (16 bytes)
//! ```text
//! 0-1   byte order
//! 2-3   version 43
//! 4-5   offset byte size (always 8)
//! 6-7   reserved
//! 8-15  first IFD offset (u64)
//! ```
//!
//! An IFD is an entry count, a run of fixed-size entries, and the offset of
//! the next IFD (0 terminates the chain).

use std::collections::HashMap;

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::tags::{FieldType, TiffTag};

const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;
const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) declared by a TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether offsets and counts are 64-bit
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a header from the first bytes of a file.
    ///
    /// `bytes` should hold 16 bytes when available so BigTIFF headers can be
    /// read; `file_size` bounds the first IFD offset.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        require_len(bytes, TIFF_HEADER_SIZE)?;

        let byte_order = match u16::from_le_bytes([bytes[0], bytes[1]]) {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            other => return Err(TiffError::InvalidMagic(other)),
        };

        let (is_bigtiff, first_ifd_offset) = match byte_order.read_u16(&bytes[2..4]) {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                require_len(bytes, BIGTIFF_HEADER_SIZE)?;
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            other => return Err(TiffError::InvalidVersion(other)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Size of one IFD entry: 12 bytes classic, 20 BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count that opens an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next-IFD offset, and of the inline value field.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

fn require_len(bytes: &[u8], required: usize) -> Result<(), TiffError> {
    if bytes.len() < required {
        return Err(TiffError::FileTooSmall {
            required: required as u64,
            actual: bytes.len() as u64,
        });
    }
    Ok(())
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single tag entry of an IFD.
///
/// The value/offset field is kept raw; whether it holds the value itself or
/// a file offset depends on the value's total size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,

    /// Decoded field type, `None` for types this parser does not know
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value/offset field (4 or 8 bytes)
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value is stored in `value_offset_bytes`
    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let order = header.byte_order;
        let tag_id = order.read_u16(&bytes[0..2]);
        let field_type_raw = order.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (order.read_u64(&bytes[4..12]), 12)
        } else {
            (order.read_u32(&bytes[4..8]) as u64, 8)
        };
        let value_offset_bytes = bytes[value_start..value_start + header.value_offset_size()].to_vec();

        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
        }
    }

    /// Total byte size of the value, `None` for unknown field types.
    pub fn value_byte_size(&self) -> Option<u64> {
        let ft = self.field_type?;
        (ft.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Interpret the value/offset field as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Read a single inline integer value (SHORT, LONG or LONG8).
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        let bytes = &self.value_offset_bytes;
        match self.field_type? {
            FieldType::Byte => Some(bytes[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(bytes) as u64),
            FieldType::Long => Some(byte_order.read_u32(bytes) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(bytes)),
            _ => None,
        }
    }

    /// Same as [`inline_u64`](Self::inline_u64), rejecting values above `u32::MAX`.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u64(byte_order)
            .and_then(|v| u32::try_from(v).ok())
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, Default)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD, 0 for the last one
    pub next_ifd_offset: u64,

    by_tag: HashMap<u16, usize>,
}

impl Ifd {
    /// An IFD with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of bytes an IFD with `entry_count` entries occupies.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.value_offset_size()
    }

    /// Parse an IFD whose bytes start with the entry count.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let order = header.byte_order;
        let count_size = header.ifd_count_size();
        require_len(bytes, count_size)?;

        let entry_count = if header.is_bigtiff {
            order.read_u64(&bytes[..count_size])
        } else {
            order.read_u16(&bytes[..count_size]) as u64
        };
        let size = Self::calculate_size(entry_count, header);
        require_len(bytes, size)?;

        let entry_size = header.ifd_entry_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut by_tag = HashMap::with_capacity(entry_count as usize);
        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let entry = IfdEntry::parse(&bytes[start..start + entry_size], header);
            by_tag.entry(entry.tag_id).or_insert(entries.len());
            entries.push(entry);
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = if header.is_bigtiff {
            order.read_u64(&bytes[next_start..next_start + 8])
        } else {
            order.read_u32(&bytes[next_start..next_start + 4]) as u64
        };

        Ok(Ifd {
            entries,
            next_ifd_offset,
            by_tag,
        })
    }

    pub fn get_entry(&self, tag_id: u16) -> Option<&IfdEntry> {
        self.by_tag.get(&tag_id).map(|&i| &self.entries[i])
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.get_entry(tag.as_u16())
    }

    fn inline_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::TileLength, byte_order)
    }

    pub fn rows_per_strip(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_u32(TiffTag::RowsPerStrip, byte_order)
    }

    /// Compression tag value; TIFF defaults to 1 (none) when absent.
    pub fn compression(&self, byte_order: ByteOrder) -> u16 {
        self.inline_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
            .unwrap_or(1)
    }

    /// Samples per pixel; defaults to 1 when absent.
    pub fn samples_per_pixel(&self, byte_order: ByteOrder) -> u16 {
        self.inline_u32(TiffTag::SamplesPerPixel, byte_order)
            .map(|v| v as u16)
            .unwrap_or(1)
    }

    /// Whether this IFD stores its image as tiles.
    pub fn is_tiled(&self) -> bool {
        self.get_entry_by_tag(TiffTag::TileWidth).is_some()
            && self.get_entry_by_tag(TiffTag::TileOffsets).is_some()
    }
}
