//! Reading IFD entry values.
//!
//! Small values live inline in the entry; anything larger sits at an offset
//! and costs one range read. Offset arrays (TileOffsets, StripByteCounts)
//! are fetched whole in a single read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads entry values through a `RangeReader` using the header's byte order.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Raw bytes of an entry's value, inline or fetched.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let size = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: "value",
            message: format!("value of {size} bytes is too large"),
        })?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(&entry.value_offset_bytes[..size]));
        }
        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size).await?)
    }

    /// All integer values of a SHORT, LONG or LONG8 entry, widened to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if !matches!(
            field_type,
            FieldType::Short | FieldType::Long | FieldType::Long8
        ) {
            return Err(TiffError::InvalidTagValue {
                tag: "array",
                message: format!("expected an integer type, got {field_type:?}"),
            });
        }
        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        Ok(parse_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.header.byte_order,
        ))
    }

    /// A single integer value.
    pub async fn read_u64(&self, entry: &IfdEntry) -> Result<u64, TiffError> {
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }
        self.read_u64_array(entry)
            .await?
            .first()
            .copied()
            .ok_or(TiffError::InvalidTagValue {
                tag: "integer",
                message: "entry has no values".to_string(),
            })
    }

    /// An ASCII value with the trailing NUL stripped.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: "string",
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }
        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// The first RATIONAL of an entry as a float.
    pub async fn read_rational(&self, entry: &IfdEntry) -> Result<f64, TiffError> {
        if entry.field_type != Some(FieldType::Rational) || entry.count == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "rational",
                message: format!("expected Rational, got type {}", entry.field_type_raw),
            });
        }
        let bytes = self.read_bytes(entry).await?;
        let order = self.header.byte_order;
        let numerator = order.read_u32(&bytes[0..4]);
        let denominator = order.read_u32(&bytes[4..8]);
        if denominator == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "rational",
                message: "zero denominator".to_string(),
            });
        }
        Ok(numerator as f64 / denominator as f64)
    }
}

/// Decode `count` integers of `field_type` from `bytes`, stopping early if
/// the buffer runs out.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    bytes
        .chunks_exact(width)
        .take(count)
        .filter_map(|chunk| match field_type {
            FieldType::Byte => Some(chunk[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(chunk) as u64),
            FieldType::Long => Some(byte_order.read_u32(chunk) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(chunk)),
            _ => None,
        })
        .collect()
}
