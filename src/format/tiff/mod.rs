//! TIFF and BigTIFF structure parsing.
//!
//! - **Byte order**: declared by the header ("II" or "MM"); every multi-byte
//!   value in the file follows it.
//! - **Classic vs BigTIFF**: 32-bit vs 64-bit offsets and counts. Both are
//!   handled by the same code paths via [`TiffHeader`].
//! - **IFDs**: one per image. Slide files chain pyramid levels and associated
//!   images (thumbnail, label, macro) together.

mod parser;
mod pyramid;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{read_header, read_ifd, PyramidLevel, TiffPyramid, TileData};
pub use tags::{compression_name, Compression, FieldType, TiffTag, ASCII_PROPERTY_TAGS};
pub use values::{parse_u64_array, ValueReader};
