//! Byte-range access to slide files.
//!
//! Slide parsers never read whole files. They ask a [`RangeReader`] for the
//! exact byte ranges they need (headers, IFDs, tile offset arrays, tile
//! payloads), which keeps memory bounded even for multi-gigabyte slides.

mod local;
mod memory;
mod range_reader;

pub use local::LocalFileReader;
pub use memory::MemoryReader;
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};
