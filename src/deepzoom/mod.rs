//! Deep Zoom tile generation.
//!
//! [`DeepZoomGenerator`] slices any [`RegionSource`](crate::slide::RegionSource)
//! into the Deep Zoom tile pyramid; [`DziDescriptor`] describes the result
//! and [`JpegTileEncoder`] encodes the tiles.

mod dzi;
mod encoder;
mod generator;

pub use dzi::{DziDescriptor, DZI_NAMESPACE, MIN_TILE_LEVEL};
pub use encoder::{
    clamp_quality, is_valid_quality, JpegTileEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use generator::{DeepZoomGenerator, TileInfo, DEFAULT_OVERLAP, DEFAULT_TILE_SIZE};
