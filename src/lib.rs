//! # wsi-tiler
//!
//! Deep Zoom tile generation for Whole Slide Images, plus the tooling that
//! publishes the tiles and maintains the slide test-data corpus.
//!
//! Slides are read with native TIFF/SVS parsers: only the tiles a region
//! needs are read and decoded. A [`DeepZoomGenerator`] slices a slide (or
//! any of its associated images) into a Deep Zoom pyramid, which a bounded
//! [`TilePool`] renders to disk as JPEG tiles with a DZI descriptor.
//!
//! ## Architecture
//!
//! - [`io`] - Positional reads from local files and memory
//! - [`mod@format`] - TIFF/SVS parsers and JPEG handling
//! - [`slide`] - Opened slides and the [`RegionSource`] seam
//! - [`deepzoom`] - Deep Zoom geometry, DZI descriptors and tile encoding
//! - [`tiler`] - Rendering tile trees for slides and directories
//! - [`demo`] - The demo site: tree generation and bucket sync
//! - [`store`] - Object storage (S3 and in-memory)
//! - [`testdata`] - Fetching and indexing the test-data corpus
//! - [`upload`] - Publishing release artifacts
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wsi_tiler::{tile_slide, TilePool, TileSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = TilePool::default();
//!     let tiled = tile_slide(
//!         &pool,
//!         TileSettings::default(),
//!         Path::new("CMU-1.svs"),
//!         Path::new("out"),
//!         "cmu-1",
//!     )
//!     .await?;
//!     for image in &tiled.images {
//!         println!("{}", image.relpath);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deepzoom;
pub mod demo;
pub mod error;
pub mod format;
pub mod io;
mod json;
pub mod slide;
pub mod store;
pub mod testdata;
pub mod tiler;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use config::{Cli, Command};
pub use deepzoom::{DeepZoomGenerator, DziDescriptor, JpegTileEncoder};
pub use demo::{generate, sync_info, sync_tiles, PublishUrls, SlideInfo, SyncReport, SyncStamp};
pub use error::{
    FetchError, IndexError, IoError, SlideError, StoreError, TiffError, TileError, TreeError,
};
pub use format::{detect_format, SlideFormat};
pub use io::{LocalFileReader, MemoryReader, RangeReader};
pub use slide::{ImageSlide, RegionSource, Slide};
pub use store::{create_s3_client, MemoryStore, ObjectStore, S3Store};
pub use testdata::{fetch_repo, process_repo, FetchReport, SlideRecord};
pub use tiler::{slugify, tile_slide, tile_tree, TilePool, TileSettings};
pub use upload::{execute_upload, local_to_remote_path, plan_upload, UploadPlan};
