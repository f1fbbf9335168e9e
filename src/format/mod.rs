//! Whole-slide image file formats.
//!
//! Both supported formats are TIFF-based:
//!
//! - **Aperio SVS**: identified by "Aperio" at the start of the first
//!   ImageDescription; carries vendor properties and associated images
//! - **Generic TIFF**: any tiled, JPEG-compressed pyramidal TIFF
//!
//! Use [`detect_format`] to classify a file before opening it as a
//! [`Slide`](crate::slide::Slide).

pub mod detect;
pub mod jpeg;
pub mod raster;
pub mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use svs::SvsMetadata;
