//! Slide abstraction.
//!
//! A [`Slide`] is an opened whole-slide file: a multi-resolution pyramid
//! with properties and associated images. [`ImageSlide`] wraps a single
//! decoded image so associated images can be tiled the same way. Both
//! implement [`RegionSource`], the only interface the Deep Zoom generator
//! needs.

mod image_slide;
mod source;
mod wsi;

pub use image_slide::ImageSlide;
pub use source::RegionSource;
pub use wsi::Slide;
