//! Deep Zoom tile trees on disk.
//!
//! Output layout for a slide at `out_base`:
//!
//! ```text
//! {out_base}/slide.dzi
//! {out_base}/slide_files/{level}/{col}_{row}.jpeg
//! {out_base}/{associated}.dzi
//! {out_base}/{associated}_files/{level}/{col}_{row}.jpeg
//! ```

mod pool;
mod slug;
mod tree;

pub use pool::{enumerate_tiles, tile_image, TileJob, TileJobs, TilePool, DEFAULT_JOBS, FORMAT};
pub use slug::{dzi_for, image_base_name, slugify, VIEWER_SLIDE_NAME};
pub use tree::{tile_slide, tile_tree, TileSettings, TiledImage, TiledSlide};

pub(crate) use tree::{extract_zip, is_zip, join_rel, scratch_dir, sorted_entries};
