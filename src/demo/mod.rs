//! The public slide demo site.
//!
//! Test slides are tiled into a tree with one group per input directory,
//! described by `info.js` and per-slide `properties.js` files that the
//! viewer page loads as JSONP, then mirrored into a public S3 bucket.

mod generate;
mod stamp;
mod sync;

pub use generate::{generate, GroupInfo, ImageEntry, PublishUrls, SlideEntry, SlideInfo};
pub use stamp::{SyncStamp, STAMP_NAME};
pub use sync::{sync_info, sync_tiles, walk_files, DirFiles, SyncReport};

/// Default bucket of the demo site.
pub const S3_BUCKET: &str = "openslide-demo";

/// Default public URL of the demo bucket.
pub const BASE_URL: &str = "https://openslide-demo.s3.amazonaws.com/";

/// Default download location of the original slides.
pub const DOWNLOAD_BASE_URL: &str = "https://openslide.cs.cmu.edu/download/openslide-testdata/";

/// Site-wide metadata file.
pub const METADATA_NAME: &str = "info.js";

/// Per-slide properties file.
pub const SLIDE_METADATA_NAME: &str = "properties.js";

/// Display name of a group directory.
pub fn group_display_name(dir_name: &str) -> &str {
    match dir_name {
        "Generic-TIFF" => "Generic TIFF",
        "Hamamatsu" => "Hamamatsu NDPI",
        "Hamamatsu-vms" => "Hamamatsu VMS",
        "Mirax" => "MIRAX",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_display_name() {
        assert_eq!(group_display_name("Mirax"), "MIRAX");
        assert_eq!(group_display_name("Hamamatsu-vms"), "Hamamatsu VMS");
        assert_eq!(group_display_name("Aperio"), "Aperio");
    }
}
