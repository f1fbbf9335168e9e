//! Tiling integration tests.
//!
//! Tests verify:
//! - Deep Zoom geometry over a real multi-level slide
//! - Tile files, overlap at the edges and tile content
//! - DZI descriptors and resuming an interrupted run

use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use wsi_tiler::deepzoom::MIN_TILE_LEVEL;
use wsi_tiler::io::MemoryReader;
use wsi_tiler::{
    tile_slide, DeepZoomGenerator, JpegTileEncoder, RegionSource, Slide, TilePool, TileSettings,
};

use super::test_utils::{SlideBuilder, TEST_TILE_COLOR};

const TILE_SETTINGS: TileSettings = TileSettings {
    tile_size: 254,
    overlap: 1,
};

fn svs_bytes() -> Vec<u8> {
    SlideBuilder::new(1000, 600)
        .levels(3)
        .aperio("Aperio Image Library v10.0.50\r\n1000x600 (256x256) JPEG/RGB Q=70|AppMag = 40|MPP = 0.25")
        .thumbnail(100, 60)
        .label(50, 40)
        .build()
}

fn count_tiles(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}

fn assert_close(actual: [u8; 3], expected: [u8; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.abs_diff(e) <= 12, "{actual:?} != {expected:?}");
    }
}

// =============================================================================
// Deep Zoom Geometry
// =============================================================================

#[tokio::test]
async fn test_generator_geometry_over_slide() {
    let slide = Slide::open(MemoryReader::new(svs_bytes(), "mem://geometry.svs"))
        .await
        .unwrap();
    assert_eq!(slide.level_count(), 3);
    let dz = DeepZoomGenerator::new(Arc::new(slide), 254, 1);

    assert_eq!(dz.level_count(), 11);
    assert_eq!(dz.level_dimensions()[0], (1, 1));
    assert_eq!(dz.level_dimensions()[10], (1000, 600));
    assert_eq!(dz.level_tiles()[10], (4, 3));
    assert_eq!(dz.level_tiles()[9], (2, 2));
    assert_eq!(dz.tile_count(), 25);

    // Overlap only on interior edges
    let first = dz.get_tile(10, (0, 0)).await.unwrap();
    assert_eq!(first.dimensions(), (255, 255));
    let last = dz.get_tile(10, (3, 2)).await.unwrap();
    assert_eq!(last.dimensions(), (239, 93));

    // Lower levels are read from the smaller slide levels
    assert_eq!(dz.tile_info(9, (0, 0)).unwrap().slide_level, 1);
    assert_eq!(dz.tile_info(8, (0, 0)).unwrap().slide_level, 2);
    assert_eq!(dz.tile_info(3, (0, 0)).unwrap().slide_level, 2);

    let pixel = first.get_pixel(100, 100).0;
    assert_close(pixel, TEST_TILE_COLOR);

    assert!(dz.get_tile(11, (0, 0)).await.is_err());
    assert!(dz.get_tile(10, (4, 0)).await.is_err());
}

// =============================================================================
// Tile Trees
// =============================================================================

#[tokio::test]
async fn test_tile_slide_writes_pyramid() {
    let dir = tempfile::tempdir().unwrap();
    let slide_path = dir.path().join("CMU-1.svs");
    std::fs::write(&slide_path, svs_bytes()).unwrap();
    let out = dir.path().join("out");

    let pool = TilePool::new(3, JpegTileEncoder::new(80));
    let tiled = tile_slide(&pool, TILE_SETTINGS, &slide_path, &out, "cmu-1")
        .await
        .unwrap();

    let names: Vec<_> = tiled
        .images
        .iter()
        .map(|i| i.associated.as_deref())
        .collect();
    assert_eq!(names, vec![None, Some("label"), Some("thumbnail")]);
    assert_eq!(tiled.properties["openslide.mpp-x"], "0.25");

    assert_eq!(count_tiles(&out.join("cmu-1/slide_files")), 25);
    let top = image::open(out.join("cmu-1/slide_files/10/3_2.jpeg")).unwrap();
    assert_eq!((top.width(), top.height()), (239, 93));

    let dzi = std::fs::read_to_string(out.join("cmu-1/slide.dzi")).unwrap();
    assert_eq!(dzi, tiled.images[0].dzi);
    assert!(dzi.contains(&format!("MinTileLevel=\"{MIN_TILE_LEVEL}\"")));
    assert!(dzi.contains("Format=\"jpeg\""));
    assert!(dzi.contains("TileSize=\"254\""));
    assert!(dzi.contains("<Size Height=\"600\" Width=\"1000\"/>"));

    // Associated images are tiled as single-level images
    let label = image::open(out.join("cmu-1/label_files/6/0_0.jpeg")).unwrap();
    assert_eq!((label.width(), label.height()), (50, 40));
    assert!(out.join("cmu-1/thumbnail.dzi").is_file());
}

#[tokio::test]
async fn test_tiling_resumes_without_rewriting() {
    let dir = tempfile::tempdir().unwrap();
    let slide_path = dir.path().join("scan.tiff");
    std::fs::write(&slide_path, SlideBuilder::new(600, 300).levels(2).build()).unwrap();
    let out = dir.path().join("out");
    let pool = TilePool::default();

    tile_slide(&pool, TILE_SETTINGS, &slide_path, &out, "").await.unwrap();
    let marker = out.join("slide_files/0/0_0.jpeg");
    std::fs::write(&marker, b"kept").unwrap();
    std::fs::remove_file(out.join("slide_files/10/1_0.jpeg")).unwrap();

    tile_slide(&pool, TILE_SETTINGS, &slide_path, &out, "").await.unwrap();
    assert_eq!(std::fs::read(&marker).unwrap(), b"kept");
    assert!(out.join("slide_files/10/1_0.jpeg").is_file());
}
