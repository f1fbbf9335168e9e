//! Demo site integration tests.
//!
//! Tests verify:
//! - Tree generation from grouped slides and zip archives
//! - info.js / properties.js contents and published URLs
//! - Stamp and complete-tree protection
//! - Idempotent synchronization into an object store

use std::io::Write;
use std::path::Path;

use url::Url;

use wsi_tiler::demo::{self, walk_files, PublishUrls, SyncStamp, STAMP_NAME};
use wsi_tiler::{MemoryStore, TilePool, TileSettings, TreeError};

use super::test_utils::SlideBuilder;

const SETTINGS: TileSettings = TileSettings {
    tile_size: 254,
    overlap: 1,
};

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, data) in entries {
        zip.start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// A small test-data checkout with three usable groups.
fn input_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for group in ["Aperio", "Generic-TIFF", "Mirax", "Empty"] {
        std::fs::create_dir(root.join(group)).unwrap();
    }

    let svs = SlideBuilder::new(400, 300)
        .levels(2)
        .aperio("Aperio Image Library v10.0.50\r\n400x300 (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.5")
        .label(40, 30)
        .build();
    std::fs::write(root.join("Aperio/CMU-1.svs"), svs).unwrap();
    std::fs::write(root.join("Aperio/index.yaml"), b"format: Aperio\n").unwrap();

    let tiff = SlideBuilder::new(300, 200).build();
    std::fs::write(root.join("Generic-TIFF/Small.tiff"), &tiff).unwrap();
    write_zip(
        &root.join("Mirax/Bundle.zip"),
        &[("notes.txt", b"not a slide"), ("scan.tiff", &tiff)],
    );
    std::fs::write(root.join("Empty/readme.txt"), b"nothing here").unwrap();
    std::fs::write(root.join("README"), b"top-level files are ignored").unwrap();
    dir
}

fn urls() -> PublishUrls {
    PublishUrls {
        base_url: Url::parse("https://tiles.example.org/demo/").unwrap(),
        download_base_url: Url::parse("https://files.example.org/testdata/").unwrap(),
    }
}

fn read_jsonp(path: &Path, callback: &str) -> serde_json::Value {
    let text = std::fs::read_to_string(path).unwrap();
    let json = text
        .strip_prefix(&format!("{callback}("))
        .and_then(|t| t.strip_suffix(");\n"))
        .unwrap();
    serde_json::from_str(json).unwrap()
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_generate_writes_metadata() {
    let input = input_tree();
    let out = tempfile::tempdir().unwrap();
    let out_root = out.path().join("tiles");
    let stamp = SyncStamp::new(SETTINGS, 75);

    let data = demo::generate(input.path(), &out_root, &TilePool::default(), SETTINGS, &stamp, &urls())
        .await
        .unwrap();
    assert_eq!(data.stamp, stamp.as_str());
    assert_eq!(data.groups.len(), 3);

    let info = read_jsonp(&out_root.join("info.js"), "set_slide_info");
    assert_eq!(info["stamp"], stamp.as_str());
    assert_eq!(info["renderer"], stamp.renderer());

    let names: Vec<_> = info["groups"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Aperio", "Generic TIFF", "MIRAX"]);

    let cmu = &info["groups"][0]["slides"][0];
    assert_eq!(cmu["name"], "CMU-1");
    assert!(cmu["slide"]["name"].is_null());
    assert_eq!(
        cmu["slide"]["url"],
        "https://tiles.example.org/demo/aperio/cmu-1/slide.dzi"
    );
    assert!(cmu["slide"]["dzi"].as_str().unwrap().contains("MinTileLevel=\"8\""));
    assert_eq!(cmu["associated"][0]["name"], "label");
    assert_eq!(
        cmu["associated"][0]["url"],
        "https://tiles.example.org/demo/aperio/cmu-1/label.dzi"
    );
    assert_eq!(
        cmu["properties_url"],
        "https://tiles.example.org/demo/aperio/cmu-1/properties.js"
    );
    assert_eq!(
        cmu["download_url"],
        "https://files.example.org/testdata/Aperio/CMU-1.svs"
    );

    // A zip is one slide, downloaded as the archive
    let bundle = &info["groups"][2]["slides"][0];
    assert_eq!(bundle["name"], "Bundle");
    assert_eq!(
        bundle["slide"]["url"],
        "https://tiles.example.org/demo/mirax/bundle/slide.dzi"
    );
    assert_eq!(
        bundle["download_url"],
        "https://files.example.org/testdata/Mirax/Bundle.zip"
    );
    assert!(out_root.join("mirax/bundle/slide_files/0/0_0.jpeg").is_file());

    let props = read_jsonp(&out_root.join("aperio/cmu-1/properties.js"), "set_slide_properties");
    assert_eq!(props["openslide.vendor"], "aperio");
    assert_eq!(props["openslide.mpp-x"], "0.5");

    assert_eq!(
        std::fs::read_to_string(out_root.join(STAMP_NAME)).unwrap().trim(),
        stamp.as_str()
    );
    assert!(!out_root.join("empty").exists());
}

#[tokio::test]
async fn test_generate_refuses_foreign_or_complete_trees() {
    let input = input_tree();
    let out = tempfile::tempdir().unwrap();
    let pool = TilePool::default();
    let stamp = SyncStamp::new(SETTINGS, 75);

    demo::generate(input.path(), out.path(), &pool, SETTINGS, &stamp, &urls())
        .await
        .unwrap();
    assert!(matches!(
        demo::generate(input.path(), out.path(), &pool, SETTINGS, &stamp, &urls()).await,
        Err(TreeError::CompleteTree(_))
    ));

    // Interrupted tree: only the renderer that started it may resume
    std::fs::remove_file(out.path().join("info.js")).unwrap();
    let other = SyncStamp::new(SETTINGS, 90);
    assert_ne!(other.as_str(), stamp.as_str());
    assert!(matches!(
        demo::generate(input.path(), out.path(), &pool, SETTINGS, &other, &urls()).await,
        Err(TreeError::StampMismatch { .. })
    ));
    demo::generate(input.path(), out.path(), &pool, SETTINGS, &stamp, &urls())
        .await
        .unwrap();
    assert!(out.path().join("info.js").is_file());
}

// =============================================================================
// Synchronization
// =============================================================================

#[tokio::test]
async fn test_sync_generated_tree() {
    let input = input_tree();
    let out = tempfile::tempdir().unwrap();
    let stamp = SyncStamp::new(SETTINGS, 75);
    demo::generate(input.path(), out.path(), &TilePool::default(), SETTINGS, &stamp, &urls())
        .await
        .unwrap();

    let total: usize = walk_files(out.path())
        .unwrap()
        .iter()
        .map(|d| d.files.len())
        .sum();

    let store = MemoryStore::new("openslide-demo");
    store.insert("retired/slide.dzi", &b"<Image/>"[..], "application/xml");

    let report = demo::sync_tiles(out.path(), &store).await.unwrap();
    assert_eq!(report.uploaded, total);
    assert_eq!(report.deleted, 1);
    assert_eq!(store.keys().len(), total);
    assert_eq!(
        store.get("aperio/cmu-1/slide.dzi").unwrap().content_type,
        "application/xml"
    );
    assert_eq!(
        store.get("aperio/cmu-1/properties.js").unwrap().content_type,
        "application/javascript"
    );

    let again = demo::sync_tiles(out.path(), &store).await.unwrap();
    assert_eq!(again.uploaded, 0);
    assert_eq!(again.deleted, 0);
    assert_eq!(again.skipped, total);

    demo::sync_info(out.path(), &store).await.unwrap();
    assert_eq!(
        &store.get("info.js").unwrap().body[..],
        std::fs::read(out.path().join("info.js")).unwrap().as_slice()
    );
}
