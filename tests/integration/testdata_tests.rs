//! Test-data corpus integration tests.
//!
//! Tests verify:
//! - Indexing a checkout and serving it over HTTP
//! - Mirroring the served corpus into an empty directory
//! - No transfers against an up-to-date mirror
//! - Corrupt downloads are removed and reported

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use sha2::{Digest, Sha256};
use url::Url;

use wsi_tiler::testdata::{fetch_repo, process_repo, INDEX_NAME};
use wsi_tiler::FetchError;

use super::test_utils::SlideBuilder;

async fn serve_file(State(root): State<Arc<PathBuf>>, UrlPath(path): UrlPath<String>) -> Response {
    match tokio::fs::read(root.join(&path)).await {
        Ok(body) => body.into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve a directory over HTTP and return its URL.
async fn serve_dir(root: PathBuf) -> Url {
    let app = Router::new()
        .route("/{*path}", get(serve_file))
        .with_state(Arc::new(root));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn sha(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A published corpus with two vendor directories, indexed.
fn published_corpus() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let svs = SlideBuilder::new(300, 200)
        .aperio("Aperio Image Library v10.0.50\r\n300x200 (256x256) JPEG/RGB Q=70")
        .build();
    let tiff = SlideBuilder::new(200, 100).build();

    std::fs::create_dir(dir.path().join("Aperio")).unwrap();
    std::fs::write(dir.path().join("Aperio/CMU-1.svs"), &svs).unwrap();
    std::fs::write(
        dir.path().join("Aperio/index.yaml"),
        format!(
            "format: Aperio\nslides:\n  CMU-1.svs:\n    description: Brightfield\n    \
             license: CC0-1.0\n    credit: Carnegie Mellon University\n    sha256: {}\n",
            sha(&svs)
        ),
    )
    .unwrap();

    std::fs::create_dir(dir.path().join("Generic-TIFF")).unwrap();
    std::fs::write(dir.path().join("Generic-TIFF/small.tiff"), &tiff).unwrap();
    std::fs::write(
        dir.path().join("Generic-TIFF/index.yaml"),
        format!(
            "format: Generic TIFF\nslides:\n  small.tiff:\n    description: Tiny\n    \
             license: distributable\n    sha256: {}\n",
            sha(&tiff)
        ),
    )
    .unwrap();

    process_repo(dir.path(), true).unwrap();
    dir
}

#[tokio::test]
async fn test_index_then_fetch_mirror() {
    let corpus = published_corpus();
    assert!(corpus.path().join(INDEX_NAME).is_file());
    assert!(corpus.path().join("index.html").is_file());
    assert!(corpus.path().join("Aperio/index.html").is_file());
    let base_url = serve_dir(corpus.path().to_path_buf()).await;

    let mirror = tempfile::tempdir().unwrap();
    let report = fetch_repo(mirror.path(), &base_url, false).await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.unexpected.is_empty());

    for relpath in ["Aperio/CMU-1.svs", "Aperio/index.yaml", "Generic-TIFF/small.tiff", INDEX_NAME] {
        assert_eq!(
            std::fs::read(mirror.path().join(relpath)).unwrap(),
            std::fs::read(corpus.path().join(relpath)).unwrap(),
            "{relpath}"
        );
    }

    // Up to date: nothing transferred, even when verifying hashes
    let again = fetch_repo(mirror.path(), &base_url, true).await.unwrap();
    assert_eq!(again.fetched, 0);
    assert_eq!(again.skipped, 2);

    // A mirror that is re-indexed locally still matches
    let slides = process_repo(mirror.path(), true).unwrap();
    assert_eq!(slides.len(), 2);
    assert_eq!(slides["Aperio/CMU-1.svs"].format, "Aperio");
}

#[tokio::test]
async fn test_corrupt_slide_is_removed() {
    let corpus = published_corpus();
    // Published bytes no longer match the index
    std::fs::write(corpus.path().join("Generic-TIFF/small.tiff"), b"corrupt").unwrap();
    let base_url = serve_dir(corpus.path().to_path_buf()).await;

    let mirror = tempfile::tempdir().unwrap();
    let err = fetch_repo(mirror.path(), &base_url, false).await.unwrap_err();
    assert!(matches!(err, FetchError::HashMismatch { ref relpath } if relpath == "Generic-TIFF/small.tiff"));
    assert!(!mirror.path().join("Generic-TIFF/small.tiff").exists());
    // Slides before the failure were kept
    assert!(mirror.path().join("Aperio/CMU-1.svs").is_file());
}

#[tokio::test]
async fn test_unexpected_local_files_are_reported() {
    let corpus = published_corpus();
    let base_url = serve_dir(corpus.path().to_path_buf()).await;

    let mirror = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(mirror.path().join("Retired")).unwrap();
    std::fs::write(mirror.path().join("Retired/old.svs"), b"old").unwrap();

    let report = fetch_repo(mirror.path(), &base_url, false).await.unwrap();
    assert_eq!(report.unexpected, vec![mirror.path().join("Retired/old.svs")]);
    assert!(mirror.path().join("Retired/old.svs").exists());
}
