//! Release upload integration tests.

use wsi_tiler::upload::{UploadAction, DOWNLOAD_BUCKET};
use wsi_tiler::{execute_upload, plan_upload, MemoryStore};

#[tokio::test]
async fn test_release_upload_is_never_overwritten() {
    let dist = tempfile::tempdir().unwrap();
    let paths: Vec<_> = [
        "openslide-4.0.0.tar.xz",
        "openslide-java-0.12.4.tar.gz",
        "openslide-winbuild-20231011.zip",
        "openslide-4.0.0.tar.xz.sig",
    ]
    .iter()
    .map(|name| {
        let path = dist.path().join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path
    })
    .collect();

    let store = MemoryStore::new(DOWNLOAD_BUCKET);
    let plan = plan_upload(&store, &paths).await.unwrap();
    let actions: Vec<_> = plan.files.iter().map(|f| f.action.clone()).collect();
    assert_eq!(
        actions,
        vec![
            UploadAction::Upload {
                key: "releases/openslide/openslide-4.0.0.tar.xz".to_string()
            },
            UploadAction::Upload {
                key: "releases/openslide-java/openslide-java-0.12.4.tar.gz".to_string()
            },
            UploadAction::Upload {
                key: "releases/openslide-winbuild/openslide-winbuild-20231011.zip".to_string()
            },
            UploadAction::Unknown,
        ]
    );
    assert_eq!(execute_upload(&store, &plan).await.unwrap(), 3);
    assert_eq!(
        store
            .get("releases/openslide/openslide-4.0.0.tar.xz")
            .unwrap()
            .content_type,
        "application/x-xz"
    );
    assert_eq!(
        store
            .get("releases/openslide-winbuild/openslide-winbuild-20231011.zip")
            .unwrap()
            .content_type,
        "application/zip"
    );

    // Second run finds everything published
    let again = plan_upload(&store, &paths).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(again.files[0].action, UploadAction::Duplicate);
    assert_eq!(execute_upload(&store, &again).await.unwrap(), 0);
    assert_eq!(store.put_count(), 3);
}
