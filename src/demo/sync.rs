use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::info;

use super::METADATA_NAME;
use crate::error::TreeError;
use crate::store::{content_type_for, md5_hex, ObjectStore};
use crate::tiler::{join_rel, sorted_entries};

/// What a sync run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// Files of one directory, keyed by path relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirFiles {
    /// Directory relative to the root, empty for the root itself
    pub relpath: String,
    pub files: Vec<(PathBuf, String)>,
}

/// Group the files of a tree by directory.
///
/// Directories come before their parent, and everything is in name order,
/// so the root's own files (including `info.js`) come last.
pub fn walk_files(root: &Path) -> Result<Vec<DirFiles>, TreeError> {
    let mut out = Vec::new();
    walk_files_into(root, String::new(), &mut out)?;
    Ok(out)
}

fn walk_files_into(root: &Path, relpath: String, out: &mut Vec<DirFiles>) -> Result<(), TreeError> {
    let mut files = Vec::new();
    for path in sorted_entries(&root.join(&relpath))? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cur_relpath = join_rel(&relpath, &name);
        if path.is_dir() {
            walk_files_into(root, cur_relpath, out)?;
        } else {
            files.push((path, cur_relpath));
        }
    }
    out.push(DirFiles { relpath, files });
    Ok(())
}

async fn read_file(path: &Path) -> Result<Bytes, TreeError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| TreeError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Mirror a generated tree into the bucket.
///
/// Remote keys with no local file are deleted; local files are uploaded
/// unless the remote ETag already equals their MD5. Running twice against
/// an unchanged tree transfers nothing the second time.
pub async fn sync_tiles<S: ObjectStore + ?Sized>(
    in_root: &Path,
    store: &S,
) -> Result<SyncReport, TreeError> {
    if !in_root.join(METADATA_NAME).exists() {
        return Err(TreeError::NotTileDirectory(in_root.to_path_buf()));
    }
    let mut report = SyncReport::default();

    info!("Enumerating bucket {}...", store.bucket());
    let index = store.list().await?;

    info!("Pruning bucket {}...", store.bucket());
    for key in index.keys() {
        if !in_root.join(key).exists() {
            store.delete(key).await?;
            report.deleted += 1;
        }
    }

    for dir in walk_files(in_root)? {
        let total = dir.files.len();
        let label = if dir.relpath.is_empty() {
            "root"
        } else {
            dir.relpath.as_str()
        };
        for (count, (path, relpath)) in dir.files.iter().enumerate() {
            let data = read_file(path).await?;
            if index.get(relpath).map(String::as_str) != Some(md5_hex(&data).as_str()) {
                store.put(relpath, data, content_type_for(path)).await?;
                report.uploaded += 1;
            } else {
                report.skipped += 1;
            }
            eprint!("Synchronizing {label}: {}/{total} files\r", count + 1);
        }
        if total > 0 {
            eprintln!();
        }
    }

    info!(
        uploaded = report.uploaded,
        skipped = report.skipped,
        deleted = report.deleted,
        "Synchronized bucket {}",
        store.bucket()
    );
    Ok(report)
}

/// Upload `info.js`, making a synced tree visible.
pub async fn sync_info<S: ObjectStore + ?Sized>(in_root: &Path, store: &S) -> Result<(), TreeError> {
    let path = in_root.join(METADATA_NAME);
    let data = read_file(&path).await?;
    store
        .put(METADATA_NAME, data, content_type_for(&path))
        .await?;
    Ok(())
}
