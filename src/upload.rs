//! Publishing release artifacts to the download bucket.
//!
//! Each artifact's destination directory is derived from its file name.
//! Files with an unrecognized name, or whose destination already exists,
//! are skipped: releases are never overwritten.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use tracing::info;

use crate::error::StoreError;
use crate::store::{content_type_for, ObjectStore};

/// Bucket serving release downloads.
pub const DOWNLOAD_BUCKET: &str = "download.openslide.org";

/// File name patterns and their release directories.
static RELEASE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^openslide-[0-9.]+\.tar\.(gz|xz)$", "/releases/openslide"),
        (r"^openslide-java-[0-9.]+\.tar\.(gz|xz)$", "/releases/openslide-java"),
        (r"^openslide-python-[0-9.]+\.tar\.(gz|xz)$", "/releases/openslide-python"),
        (r"^openslide-win(build|32|64)-[0-9]{8}\.zip$", "/releases/openslide-winbuild"),
    ]
    .into_iter()
    .map(|(pattern, dir)| (Regex::new(pattern).expect("release pattern is valid"), dir))
    .collect()
});

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Remote path (with leading `/`) for a release artifact, or `None` when
/// the file name matches no known release.
pub fn local_to_remote_path(path: &Path) -> Option<String> {
    let filename = base_name(path);
    RELEASE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&filename))
        .map(|(_, dir)| format!("{dir}/{filename}"))
}

/// What will happen to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    /// Name matches no release pattern
    Unknown,

    /// Destination already exists
    Duplicate,

    /// Will be uploaded to this key
    Upload { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub action: UploadAction,
}

impl fmt::Display for PlannedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match &self.action {
            UploadAction::Unknown => "[unknown; skipped]".to_string(),
            UploadAction::Duplicate => "[duplicate; skipped]".to_string(),
            UploadAction::Upload { key } => {
                let dir = key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                format!("/{dir}")
            }
        };
        write!(f, "{:<35} -> {}", base_name(&self.path), result)
    }
}

/// Decisions for a batch of files, in argument order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    pub files: Vec<PlannedFile>,
}

impl UploadPlan {
    /// Files that will actually be uploaded, with their keys.
    pub fn scheduled(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().filter_map(|file| match &file.action {
            UploadAction::Upload { key } => Some((file.path.as_path(), key.as_str())),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled().next().is_none()
    }
}

/// Decide where each file goes, checking the bucket for duplicates.
pub async fn plan_upload<S: ObjectStore + ?Sized>(
    store: &S,
    paths: &[PathBuf],
) -> Result<UploadPlan, StoreError> {
    let mut plan = UploadPlan::default();
    for path in paths {
        let action = match local_to_remote_path(path) {
            None => UploadAction::Unknown,
            Some(remote) => {
                let key = remote.trim_start_matches('/').to_string();
                if store.exists(&key).await? {
                    UploadAction::Duplicate
                } else {
                    UploadAction::Upload { key }
                }
            }
        };
        plan.files.push(PlannedFile {
            path: path.clone(),
            action,
        });
    }
    Ok(plan)
}

/// Upload every scheduled file, world-readable, with a content type from
/// its extension. Returns the number uploaded.
pub async fn execute_upload<S: ObjectStore + ?Sized>(
    store: &S,
    plan: &UploadPlan,
) -> Result<usize, StoreError> {
    let mut count = 0;
    for (path, key) in plan.scheduled() {
        let content_type = content_type_for(path);
        println!("{:<35} {}", base_name(path), content_type);
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::Local {
                path: path.to_path_buf(),
                source,
            })?;
        store.put(key, Bytes::from(body), content_type).await?;
        count += 1;
    }
    info!(uploaded = count, "Uploaded to {}", store.bucket());
    Ok(count)
}
