use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use super::{sha256_file, SlideRecord};
use crate::error::FetchError;

/// Consolidated metadata published at the corpus root.
pub const INDEX_NAME: &str = "index.json";

/// Generated files that are not slides.
const IGNORE_FILENAMES: [&str; 3] = ["index.html", "index.json", "index.yaml"];

/// Outcome of mirroring the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Slides downloaded
    pub fetched: usize,

    /// Slides already present locally
    pub skipped: usize,

    /// Local files the index does not know about
    pub unexpected: Vec<PathBuf>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError + '_ {
    move |source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn http_err(url: &Url) -> impl FnOnce(reqwest::Error) -> FetchError + '_ {
    move |e| FetchError::Http {
        url: url.to_string(),
        message: e.to_string(),
    }
}

/// Parse an HTTP `Last-Modified` value.
fn parse_http_date(value: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(SystemTime::from)
}

/// Stream a response body into `path`, verifying length and hash.
async fn write_body(
    response: &mut reqwest::Response,
    url: &Url,
    path: &Path,
    relpath: &str,
    expected_sha256: Option<&str>,
) -> Result<tokio::fs::File, FetchError> {
    let expected_len = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    let mut file = tokio::fs::File::create(path).await.map_err(io_err(path))?;
    let mut sha = Sha256::new();
    let mut count = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(http_err(url))? {
        file.write_all(&chunk).await.map_err(io_err(path))?;
        if expected_sha256.is_some() {
            sha.update(&chunk);
        }
        count += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err(path))?;

    if let Some(expected) = expected_len {
        if count != expected {
            return Err(FetchError::ShortRead {
                relpath: relpath.to_string(),
                expected,
                received: count,
            });
        }
    }
    if let Some(expected) = expected_sha256 {
        if hex::encode(sha.finalize()) != expected {
            return Err(FetchError::HashMismatch {
                relpath: relpath.to_string(),
            });
        }
    }
    Ok(file)
}

/// Download `relpath` below `base_url` to the same path below `base_path`.
///
/// The file is removed again if the transfer is short or its SHA-256 does
/// not match `expected_sha256`. Its mtime follows the server's
/// `Last-Modified` header when one is sent.
pub async fn fetch_file(
    client: &reqwest::Client,
    base_url: &Url,
    base_path: &Path,
    relpath: &str,
    expected_sha256: Option<&str>,
) -> Result<PathBuf, FetchError> {
    let path = base_path.join(relpath);
    let url = base_url
        .join(relpath)
        .map_err(|e| FetchError::InvalidUrl(format!("{base_url} + {relpath}: {e}")))?;

    let mut response = client.get(url.clone()).send().await.map_err(http_err(&url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(io_err(parent))?;
    }
    let file = match write_body(&mut response, &url, &path, relpath, expected_sha256).await {
        Ok(file) => file,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), error = %rm, "Could not remove partial download");
            }
            return Err(e);
        }
    };

    let modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);
    if let Some(modified) = modified {
        file.into_std()
            .await
            .set_modified(modified)
            .map_err(io_err(&path))?;
    }

    debug!(url = %url, path = %path.display(), "Fetched");
    Ok(path)
}

/// Bring one slide up to date.
///
/// A local file of the right size is trusted, unless `check_hashes` asks
/// for its SHA-256 to be compared as well. Returns whether the slide was
/// downloaded.
pub async fn fetch_slide(
    client: &reqwest::Client,
    base_url: &Url,
    base_path: &Path,
    relpath: &str,
    info: &SlideRecord,
    check_hashes: bool,
) -> Result<bool, FetchError> {
    let path = base_path.join(relpath);
    let same_size = tokio::fs::metadata(&path)
        .await
        .map(|m| m.len() == info.size)
        .unwrap_or(false);
    if same_size {
        if !check_hashes {
            return Ok(false);
        }
        let hash_path = path.clone();
        let digest = tokio::task::spawn_blocking(move || sha256_file(&hash_path))
            .await
            .map_err(|e| FetchError::Io {
                path: path.clone(),
                source: std::io::Error::other(e),
            })?;
        // Unreadable local copies are fetched again
        if digest.ok().as_deref() == Some(info.sha256.as_str()) {
            return Ok(false);
        }
    }

    info!("Fetching {relpath}...");
    fetch_file(client, base_url, base_path, relpath, Some(info.sha256.as_str())).await?;
    Ok(true)
}

/// Slash-separated path of `path` below `base`.
fn posix_relpath(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Parent directory of a slide's relpath, empty at the root.
fn parent_relpath(relpath: &str) -> &str {
    relpath.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Mirror the published corpus into `base_path`.
///
/// Fetches `index.json`, every slide in name order, then each slide
/// directory's `index.yaml`. Local files the index does not name are
/// reported, never deleted.
pub async fn fetch_repo(
    base_path: &Path,
    base_url: &Url,
    check_hashes: bool,
) -> Result<FetchReport, FetchError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(http_err(base_url))?;

    let index_path = fetch_file(&client, base_url, base_path, INDEX_NAME, None).await?;
    let json = tokio::fs::read(&index_path)
        .await
        .map_err(io_err(&index_path))?;
    let slides: BTreeMap<String, SlideRecord> =
        serde_json::from_slice(&json).map_err(|e| FetchError::InvalidIndex {
            path: index_path.clone(),
            message: e.to_string(),
        })?;

    let mut report = FetchReport::default();
    let mut dirs = BTreeSet::new();
    for (relpath, info) in &slides {
        if fetch_slide(&client, base_url, base_path, relpath, info, check_hashes).await? {
            report.fetched += 1;
        } else {
            report.skipped += 1;
        }
        dirs.insert(parent_relpath(relpath));
    }

    for dir in dirs {
        let relpath = if dir.is_empty() {
            "index.yaml".to_string()
        } else {
            format!("{dir}/index.yaml")
        };
        fetch_file(&client, base_url, base_path, &relpath, None).await?;
    }

    for entry in WalkDir::new(base_path).sort_by_file_name() {
        let entry = entry.map_err(|e| FetchError::Io {
            path: base_path.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if IGNORE_FILENAMES.contains(&&*name) {
            continue;
        }
        let known = posix_relpath(base_path, entry.path())
            .map(|rel| slides.contains_key(&rel))
            .unwrap_or(false);
        if !known {
            warn!("Unexpected file: {}", entry.path().display());
            report.unexpected.push(entry.path().to_path_buf());
        }
    }

    info!(
        fetched = report.fetched,
        skipped = report.skipped,
        unexpected = report.unexpected.len(),
        "Fetched {}",
        base_url
    );
    Ok(report)
}
