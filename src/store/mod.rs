//! Object storage for published files.
//!
//! Tile trees and release artifacts are published to S3 buckets as
//! world-readable objects. [`ObjectStore`] is the seam between the
//! publishing logic and the bucket: [`S3Store`] talks to S3 (or any
//! S3-compatible service) and [`MemoryStore`] keeps objects in memory.

mod memory;
mod s3;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use md5::{Digest, Md5};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use s3::{create_s3_client, S3Store};

/// A bucket of objects keyed by `/`-separated relative paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key in the bucket with its ETag, quotes stripped.
    ///
    /// For objects uploaded in one piece the ETag is the hex MD5 of the
    /// content.
    async fn list(&self) -> Result<BTreeMap<String, String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Upload an object readable by anyone.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Bucket name, for messages.
    fn bucket(&self) -> &str;
}

/// Hex MD5 of `data`, comparable with an S3 ETag.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Content type for an uploaded file, by extension.
///
/// Only the last extension counts, so `.tar.gz` is `application/gzip`
/// rather than a tarball.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "dzi" | "xml" => "application/xml",
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "js" => "application/javascript",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "yaml" | "yml" => "application/yaml",
        "gz" => "application/gzip",
        "xz" => "application/x-xz",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
