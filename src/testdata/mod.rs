//! Maintenance of the public slide test-data corpus.
//!
//! The corpus is a two-level tree: one directory per vendor format, each
//! holding slides plus a hand-written `index.yaml`. [`process_repo`]
//! validates the tree and writes `index.json` and HTML listings;
//! [`fetch_repo`] mirrors a published corpus into a local directory.

mod fetch;
mod html;
mod index;

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use fetch::{fetch_file, fetch_repo, fetch_slide, FetchReport, INDEX_NAME};
pub use html::{file_size_units, html_escape, Extra, IndexPage};
pub use index::{process_dir, process_repo, REPO_TITLE};

/// Where the corpus is published.
pub const TESTDATA_BASE_URL: &str = "https://openslide.cs.cmu.edu/download/openslide-testdata/";

const BUFSIZE: usize = 10 << 20;

/// Metadata of one slide, as stored in `index.json`.
///
/// Fields are declared in key order so the serialized index is sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    pub description: String,
    pub format: String,
    pub license: String,
    pub sha256: String,
    pub size: u64,
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUFSIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_record_omits_missing_credit() {
        let record = SlideRecord {
            credit: None,
            description: "d".to_string(),
            format: "Aperio".to_string(),
            license: "CC0-1.0".to_string(),
            sha256: "ab".to_string(),
            size: 3,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"description":"d","format":"Aperio","license":"CC0-1.0","sha256":"ab","size":3}"#
        );
        let parsed: SlideRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
