use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::RangeReader;
use crate::error::IoError;

/// Local-file implementation of `RangeReader`.
///
/// Reads are positional (`pread`-style), so one open handle can serve every
/// tile worker concurrently without a seek lock. The blocking syscall runs on
/// tokio's blocking pool.
#[derive(Clone)]
pub struct LocalFileReader {
    file: Arc<File>,
    path: PathBuf,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open a file and record its size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let identifier = path.display().to_string();

        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(identifier.clone()),
            _ => local_error(&identifier, &e),
        })?;
        let size = file
            .metadata()
            .map_err(|e| local_error(&identifier, &e))?
            .len();

        Ok(Self {
            file: Arc::new(file),
            path,
            size,
            identifier,
        })
    }

    /// Get the path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RangeReader for LocalFileReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.check_range(offset, len)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let file = Arc::clone(&self.file);
        let identifier = self.identifier.clone();
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            read_at(&file, &mut buf, offset).map_err(|e| local_error(&identifier, &e))?;
            Ok(Bytes::from(buf))
        })
        .await
        .map_err(|e| IoError::Local {
            path: self.identifier.clone(),
            message: e.to_string(),
        })?
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

fn local_error(path: &str, err: &std::io::Error) -> IoError {
    IoError::Local {
        path: path.to_string(),
        message: err.to_string(),
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset)? {
            0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            n => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_local_reader_reads_ranges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let reader = LocalFileReader::open(file.path()).unwrap();
        assert_eq!(reader.size(), 10);
        assert_eq!(reader.path(), file.path());

        let bytes = reader.read_exact_at(2, 4).await.unwrap();
        assert_eq!(bytes.as_ref(), b"2345");

        assert!(matches!(
            reader.read_exact_at(8, 4).await,
            Err(IoError::RangeOutOfBounds { .. })
        ));
    }

    #[tokio::test]
    async fn test_local_reader_concurrent_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..=255u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = LocalFileReader::open(file.path()).unwrap();
        let mut handles = Vec::new();
        for i in 0..16u64 {
            let reader = reader.clone();
            handles.push(tokio::spawn(async move {
                reader.read_exact_at(i * 16, 16).await.unwrap()
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let bytes = handle.await.unwrap();
            assert_eq!(bytes[0], (i * 16) as u8);
        }
    }

    #[test]
    fn test_local_reader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalFileReader::open(dir.path().join("missing.svs"));
        assert!(matches!(result, Err(IoError::NotFound(_))));
    }
}
