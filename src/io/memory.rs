use async_trait::async_trait;
use bytes::Bytes;

use super::RangeReader;
use crate::error::IoError;

/// In-memory implementation of `RangeReader`.
///
/// Used for slide data that is already resident (decoded archive members,
/// synthetic fixtures in tests).
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
}

impl MemoryReader {
    /// Wrap a buffer under the given identifier.
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.check_range(offset, len)?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_reader_slices() {
        let reader = MemoryReader::new(vec![1u8, 2, 3, 4, 5], "mem://test");
        assert_eq!(reader.size(), 5);
        assert_eq!(reader.identifier(), "mem://test");

        let bytes = reader.read_exact_at(1, 3).await.unwrap();
        assert_eq!(bytes.as_ref(), &[2, 3, 4]);

        let empty = reader.read_exact_at(5, 0).await.unwrap();
        assert!(empty.is_empty());

        assert!(matches!(
            reader.read_exact_at(3, 4).await,
            Err(IoError::RangeOutOfBounds { .. })
        ));
    }
}
