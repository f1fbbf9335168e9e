use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading slide bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from the local filesystem
    #[error("Local I/O error on {path}: {message}")]
    Local { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised while opening or reading a slide
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not a supported whole-slide image
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// No associated image with this name
    #[error("No associated image named '{0}'")]
    NoSuchAssociatedImage(String),

    /// Level index outside the pyramid
    #[error("Invalid level {level}: slide has {level_count} levels")]
    InvalidLevel { level: usize, level_count: usize },

    /// Compressed tile or strip could not be decoded
    #[error("Failed to decode image data: {message}")]
    Decode { message: String },
}

/// Errors that can occur while rendering Deep Zoom tiles
#[derive(Debug, Error)]
pub enum TileError {
    /// Error from the underlying slide
    #[error("Slide error: {0}")]
    Slide(#[from] SlideError),

    /// Requested Deep Zoom level does not exist
    #[error("Invalid level {level}: generator has {level_count} levels")]
    InvalidLevel { level: usize, level_count: usize },

    /// Tile address is outside the level's tile grid
    #[error("Invalid address ({col}, {row}) at level {level}: grid is {cols}x{rows}")]
    InvalidAddress {
        level: usize,
        col: u32,
        row: u32,
        cols: u32,
        rows: u32,
    },

    /// Failed to encode output tile
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// Failed to write a tile or descriptor to disk
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A render task panicked or was cancelled
    #[error("Tile worker failed: {0}")]
    Worker(String),
}

/// Errors from the object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error returned by S3 or an S3-compatible service
    #[error("S3 error: {0}")]
    S3(String),

    /// Failed to read a local file for upload
    #[error("Failed to read {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while fetching test data over HTTP
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level HTTP failure
    #[error("HTTP error fetching {url}: {message}")]
    Http { url: String, message: String },

    /// Server answered with a non-success status
    #[error("HTTP status {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Fewer bytes arrived than the server announced
    #[error("Short read fetching {relpath}: got {received} of {expected} bytes")]
    ShortRead {
        relpath: String,
        expected: u64,
        received: u64,
    },

    /// Downloaded content does not match the expected SHA-256
    #[error("Hash mismatch fetching {relpath}")]
    HashMismatch { relpath: String },

    /// Local filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The slide index could not be parsed
    #[error("Invalid index {path}: {message}")]
    InvalidIndex { path: PathBuf, message: String },

    /// Malformed base URL or relative path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Validation failures in the test-data metadata
#[derive(Debug, Error)]
pub enum IndexError {
    /// Metadata and directory contents disagree
    #[error("{0}")]
    Validation(String),

    /// Failed to parse `index.yaml`
    #[error("Invalid YAML in {path}: {message}")]
    Yaml { path: PathBuf, message: String },

    /// Failed to serialize `index.json`
    #[error("Failed to serialize index: {0}")]
    Json(String),

    /// Local filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a whole tiling or publishing run
#[derive(Debug, Error)]
pub enum TreeError {
    /// Output tree already holds complete metadata
    #[error("{0} is a complete tree; please regenerate from scratch")]
    CompleteTree(PathBuf),

    /// Partial output was produced by a different renderer
    #[error("{path} was rendered with stamp {found}, current stamp is {expected}; please regenerate from scratch")]
    StampMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },

    /// Input is not a generated tile directory
    #[error("{0} is not a tile directory")]
    NotTileDirectory(PathBuf),

    /// Tiling a slide failed
    #[error(transparent)]
    Tile(#[from] TileError),

    /// Publishing to the object store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Zip archive could not be extracted
    #[error("Failed to extract {path}: {message}")]
    Extract { path: PathBuf, message: String },

    /// Metadata could not be serialized
    #[error("Failed to serialize metadata: {0}")]
    Json(String),

    /// A published URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Local filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
