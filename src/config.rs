//! Command-line configuration for wsi-tiler.
//!
//! Every subcommand has its own argument struct with a `validate()` method.
//! Options can also be set through environment variables with the
//! `WSI_TILER_` prefix:
//!
//! - `WSI_TILER_JOBS` - Concurrent tile workers (default: 4)
//! - `WSI_TILER_TILE_SIZE` - Deep Zoom tile size (default: 512)
//! - `WSI_TILER_OVERLAP` - Deep Zoom tile overlap (default: 1)
//! - `WSI_TILER_JPEG_QUALITY` - Tile JPEG quality (default: 75)
//! - `WSI_TILER_BASE_URL` - Public URL of the demo bucket
//! - `WSI_TILER_DOWNLOAD_BASE_URL` - Public URL of the original slides
//! - `WSI_TILER_S3_BUCKET` - Demo bucket for `sync` and `sync-info`
//! - `WSI_TILER_DOWNLOAD_BUCKET` - Release bucket for `upload`
//! - `WSI_TILER_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `WSI_TILER_S3_REGION` - AWS region (default: us-east-1)
//! - `WSI_TILER_TESTDATA_URL` - Public URL of the test-data corpus

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::deepzoom::{is_valid_quality, DEFAULT_JPEG_QUALITY, DEFAULT_OVERLAP, DEFAULT_TILE_SIZE};
use crate::demo::{BASE_URL, DOWNLOAD_BASE_URL, S3_BUCKET};
use crate::testdata::TESTDATA_BASE_URL;
use crate::tiler::{TileSettings, DEFAULT_JOBS};
use crate::upload::DOWNLOAD_BUCKET;

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// wsi-tiler - Deep Zoom tiles and test data for whole-slide images.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Tile a slide, or every slide below a directory, into Deep Zoom trees.
    Tile(TileConfig),

    /// Generate the demo site tile tree from a test-data checkout.
    Generate(GenerateConfig),

    /// Mirror a generated tile tree into the demo bucket.
    Sync(SyncConfig),

    /// Upload info.js, publishing a synchronized tree.
    SyncInfo(SyncConfig),

    /// Fetch the slide test-data corpus to a local directory.
    Fetch(FetchConfig),

    /// Validate a test-data checkout and write its indexes.
    Index(IndexConfig),

    /// Upload release artifacts to the download bucket.
    Upload(UploadConfig),
}

/// Options shared by every command that renders tiles.
#[derive(Args, Debug, Clone)]
pub struct RenderOptions {
    /// Number of concurrent tile workers.
    #[arg(short, long, default_value_t = DEFAULT_JOBS, env = "WSI_TILER_JOBS")]
    pub jobs: usize,

    /// Deep Zoom tile size in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_TILER_TILE_SIZE")]
    pub tile_size: u32,

    /// Pixels of overlap between adjacent tiles.
    #[arg(long, default_value_t = DEFAULT_OVERLAP, env = "WSI_TILER_OVERLAP")]
    pub overlap: u32,

    /// JPEG quality for tiles (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "WSI_TILER_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.jobs == 0 {
            return Err("jobs must be greater than 0".to_string());
        }
        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }
        if self.overlap >= self.tile_size {
            return Err("overlap must be smaller than tile_size".to_string());
        }
        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        Ok(())
    }

    pub fn tile_settings(&self) -> TileSettings {
        TileSettings {
            tile_size: self.tile_size,
            overlap: self.overlap,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_OVERLAP,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// S3 connection options.
#[derive(Args, Debug, Clone)]
pub struct S3Options {
    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "WSI_TILER_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "WSI_TILER_S3_REGION")]
    pub s3_region: String,
}

fn validate_base_url(name: &str, value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    if !value.ends_with('/') {
        return Err(format!("{name} must end with '/'"));
    }
    Ok(url)
}

fn validate_bucket(bucket: &str) -> Result<(), String> {
    if bucket.is_empty() {
        return Err("S3 bucket name is required. Set --s3-bucket or WSI_TILER_S3_BUCKET".to_string());
    }
    Ok(())
}

// =============================================================================
// Command Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// Slide file or directory of slides.
    pub input: PathBuf,

    /// Output directory.
    pub output: PathBuf,

    #[command(flatten)]
    pub render: RenderOptions,
}

impl TileConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.input.exists() {
            return Err(format!("{} does not exist", self.input.display()));
        }
        self.render.validate()
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateConfig {
    /// Test-data checkout: one directory of slides per group.
    pub input: PathBuf,

    /// Output tile tree.
    pub output: PathBuf,

    #[command(flatten)]
    pub render: RenderOptions,

    /// Public URL the tile tree will be served from.
    #[arg(long, default_value = BASE_URL, env = "WSI_TILER_BASE_URL")]
    pub base_url: String,

    /// Public URL of the original slide files.
    #[arg(long, default_value = DOWNLOAD_BASE_URL, env = "WSI_TILER_DOWNLOAD_BASE_URL")]
    pub download_base_url: String,
}

impl GenerateConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.input.is_dir() {
            return Err(format!("{} is not a directory", self.input.display()));
        }
        self.render.validate()?;
        validate_base_url("base_url", &self.base_url)?;
        validate_base_url("download_base_url", &self.download_base_url)?;
        Ok(())
    }

    /// Parsed URLs; call `validate()` first.
    pub fn urls(&self) -> Result<(Url, Url), String> {
        Ok((
            validate_base_url("base_url", &self.base_url)?,
            validate_base_url("download_base_url", &self.download_base_url)?,
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct SyncConfig {
    /// Generated tile tree.
    pub input: PathBuf,

    /// Destination bucket.
    #[arg(long, default_value = S3_BUCKET, env = "WSI_TILER_S3_BUCKET")]
    pub s3_bucket: String,

    #[command(flatten)]
    pub s3: S3Options,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_bucket(&self.s3_bucket)
    }
}

#[derive(Args, Debug, Clone)]
pub struct FetchConfig {
    /// Destination directory.
    pub path: PathBuf,

    /// Check SHA-256 digests of existing files.
    #[arg(short, long, default_value_t = false)]
    pub check_hashes: bool,

    /// Public URL of the corpus.
    #[arg(long, default_value = TESTDATA_BASE_URL, env = "WSI_TILER_TESTDATA_URL")]
    pub base_url: String,
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_base_url("base_url", &self.base_url).map(|_| ())
    }
}

#[derive(Args, Debug, Clone)]
pub struct IndexConfig {
    /// Test-data checkout.
    pub path: PathBuf,

    /// Verify the SHA-256 of every slide.
    #[arg(short, long, default_value_t = false)]
    pub check_hashes: bool,
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.is_dir() {
            return Err(format!("{} is not a directory", self.path.display()));
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct UploadConfig {
    /// Release artifacts.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Upload without asking for confirmation.
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,

    /// Destination bucket.
    #[arg(long, default_value = DOWNLOAD_BUCKET, env = "WSI_TILER_DOWNLOAD_BUCKET")]
    pub s3_bucket: String,

    #[command(flatten)]
    pub s3: S3Options,
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_bucket(&self.s3_bucket)?;
        if let Some(missing) = self.paths.iter().find(|p| !p.is_file()) {
            return Err(format!("{} is not a file", missing.display()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
