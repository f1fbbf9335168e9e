//! Bounded concurrent tile rendering.
//!
//! Tiles are independent: each job renders one Deep Zoom tile and writes it
//! to its own file, so jobs run in any order. At most `jobs` tiles are in
//! flight at once. Tiles whose file already exists are skipped, which lets
//! an interrupted run resume where it stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::deepzoom::{DeepZoomGenerator, JpegTileEncoder, MIN_TILE_LEVEL};
use crate::error::TileError;
use crate::slide::RegionSource;

/// Default number of concurrent tile jobs.
pub const DEFAULT_JOBS: usize = 4;

/// Tile file format, used for file extensions and the DZI `Format`.
pub const FORMAT: &str = "jpeg";

/// Progress is reported every this many tiles.
const PROGRESS_INTERVAL: u64 = 100;

/// One tile to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileJob {
    pub level: usize,
    pub address: (u32, u32),
    pub path: PathBuf,
}

/// Iterator over every tile of an image, level by level, row-major.
///
/// Entering a level creates its `{out_base}_files/{level}/` directory.
pub struct TileJobs {
    tiles_dir: PathBuf,
    level_tiles: Vec<(u32, u32)>,
    level: usize,
    col: u32,
    row: u32,
    dir_ready: bool,
}

impl Iterator for TileJobs {
    type Item = Result<TileJob, TileError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &(cols, rows) = self.level_tiles.get(self.level)?;
            if self.row >= rows || cols == 0 {
                self.level += 1;
                self.row = 0;
                self.col = 0;
                self.dir_ready = false;
                continue;
            }

            let dir = self.tiles_dir.join(self.level.to_string());
            if !self.dir_ready {
                if let Err(source) = std::fs::create_dir_all(&dir) {
                    // Stop after reporting
                    self.level = self.level_tiles.len();
                    return Some(Err(TileError::Write { path: dir, source }));
                }
                self.dir_ready = true;
            }

            let job = TileJob {
                level: self.level,
                address: (self.col, self.row),
                path: dir.join(format!("{}_{}.{FORMAT}", self.col, self.row)),
            };
            self.col += 1;
            if self.col >= cols {
                self.col = 0;
                self.row += 1;
            }
            return Some(Ok(job));
        }
    }
}

/// Enumerate the tiles of an image rooted at `out_root/out_base`.
pub fn enumerate_tiles<S: RegionSource>(
    dz: &DeepZoomGenerator<S>,
    out_root: &Path,
    out_base: &str,
) -> TileJobs {
    TileJobs {
        tiles_dir: out_root.join(format!("{out_base}_files")),
        level_tiles: dz.level_tiles().to_vec(),
        level: 0,
        col: 0,
        row: 0,
        dir_ready: false,
    }
}

/// Renders tiles with a bounded number of concurrent jobs.
#[derive(Debug, Clone, Copy)]
pub struct TilePool {
    jobs: usize,
    encoder: JpegTileEncoder,
}

impl TilePool {
    pub fn new(jobs: usize, encoder: JpegTileEncoder) -> Self {
        Self {
            jobs: jobs.max(1),
            encoder,
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Render and write every tile of an image.
    ///
    /// The first failure stops scheduling, cancels in-flight jobs and is
    /// returned. Returns the number of tiles processed.
    pub async fn render<S: RegionSource + 'static>(
        &self,
        dz: Arc<DeepZoomGenerator<S>>,
        out_root: &Path,
        out_base: &str,
    ) -> Result<u64, TileError> {
        let total = dz.tile_count();
        let mut count = 0u64;
        let mut tasks = JoinSet::new();

        let progress = |count: u64| {
            eprint!("Tiling {out_base}: wrote {count}/{total} tiles\r");
        };
        progress(count);

        let mut finish_one = |result: Option<Result<Result<(), TileError>, tokio::task::JoinError>>| {
            match result {
                Some(Ok(Ok(()))) => {
                    count += 1;
                    if count % PROGRESS_INTERVAL == 0 {
                        progress(count);
                    }
                    Ok(())
                }
                Some(Ok(Err(e))) => Err(e),
                Some(Err(e)) => Err(TileError::Worker(e.to_string())),
                None => Ok(()),
            }
        };

        for job in enumerate_tiles(&dz, out_root, out_base) {
            let job = job?;
            if tasks.len() >= self.jobs {
                finish_one(tasks.join_next().await)?;
            }
            tasks.spawn(process_tile(dz.clone(), self.encoder, job));
        }
        while let Some(result) = tasks.join_next().await {
            finish_one(Some(result))?;
        }

        progress(count);
        eprintln!();
        debug!(image = out_base, tiles = count, "Finished tiling image");
        Ok(count)
    }
}

impl Default for TilePool {
    fn default() -> Self {
        Self::new(DEFAULT_JOBS, JpegTileEncoder::default())
    }
}

/// Render and save one tile unless it already exists.
async fn process_tile<S: RegionSource + 'static>(
    dz: Arc<DeepZoomGenerator<S>>,
    encoder: JpegTileEncoder,
    job: TileJob,
) -> Result<(), TileError> {
    if tokio::fs::try_exists(&job.path).await.unwrap_or(false) {
        return Ok(());
    }

    let tile = dz.get_tile(job.level, job.address).await?;
    let data = tokio::task::spawn_blocking(move || encoder.encode(&tile))
        .await
        .map_err(|e| TileError::Worker(e.to_string()))??;
    tokio::fs::write(&job.path, &data)
        .await
        .map_err(|source| TileError::Write {
            path: job.path.clone(),
            source,
        })
}

/// Write all tiles of an image, then its DZI descriptor at
/// `out_root/{out_base}.dzi`. Returns the DZI XML.
///
/// The DZI carries `MinTileLevel` so viewers skip the smallest levels.
pub async fn tile_image<S: RegionSource + 'static>(
    pool: &TilePool,
    dz: Arc<DeepZoomGenerator<S>>,
    out_root: &Path,
    out_base: &str,
) -> Result<String, TileError> {
    pool.render(dz.clone(), out_root, out_base).await?;

    let dzi = dz
        .descriptor(FORMAT)
        .with_min_tile_level(MIN_TILE_LEVEL)
        .to_xml();
    let path = out_root.join(format!("{out_base}.dzi"));
    tokio::fs::write(&path, dzi.as_bytes())
        .await
        .map_err(|source| TileError::Write { path, source })?;
    Ok(dzi)
}
