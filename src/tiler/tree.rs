//! Tiling whole slides and directory trees of slides.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::pool::{tile_image, TilePool};
use super::slug::image_base_name;
use crate::deepzoom::DeepZoomGenerator;
use crate::error::{TileError, TreeError};
use crate::io::LocalFileReader;
use crate::slide::{ImageSlide, RegionSource, Slide};

/// Deep Zoom settings shared by every image in a run.
#[derive(Debug, Clone, Copy)]
pub struct TileSettings {
    pub tile_size: u32,
    pub overlap: u32,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            tile_size: crate::deepzoom::DEFAULT_TILE_SIZE,
            overlap: crate::deepzoom::DEFAULT_OVERLAP,
        }
    }
}

/// One tiled image of a slide.
#[derive(Debug, Clone)]
pub struct TiledImage {
    /// Associated image name, `None` for the slide itself
    pub associated: Option<String>,

    /// Output path relative to the output root, without extension
    pub relpath: String,

    /// DZI descriptor
    pub dzi: String,
}

/// Result of tiling a slide.
#[derive(Debug, Clone)]
pub struct TiledSlide {
    pub properties: BTreeMap<String, String>,

    /// The slide itself first, then associated images sorted by name
    pub images: Vec<TiledImage>,
}

/// Join a relative output path with one more component.
pub(crate) fn join_rel(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Tile a slide and its associated images under `out_root/out_base/`.
pub async fn tile_slide(
    pool: &TilePool,
    settings: TileSettings,
    slide_path: &Path,
    out_root: &Path,
    out_base: &str,
) -> Result<TiledSlide, TileError> {
    let slide = Arc::new(Slide::<LocalFileReader>::open_path(slide_path).await?);
    let mut images = Vec::new();

    let relpath = join_rel(out_base, &image_base_name(None));
    let dzi = tile_source(pool, settings, slide.clone(), out_root, &relpath).await?;
    images.push(TiledImage {
        associated: None,
        relpath,
        dzi,
    });

    for name in slide.associated_image_names() {
        let image = slide.read_associated_image(name).await?;
        let relpath = join_rel(out_base, &image_base_name(Some(name)));
        let source = Arc::new(ImageSlide::new(image));
        let dzi = tile_source(pool, settings, source, out_root, &relpath).await?;
        images.push(TiledImage {
            associated: Some(name.to_string()),
            relpath,
            dzi,
        });
    }

    Ok(TiledSlide {
        properties: slide.properties().clone(),
        images,
    })
}

async fn tile_source<S: RegionSource + 'static>(
    pool: &TilePool,
    settings: TileSettings,
    source: Arc<S>,
    out_root: &Path,
    relpath: &str,
) -> Result<String, TileError> {
    let dz = Arc::new(DeepZoomGenerator::new(
        source,
        settings.tile_size,
        settings.overlap,
    ));
    tile_image(pool, dz, out_root, relpath).await
}

/// Entries of a directory sorted by file name.
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, TreeError> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            entry.map(|e| e.into_path()).map_err(|e| TreeError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })
        })
        .collect()
}

/// Extract a zip archive into a fresh directory under `tempdir`.
pub(crate) async fn extract_zip(archive: &Path, tempdir: &Path) -> Result<PathBuf, TreeError> {
    let target = tempfile::tempdir_in(tempdir)
        .map_err(|source| TreeError::Io {
            path: tempdir.to_path_buf(),
            source,
        })?
        .keep();

    let archive = archive.to_path_buf();
    let dest = target.clone();
    tokio::task::spawn_blocking(move || {
        let extract_err = |message: String| TreeError::Extract {
            path: archive.clone(),
            message,
        };
        let file = std::fs::File::open(&archive).map_err(|e| extract_err(e.to_string()))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| extract_err(e.to_string()))?;
        zip.extract(&dest).map_err(|e| extract_err(e.to_string()))
    })
    .await
    .map_err(|e| TreeError::Extract {
        path: target.clone(),
        message: e.to_string(),
    })??;
    Ok(target)
}

pub(crate) fn is_zip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "zip")
}

/// Lowercased file name without its last extension.
pub(crate) fn lower_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name)
}

/// Context shared by a whole tree walk.
struct Walk<'a> {
    pool: &'a TilePool,
    settings: TileSettings,
    tempdir: &'a Path,
    out_root: &'a Path,
}

/// Tile every slide below `in_base`.
///
/// Each entry nests a directory named after its lowercased stem, unless
/// `suppress_descent` is set (used inside extracted zip archives so their
/// internal layout does not leak into the output). Directories recurse,
/// readable slides are tiled, zip archives are extracted and walked, and
/// anything else is skipped.
fn walk_dir<'a>(
    walk: &'a Walk<'a>,
    in_base: PathBuf,
    out_base: String,
    suppress_descent: bool,
) -> Pin<Box<dyn Future<Output = Result<(), TreeError>> + Send + 'a>> {
    Box::pin(async move {
        for in_path in sorted_entries(&in_base)? {
            let out_path = if suppress_descent {
                out_base.clone()
            } else {
                join_rel(&out_base, &lower_stem(&in_path))
            };

            if in_path.is_dir() {
                walk_dir(walk, in_path, out_path, suppress_descent).await?;
            } else if Slide::<LocalFileReader>::can_open(&in_path).await {
                tile_slide(walk.pool, walk.settings, &in_path, walk.out_root, &out_path).await?;
            } else if is_zip(&in_path) {
                info!("Extracting {out_path}...");
                let temp_path = extract_zip(&in_path, walk.tempdir).await?;
                walk_dir(walk, temp_path, out_path, true).await?;
            } else {
                debug!(path = %in_path.display(), "Skipping unreadable file");
            }
        }
        Ok(())
    })
}

/// Scratch directory for extracted archives, removed on drop.
pub(crate) fn scratch_dir() -> Result<TempDir, TreeError> {
    tempfile::Builder::new()
        .prefix("tiler-")
        .tempdir()
        .map_err(|source| TreeError::Io {
            path: std::env::temp_dir(),
            source,
        })
}

/// Tile every slide in a directory tree.
pub async fn tile_tree(
    in_base: &Path,
    out_base: &Path,
    pool: &TilePool,
    settings: TileSettings,
) -> Result<(), TreeError> {
    let tempdir = scratch_dir()?;
    let walk = Walk {
        pool,
        settings,
        tempdir: tempdir.path(),
        out_root: out_base,
    };
    walk_dir(&walk, in_base.to_path_buf(), String::new(), false).await
}
