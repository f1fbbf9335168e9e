use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbImage;

use super::dzi::DziDescriptor;
use crate::error::TileError;
use crate::slide::RegionSource;

/// Default Deep Zoom tile edge, excluding overlap.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default pixels of overlap added on each interior tile edge.
pub const DEFAULT_OVERLAP: u32 = 1;

/// Where a Deep Zoom tile comes from in the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileInfo {
    /// Top-left corner in level-0 pixels
    pub l0_location: (u64, u64),

    /// Source level to read
    pub slide_level: usize,

    /// Region size at the source level
    pub l_size: (u32, u32),

    /// Final tile size including overlap
    pub z_size: (u32, u32),
}

/// Deep Zoom view of a [`RegionSource`].
///
/// Deep Zoom levels halve the full-resolution size (rounding up) down to
/// 1x1, so level 0 is a single pixel and the last level is the full image.
/// Each Deep Zoom level reads from the coarsest source level that is still
/// at least as detailed, then resamples.
#[derive(Debug)]
pub struct DeepZoomGenerator<S> {
    source: Arc<S>,
    tile_size: u32,
    overlap: u32,

    /// Pixel size per Deep Zoom level
    z_dimensions: Vec<(u32, u32)>,

    /// Tile grid per Deep Zoom level
    t_dimensions: Vec<(u32, u32)>,

    /// Source level per Deep Zoom level
    slide_from_dz_level: Vec<usize>,

    /// Source-level pixels per Deep Zoom pixel, per Deep Zoom level
    l_z_downsamples: Vec<f64>,
}

impl<S: RegionSource> DeepZoomGenerator<S> {
    pub fn new(source: Arc<S>, tile_size: u32, overlap: u32) -> Self {
        let tile_size = tile_size.max(1);

        let mut z_size = source.dimensions();
        let mut z_dimensions = vec![z_size];
        while z_size.0 > 1 || z_size.1 > 1 {
            z_size = (z_size.0.div_ceil(2).max(1), z_size.1.div_ceil(2).max(1));
            z_dimensions.push(z_size);
        }
        z_dimensions.reverse();

        let t_dimensions = z_dimensions
            .iter()
            .map(|&(w, h)| (w.div_ceil(tile_size), h.div_ceil(tile_size)))
            .collect();

        let dz_levels = z_dimensions.len();
        let mut slide_from_dz_level = Vec::with_capacity(dz_levels);
        let mut l_z_downsamples = Vec::with_capacity(dz_levels);
        for dz_level in 0..dz_levels {
            let l0_z_downsample = 2f64.powi((dz_levels - dz_level - 1) as i32);
            let slide_level = source.best_level_for_downsample(l0_z_downsample);
            let l0_l_downsample = source.level_downsample(slide_level).unwrap_or(1.0);
            slide_from_dz_level.push(slide_level);
            l_z_downsamples.push(l0_z_downsample / l0_l_downsample);
        }

        Self {
            source,
            tile_size,
            overlap,
            z_dimensions,
            t_dimensions,
            slide_from_dz_level,
            l_z_downsamples,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    pub fn level_count(&self) -> usize {
        self.z_dimensions.len()
    }

    /// Tile grid `(cols, rows)` for each level.
    pub fn level_tiles(&self) -> &[(u32, u32)] {
        &self.t_dimensions
    }

    /// Pixel size for each level.
    pub fn level_dimensions(&self) -> &[(u32, u32)] {
        &self.z_dimensions
    }

    /// Total tiles across all levels.
    pub fn tile_count(&self) -> u64 {
        self.t_dimensions
            .iter()
            .map(|&(c, r)| c as u64 * r as u64)
            .sum()
    }

    /// Locate a tile in the source image.
    pub fn tile_info(&self, level: usize, address: (u32, u32)) -> Result<TileInfo, TileError> {
        let level_count = self.level_count();
        if level >= level_count {
            return Err(TileError::InvalidLevel { level, level_count });
        }
        let (cols, rows) = self.t_dimensions[level];
        let (col, row) = address;
        if col >= cols || row >= rows {
            return Err(TileError::InvalidAddress {
                level,
                col,
                row,
                cols,
                rows,
            });
        }

        let slide_level = self.slide_from_dz_level[level];
        let l_z_downsample = self.l_z_downsamples[level];
        let l0_l_downsample = self.source.level_downsample(slide_level).unwrap_or(1.0);
        let l_lim = self.source.level_dimensions(slide_level).unwrap_or((0, 0));
        let z_lim = self.z_dimensions[level];

        let axis = |t: u32, t_lim: u32, z_lim: u32, l_lim: u32| {
            let tl = if t != 0 { self.overlap } else { 0 };
            let br = if t != t_lim - 1 { self.overlap } else { 0 };
            let z_size = self.tile_size.min(z_lim - self.tile_size * t) + tl + br;
            let z_location = (self.tile_size * t) as f64;
            let l_location = l_z_downsample * (z_location - tl as f64);
            let l0_location = (l0_l_downsample * l_location).max(0.0) as u64;
            let l_size = (l_z_downsample * z_size as f64)
                .ceil()
                .min(l_lim as f64 - l_location.ceil())
                .max(1.0) as u32;
            (l0_location, l_size, z_size)
        };
        let (x, l_w, z_w) = axis(col, cols, z_lim.0, l_lim.0);
        let (y, l_h, z_h) = axis(row, rows, z_lim.1, l_lim.1);

        Ok(TileInfo {
            l0_location: (x, y),
            slide_level,
            l_size: (l_w, l_h),
            z_size: (z_w, z_h),
        })
    }

    /// Render a tile.
    pub async fn get_tile(&self, level: usize, address: (u32, u32)) -> Result<RgbImage, TileError> {
        let info = self.tile_info(level, address)?;
        let region = self
            .source
            .read_region(info.l0_location, info.slide_level, info.l_size)
            .await?;

        if region.dimensions() == info.z_size {
            return Ok(region);
        }
        let (w, h) = info.z_size;
        Ok(tokio::task::spawn_blocking(move || {
            imageops::resize(&region, w, h, FilterType::Lanczos3)
        })
        .await
        .map_err(|e| TileError::Worker(e.to_string()))?)
    }

    /// DZI descriptor for this image.
    pub fn descriptor(&self, format: &str) -> DziDescriptor {
        let (width, height) = self.source.dimensions();
        DziDescriptor::new(width, height, self.tile_size, self.overlap, format)
    }

    /// DZI XML for this image.
    pub fn get_dzi(&self, format: &str) -> String {
        self.descriptor(format).to_xml()
    }
}
