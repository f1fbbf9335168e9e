//! Splitting a TIFF's IFD chain into pyramid levels and other images.
//!
//! Slide files hold the full-resolution image, a chain of downsampled copies
//! of it, and a few unrelated images (thumbnail, label, macro). Pyramid
//! levels are identified by:
//! 1. Tiled organization with tile offsets present
//! 2. Aspect ratio matching the largest tiled image (level 0)
//! 3. A downsample close to a power of two
//!
//! Every other IFD is kept, in file order, as an "other image" for the
//! format layer to name.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

/// Safety limit on the IFD chain length
const MAX_IFDS: usize = 100;

/// Allowed pixel difference between a level's height and the height implied
/// by its width downsample
const ASPECT_TOLERANCE_PX: f64 = 2.0;

// =============================================================================
// PyramidLevel
// =============================================================================

/// One resolution of the image pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// 0 is full resolution
    pub level_index: usize,

    /// Position in the file's IFD chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,

    /// Downsample relative to level 0, averaged over both axes
    pub downsample: f64,

    /// Raw compression tag value
    pub compression: u16,

    pub ifd: Ifd,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD; `None` if any tile tag is missing.
    fn from_ifd(ifd: Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        if !ifd.is_tiled() || ifd.get_entry_by_tag(TiffTag::TileByteCounts).is_none() {
            return None;
        }
        let tile_width = ifd.tile_width(byte_order).filter(|&w| w > 0)?;
        let tile_height = ifd.tile_height(byte_order).filter(|&h| h > 0)?;
        let width = ifd.image_width(byte_order).filter(|&w| w > 0)?;
        let height = ifd.image_height(byte_order).filter(|&h| h > 0)?;

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            downsample: 1.0,
            compression: ifd.compression(byte_order),
            ifd,
        })
    }

    /// Row-major index of a tile, `None` when out of the grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Pixel size of a tile after clipping to the image; edge tiles shrink.
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        self.tile_index(tile_x, tile_y)?;
        let w = (self.width - tile_x * self.tile_width).min(self.tile_width);
        let h = (self.height - tile_y * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A TIFF file's IFDs, classified.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,

    /// Every IFD in chain order
    pub ifds: Vec<Ifd>,

    /// Pyramid levels, full resolution first
    pub levels: Vec<PyramidLevel>,

    /// Indices into `ifds` of the images that are not pyramid levels
    pub other_ifds: Vec<usize>,
}

impl TiffPyramid {
    /// Read the header and the whole IFD chain, then classify.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header = read_header(reader).await?;
        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if !seen.insert(offset) {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            let ifd = read_ifd(reader, &header, offset).await?;
            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(Self::build(header, ifds))
    }

    fn build(header: TiffHeader, ifds: Vec<Ifd>) -> Self {
        let mut candidates: Vec<PyramidLevel> = ifds
            .iter()
            .enumerate()
            .filter_map(|(i, ifd)| PyramidLevel::from_ifd(ifd.clone(), i, header.byte_order))
            .collect();

        // Largest first; ties keep file order
        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let levels = Self::filter_pyramid_levels(candidates);
        let other_ifds = (0..ifds.len())
            .filter(|i| !levels.iter().any(|l| l.ifd_index == *i))
            .collect();

        TiffPyramid {
            header,
            ifds,
            levels,
            other_ifds,
        }
    }

    /// Keep the candidates that are consistent downsamples of the largest.
    fn filter_pyramid_levels(candidates: Vec<PyramidLevel>) -> Vec<PyramidLevel> {
        let Some(base) = candidates.first() else {
            return candidates;
        };
        let base_width = base.width as f64;
        let base_height = base.height as f64;

        let mut levels: Vec<PyramidLevel> = Vec::new();
        for mut level in candidates {
            let downsample_x = base_width / level.width as f64;
            let downsample_y = base_height / level.height as f64;
            let expected_height = base_height / downsample_x;

            if (expected_height - level.height as f64).abs() > ASPECT_TOLERANCE_PX {
                continue;
            }
            if !Self::is_valid_downsample(downsample_x, levels.len()) {
                continue;
            }
            if levels
                .last()
                .is_some_and(|prev| prev.width == level.width && prev.height == level.height)
            {
                continue;
            }

            level.level_index = levels.len();
            level.downsample = (downsample_x + downsample_y) / 2.0;
            levels.push(level);
        }
        levels
    }

    /// Level 0 must be ~1; later levels must sit near a power of two.
    fn is_valid_downsample(downsample: f64, level_idx: usize) -> bool {
        if level_idx == 0 {
            return (downsample - 1.0).abs() < 0.1;
        }
        let rounded = downsample.log2().round();
        if rounded < 1.0 {
            return false;
        }
        let ratio = downsample / 2.0_f64.powf(rounded);
        ratio > 0.8 && ratio < 1.2
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Dimensions of level 0.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.width, l.height))
    }

    /// Non-pyramid IFDs with their chain positions.
    pub fn other_images(&self) -> impl Iterator<Item = (usize, &Ifd)> {
        self.other_ifds.iter().map(move |&i| (i, &self.ifds[i]))
    }
}

/// Read and validate the file header.
pub async fn read_header<R: RangeReader>(reader: &R) -> Result<TiffHeader, TiffError> {
    let len = (reader.size() as usize).min(BIGTIFF_HEADER_SIZE);
    let bytes = reader.read_exact_at(0, len).await?;
    TiffHeader::parse(&bytes, reader.size())
}

/// Read the IFD at `offset`.
pub async fn read_ifd<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, TiffError> {
    if offset >= reader.size() {
        return Err(TiffError::InvalidIfdOffset(offset));
    }
    let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
    let entry_count = if header.is_bigtiff {
        header.byte_order.read_u64(&count_bytes)
    } else {
        header.byte_order.read_u16(&count_bytes) as u64
    };
    // Real IFDs have tens of entries; a huge count means a corrupt offset
    if entry_count > u16::MAX as u64 {
        return Err(TiffError::InvalidIfdOffset(offset));
    }

    let ifd_bytes = reader
        .read_exact_at(offset, Ifd::calculate_size(entry_count, header))
        .await?;
    Ifd::parse(&ifd_bytes, header)
}

// =============================================================================
// TileData
// =============================================================================

/// Byte locations of an image's tiles or strips, plus shared JPEG tables.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Load TileOffsets / TileByteCounts.
    pub async fn load_tiles<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
    ) -> Result<Self, TiffError> {
        Self::load(
            reader,
            header,
            ifd,
            (TiffTag::TileOffsets, "TileOffsets"),
            (TiffTag::TileByteCounts, "TileByteCounts"),
        )
        .await
    }

    /// Load StripOffsets / StripByteCounts.
    pub async fn load_strips<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
    ) -> Result<Self, TiffError> {
        Self::load(
            reader,
            header,
            ifd,
            (TiffTag::StripOffsets, "StripOffsets"),
            (TiffTag::StripByteCounts, "StripByteCounts"),
        )
        .await
    }

    async fn load<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        ifd: &Ifd,
        offsets_tag: (TiffTag, &'static str),
        counts_tag: (TiffTag, &'static str),
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let entry = ifd
            .get_entry_by_tag(offsets_tag.0)
            .ok_or(TiffError::MissingTag(offsets_tag.1))?;
        let offsets = values.read_u64_array(entry).await?;

        let entry = ifd
            .get_entry_by_tag(counts_tag.0)
            .ok_or(TiffError::MissingTag(counts_tag.1))?;
        let byte_counts = values.read_u64_array(entry).await?;

        if offsets.len() != byte_counts.len() {
            return Err(TiffError::InvalidTagValue {
                tag: counts_tag.1,
                message: format!(
                    "{} offsets but {} byte counts",
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match ifd.get_entry_by_tag(TiffTag::JpegTables) {
            Some(entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size of chunk `index`.
    pub fn get_tile_location(&self, index: u32) -> Option<(u64, u64)> {
        let i = index as usize;
        Some((*self.offsets.get(i)?, *self.byte_counts.get(i)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(width: u32, height: u32) -> PyramidLevel {
        PyramidLevel {
            level_index: 0,
            ifd_index: 0,
            width,
            height,
            tile_width: 256,
            tile_height: 256,
            tiles_x: width.div_ceil(256),
            tiles_y: height.div_ceil(256),
            downsample: 1.0,
            compression: 7,
            ifd: Ifd::empty(),
        }
    }

    #[test]
    fn test_tile_index_and_dimensions() {
        let l = level(1000, 700);
        assert_eq!((l.tiles_x, l.tiles_y), (4, 3));
        assert_eq!(l.tile_index(0, 1), Some(4));
        assert_eq!(l.tile_index(3, 2), Some(11));
        assert_eq!(l.tile_index(4, 0), None);

        assert_eq!(l.tile_dimensions(0, 0), Some((256, 256)));
        assert_eq!(l.tile_dimensions(3, 0), Some((232, 256)));
        assert_eq!(l.tile_dimensions(3, 2), Some((232, 188)));
        assert_eq!(l.tile_dimensions(0, 3), None);
    }

    #[test]
    fn test_is_valid_downsample() {
        assert!(TiffPyramid::is_valid_downsample(1.0, 0));
        assert!(!TiffPyramid::is_valid_downsample(2.0, 0));
        assert!(TiffPyramid::is_valid_downsample(2.0, 1));
        assert!(TiffPyramid::is_valid_downsample(4.0, 1));
        assert!(TiffPyramid::is_valid_downsample(3.9, 2));
        assert!(!TiffPyramid::is_valid_downsample(1.5, 1));
        assert!(!TiffPyramid::is_valid_downsample(3.0, 2));
    }

    #[test]
    fn test_filter_rejects_other_aspect_ratios() {
        let mut candidates = vec![level(4000, 3000), level(1000, 750), level(1000, 1000)];
        for (i, c) in candidates.iter_mut().enumerate() {
            c.ifd_index = i;
        }
        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let levels = TiffPyramid::filter_pyramid_levels(candidates);
        assert_eq!(levels.len(), 2);
        assert_eq!((levels[1].width, levels[1].height), (1000, 750));
        assert_eq!(levels[1].level_index, 1);
        assert!((levels[1].downsample - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_accepts_rounded_small_levels() {
        // 2001x1501 halved with ceil down to 16x12
        let candidates = vec![level(2001, 1501), level(1001, 751), level(126, 94), level(16, 12)];
        let levels = TiffPyramid::filter_pyramid_levels(candidates);
        assert_eq!(levels.len(), 4);
        assert!(levels[3].downsample > 120.0);
    }

    #[test]
    fn test_tile_location() {
        let data = TileData {
            offsets: vec![100, 200],
            byte_counts: vec![50, 0],
            jpeg_tables: None,
        };
        assert_eq!(data.get_tile_location(1), Some((200, 0)));
        assert_eq!(data.get_tile_location(2), None);
    }
}
