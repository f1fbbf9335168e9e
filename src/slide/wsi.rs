use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use image::{imageops, Rgb, RgbImage};
use tracing::{debug, warn};

use super::RegionSource;
use crate::error::SlideError;
use crate::format::jpeg::decode_jpeg;
use crate::format::raster::read_ifd_image;
use crate::format::svs::{associated_image_name, SvsMetadata};
use crate::format::tiff::{
    compression_name, Compression, Ifd, PyramidLevel, TiffHeader, TiffPyramid, TiffTag, TileData,
    ValueReader, ASCII_PROPERTY_TAGS,
};
use crate::format::{detect_format, SlideFormat};
use crate::io::{LocalFileReader, RangeReader};

/// A pyramid level with its tile locations loaded.
#[derive(Debug, Clone)]
struct LevelData {
    level: PyramidLevel,
    tiles: TileData,
}

/// An opened whole-slide image.
///
/// Opening parses the TIFF structure, loads every level's tile offsets and
/// collects properties. Afterwards only tile payloads are read, so one
/// `Slide` can be shared (behind an `Arc`) by many concurrent renderers.
#[derive(Debug)]
pub struct Slide<R: RangeReader> {
    reader: R,
    format: SlideFormat,
    header: TiffHeader,
    levels: Vec<LevelData>,
    properties: BTreeMap<String, String>,
    associated: BTreeMap<String, Ifd>,
}

impl Slide<LocalFileReader> {
    /// Open a slide file from disk.
    pub async fn open_path(path: impl AsRef<Path>) -> Result<Self, SlideError> {
        let reader = LocalFileReader::open(path)?;
        Self::open(reader).await
    }

    /// Whether `path` is a slide this crate can read.
    pub async fn can_open(path: impl AsRef<Path>) -> bool {
        match Self::open_path(path.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                debug!(path = %path.as_ref().display(), error = %e, "Not a readable slide");
                false
            }
        }
    }
}

impl<R: RangeReader> Slide<R> {
    /// Open a slide from any range reader.
    pub async fn open(reader: R) -> Result<Self, SlideError> {
        let format = detect_format(&reader).await?;
        let pyramid = TiffPyramid::parse(&reader).await?;

        if pyramid.levels.is_empty() {
            return Err(SlideError::UnsupportedFormat {
                reason: format!("{} has no tiled pyramid", reader.identifier()),
            });
        }

        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let compression = Compression::from_u16(level.compression);
            if !compression.is_some_and(|c| c.is_tile_decodable()) {
                return Err(SlideError::UnsupportedFormat {
                    reason: format!(
                        "level {} uses unsupported compression {}",
                        level.level_index,
                        compression_name(level.compression)
                    ),
                });
            }
            let tiles = TileData::load_tiles(&reader, &pyramid.header, &level.ifd).await?;
            levels.push(LevelData {
                level: level.clone(),
                tiles,
            });
        }

        let mut slide = Slide {
            reader,
            format,
            header: pyramid.header,
            levels,
            properties: BTreeMap::new(),
            associated: BTreeMap::new(),
        };
        slide.properties = slide.collect_properties(&pyramid.ifds[0]).await?;
        if format == SlideFormat::AperioSvs {
            slide.associated = slide.find_associated_images(&pyramid).await?;
        }

        debug!(
            slide = slide.reader.identifier(),
            format = format.name(),
            levels = slide.levels.len(),
            associated = slide.associated.len(),
            "Opened slide"
        );
        Ok(slide)
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    /// Slide properties keyed the OpenSlide way (`openslide.*`, `tiff.*`,
    /// `aperio.*`).
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Names of the associated images, sorted.
    pub fn associated_image_names(&self) -> Vec<&str> {
        self.associated.keys().map(String::as_str).collect()
    }

    /// Decode an associated image.
    pub async fn read_associated_image(&self, name: &str) -> Result<RgbImage, SlideError> {
        let ifd = self
            .associated
            .get(name)
            .ok_or_else(|| SlideError::NoSuchAssociatedImage(name.to_string()))?;
        read_ifd_image(&self.reader, &self.header, ifd).await
    }

    async fn collect_properties(&self, first: &Ifd) -> Result<BTreeMap<String, String>, SlideError> {
        let mut props = BTreeMap::new();
        let values = ValueReader::new(&self.reader, &self.header);

        props.insert("openslide.vendor".to_string(), self.format.vendor().to_string());
        props.insert(
            "openslide.level-count".to_string(),
            self.levels.len().to_string(),
        );
        for (i, data) in self.levels.iter().enumerate() {
            let l = &data.level;
            let prefix = format!("openslide.level[{i}]");
            props.insert(format!("{prefix}.width"), l.width.to_string());
            props.insert(format!("{prefix}.height"), l.height.to_string());
            props.insert(format!("{prefix}.downsample"), l.downsample.to_string());
            props.insert(format!("{prefix}.tile-width"), l.tile_width.to_string());
            props.insert(format!("{prefix}.tile-height"), l.tile_height.to_string());
        }

        for tag in ASCII_PROPERTY_TAGS {
            let Some(entry) = first.get_entry_by_tag(tag) else {
                continue;
            };
            match values.read_string(entry).await {
                Ok(value) => {
                    props.insert(format!("tiff.{}", tag.name()), value);
                }
                Err(e) => warn!(tag = tag.name(), error = %e, "Skipping unreadable TIFF tag"),
            }
        }
        if let Some(description) = props.get("tiff.ImageDescription").cloned() {
            props.insert("openslide.comment".to_string(), description);
        }

        let mut resolution = [None, None];
        for (slot, tag) in [TiffTag::XResolution, TiffTag::YResolution].iter().enumerate() {
            if let Some(entry) = first.get_entry_by_tag(*tag) {
                if let Ok(value) = values.read_rational(entry).await {
                    props.insert(format!("tiff.{}", tag.name()), value.to_string());
                    resolution[slot] = Some(value);
                }
            }
        }
        let unit = first
            .get_entry_by_tag(TiffTag::ResolutionUnit)
            .and_then(|e| e.inline_u32(self.header.byte_order))
            .unwrap_or(2);
        let unit_name = match unit {
            1 => "none",
            3 => "centimeter",
            _ => "inch",
        };
        props.insert("tiff.ResolutionUnit".to_string(), unit_name.to_string());

        match self.format {
            SlideFormat::AperioSvs => {
                let description = props.get("tiff.ImageDescription").cloned().unwrap_or_default();
                let metadata = SvsMetadata::parse(&description);
                for (key, source) in [
                    ("openslide.mpp-x", "aperio.MPP"),
                    ("openslide.mpp-y", "aperio.MPP"),
                    ("openslide.objective-power", "aperio.AppMag"),
                ] {
                    if let Some(value) = metadata.properties.get(source) {
                        props.insert(key.to_string(), value.clone());
                    }
                }
                props.extend(metadata.properties);
            }
            SlideFormat::GenericTiff => {
                // Pixels per centimeter to microns per pixel
                if unit == 3 {
                    for (key, value) in ["openslide.mpp-x", "openslide.mpp-y"].iter().zip(resolution) {
                        if let Some(v) = value.filter(|v| *v > 0.0) {
                            props.insert(key.to_string(), (10000.0 / v).to_string());
                        }
                    }
                }
            }
        }

        Ok(props)
    }

    async fn find_associated_images(
        &self,
        pyramid: &TiffPyramid,
    ) -> Result<BTreeMap<String, Ifd>, SlideError> {
        let values = ValueReader::new(&self.reader, &self.header);
        let mut found = BTreeMap::new();

        for (index, ifd) in pyramid.other_images() {
            let description = match ifd.get_entry_by_tag(TiffTag::ImageDescription) {
                Some(entry) => values.read_string(entry).await.ok(),
                None => None,
            };
            let Some(name) = associated_image_name(index, ifd.is_tiled(), description.as_deref())
            else {
                continue;
            };
            if found.contains_key(name) {
                continue;
            }

            let raw = ifd.compression(self.header.byte_order);
            if !Compression::from_u16(raw).is_some_and(|c| c.is_image_decodable()) {
                warn!(
                    slide = self.reader.identifier(),
                    image = name,
                    compression = %compression_name(raw),
                    "Skipping associated image with unsupported compression"
                );
                continue;
            }
            found.insert(name.to_string(), ifd.clone());
        }

        Ok(found)
    }

    fn level(&self, level: usize) -> Result<&LevelData, SlideError> {
        self.levels.get(level).ok_or(SlideError::InvalidLevel {
            level,
            level_count: self.levels.len(),
        })
    }
}

/// A fetched source tile waiting to be decoded and placed.
struct PendingTile {
    data: Bytes,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

#[async_trait]
impl<R: RangeReader> RegionSource for Slide<R> {
    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.level.width, l.level.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels.get(level).map(|l| l.level.downsample)
    }

    async fn read_region(
        &self,
        location: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, SlideError> {
        let data = self.level(level)?;
        let l = &data.level;
        let (width, height) = size;

        // Region origin in this level's pixel grid
        let x0 = (location.0 as f64 / l.downsample).floor() as u64;
        let y0 = (location.1 as f64 / l.downsample).floor() as u64;
        let x1 = (x0 + width as u64).min(l.width as u64);
        let y1 = (y0 + height as u64).min(l.height as u64);

        let mut pending = Vec::new();
        if width > 0 && height > 0 && x0 < x1 && y0 < y1 {
            let tw = l.tile_width as u64;
            let th = l.tile_height as u64;
            for row in (y0 / th)..=((y1 - 1) / th) {
                for col in (x0 / tw)..=((x1 - 1) / tw) {
                    let (col, row) = (col as u32, row as u32);
                    let Some((offset, len)) = l
                        .tile_index(col, row)
                        .and_then(|i| data.tiles.get_tile_location(i))
                    else {
                        continue;
                    };
                    // Sparse tiles stay background
                    if len == 0 {
                        continue;
                    }
                    let Some((tile_w, tile_h)) = l.tile_dimensions(col, row) else {
                        continue;
                    };
                    let bytes = self.reader.read_exact_at(offset, len as usize).await?;
                    pending.push(PendingTile {
                        data: bytes,
                        x: (col as u64 * tw) as i64 - x0 as i64,
                        y: (row as u64 * th) as i64 - y0 as i64,
                        width: tile_w,
                        height: tile_h,
                    });
                }
            }
        }

        let tables = data.tiles.jpeg_tables.clone();
        tokio::task::spawn_blocking(move || {
            let mut region = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
            for tile in pending {
                let decoded = decode_jpeg(tables.as_deref(), &tile.data)?;
                // Edge tiles are padded to the full tile size
                let visible =
                    imageops::crop_imm(&decoded, 0, 0, tile.width, tile.height).to_image();
                imageops::replace(&mut region, &visible, tile.x, tile.y);
            }
            Ok(region)
        })
        .await
        .map_err(|e| SlideError::Decode {
            message: format!("region task failed: {e}"),
        })?
    }
}
