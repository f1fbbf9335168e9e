//! Synthetic slide builder shared by unit and integration tests.
//!
//! Produces little-endian classic TIFFs laid out like real scanner output:
//! a tiled JPEG pyramid halving at every level, plus optional Aperio
//! associated images. Only depends on the `image` crate so integration
//! tests can include it by path.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

/// Fill color of every pyramid tile
pub const TEST_TILE_COLOR: [u8; 3] = [200, 120, 60];

const LABEL_COLOR: [u8; 3] = [30, 60, 90];
const MACRO_COLOR: [u8; 3] = [90, 160, 40];
const THUMBNAIL_COLOR: [u8; 3] = [220, 220, 180];

// Tags
const NEW_SUBFILE_TYPE: u16 = 254;
const IMAGE_WIDTH: u16 = 256;
const IMAGE_LENGTH: u16 = 257;
const BITS_PER_SAMPLE: u16 = 258;
const COMPRESSION: u16 = 259;
const PHOTOMETRIC: u16 = 262;
const IMAGE_DESCRIPTION: u16 = 270;
const STRIP_OFFSETS: u16 = 273;
const SAMPLES_PER_PIXEL: u16 = 277;
const ROWS_PER_STRIP: u16 = 278;
const STRIP_BYTE_COUNTS: u16 = 279;
const X_RESOLUTION: u16 = 282;
const Y_RESOLUTION: u16 = 283;
const PLANAR_CONFIGURATION: u16 = 284;
const RESOLUTION_UNIT: u16 = 296;
const SOFTWARE: u16 = 305;
const TILE_WIDTH: u16 = 322;
const TILE_LENGTH: u16 = 323;
const TILE_OFFSETS: u16 = 324;
const TILE_BYTE_COUNTS: u16 = 325;

// Field types
const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;

/// Encode a solid-color JPEG.
pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&image)
        .unwrap();
    buf
}

// =============================================================================
// Slide Builder
// =============================================================================

#[derive(Clone, Copy)]
enum Encoding {
    Jpeg,
    Raw,
}

struct Associated {
    width: u32,
    height: u32,
    kind: &'static str,
    color: [u8; 3],
    encoding: Encoding,
}

/// Builder for synthetic pyramidal slides.
pub struct SlideBuilder {
    width: u32,
    height: u32,
    tile_size: u32,
    levels: u32,
    level_encoding: Encoding,
    description: Option<String>,
    software: Option<String>,
    pixels_per_cm: Option<f64>,
    thumbnail: Option<(u32, u32)>,
    label: Option<(u32, u32)>,
    macro_image: Option<(u32, u32)>,
}

impl SlideBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tile_size: 256,
            levels: 1,
            level_encoding: Encoding::Jpeg,
            description: None,
            software: None,
            pixels_per_cm: None,
            thumbnail: None,
            label: None,
            macro_image: None,
        }
    }

    pub fn tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn levels(mut self, levels: u32) -> Self {
        self.levels = levels.max(1);
        self
    }

    /// Mark the slide as Aperio SVS with this ImageDescription.
    pub fn aperio(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn software(mut self, software: &str) -> Self {
        self.software = Some(software.to_string());
        self
    }

    /// Store resolution in pixels per centimeter.
    pub fn pixels_per_cm(mut self, value: f64) -> Self {
        self.pixels_per_cm = Some(value);
        self
    }

    pub fn thumbnail(mut self, width: u32, height: u32) -> Self {
        self.thumbnail = Some((width, height));
        self
    }

    pub fn label(mut self, width: u32, height: u32) -> Self {
        self.label = Some((width, height));
        self
    }

    pub fn macro_image(mut self, width: u32, height: u32) -> Self {
        self.macro_image = Some((width, height));
        self
    }

    /// Store pyramid tiles uncompressed instead of JPEG.
    pub fn uncompressed_levels(mut self) -> Self {
        self.level_encoding = Encoding::Raw;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = TiffWriter::new();
        let mut ifds = Vec::new();

        let mut level_ifds = Vec::new();
        let (mut w, mut h) = (self.width, self.height);
        for level in 0..self.levels {
            level_ifds.push(self.level_ifd(&mut writer, level, w, h));
            w = w.div_ceil(2).max(1);
            h = h.div_ceil(2).max(1);
        }

        let mut level_ifds = level_ifds.into_iter();
        if let Some(first) = level_ifds.next() {
            ifds.push(first);
        }
        // Aperio puts the thumbnail right after the base level
        if let Some((w, h)) = self.thumbnail {
            ifds.push(associated_ifd(
                &mut writer,
                &Associated {
                    width: w,
                    height: h,
                    kind: "thumbnail",
                    color: THUMBNAIL_COLOR,
                    encoding: Encoding::Jpeg,
                },
            ));
        }
        ifds.extend(level_ifds);
        if let Some((w, h)) = self.label {
            ifds.push(associated_ifd(
                &mut writer,
                &Associated {
                    width: w,
                    height: h,
                    kind: "label",
                    color: LABEL_COLOR,
                    encoding: Encoding::Raw,
                },
            ));
        }
        if let Some((w, h)) = self.macro_image {
            ifds.push(associated_ifd(
                &mut writer,
                &Associated {
                    width: w,
                    height: h,
                    kind: "macro",
                    color: MACRO_COLOR,
                    encoding: Encoding::Jpeg,
                },
            ));
        }

        writer.finish(ifds)
    }

    fn level_ifd(&self, writer: &mut TiffWriter, level: u32, width: u32, height: u32) -> Vec<Entry> {
        let ts = self.tile_size;
        let tiles = width.div_ceil(ts) * height.div_ceil(ts);
        let tile = match self.level_encoding {
            Encoding::Jpeg => solid_jpeg(ts, ts, TEST_TILE_COLOR),
            Encoding::Raw => RgbImage::from_pixel(ts, ts, Rgb(TEST_TILE_COLOR)).into_raw(),
        };

        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for _ in 0..tiles {
            offsets.push(writer.append(&tile));
            counts.push(tile.len() as u32);
        }

        let mut entries = vec![
            Entry::long(NEW_SUBFILE_TYPE, 0),
            Entry::long(IMAGE_WIDTH, width),
            Entry::long(IMAGE_LENGTH, height),
            Entry::shorts(BITS_PER_SAMPLE, &[8, 8, 8]),
            Entry::short(COMPRESSION, self.compression()),
            Entry::short(PHOTOMETRIC, 2),
            Entry::short(SAMPLES_PER_PIXEL, 3),
            Entry::short(PLANAR_CONFIGURATION, 1),
            Entry::long(TILE_WIDTH, ts),
            Entry::long(TILE_LENGTH, ts),
            Entry::longs(TILE_OFFSETS, &offsets),
            Entry::longs(TILE_BYTE_COUNTS, &counts),
        ];
        if level == 0 {
            if let Some(description) = &self.description {
                entries.push(Entry::ascii(IMAGE_DESCRIPTION, description));
            }
            if let Some(software) = &self.software {
                entries.push(Entry::ascii(SOFTWARE, software));
            }
            if let Some(ppcm) = self.pixels_per_cm {
                let value = (ppcm * 1000.0).round() as u32;
                entries.push(Entry::rational(X_RESOLUTION, value, 1000));
                entries.push(Entry::rational(Y_RESOLUTION, value, 1000));
                entries.push(Entry::short(RESOLUTION_UNIT, 3));
            }
        }
        entries
    }

    fn compression(&self) -> u16 {
        match self.level_encoding {
            Encoding::Jpeg => 7,
            Encoding::Raw => 1,
        }
    }
}

fn associated_ifd(writer: &mut TiffWriter, image: &Associated) -> Vec<Entry> {
    let (data, compression) = match image.encoding {
        Encoding::Jpeg => (solid_jpeg(image.width, image.height, image.color), 7),
        Encoding::Raw => (
            RgbImage::from_pixel(image.width, image.height, Rgb(image.color)).into_raw(),
            1,
        ),
    };
    let offset = writer.append(&data);
    let description = format!(
        "Aperio Image Library v10.0.50\r\n{} {}x{}",
        image.kind, image.width, image.height
    );

    vec![
        Entry::long(NEW_SUBFILE_TYPE, 1),
        Entry::long(IMAGE_WIDTH, image.width),
        Entry::long(IMAGE_LENGTH, image.height),
        Entry::shorts(BITS_PER_SAMPLE, &[8, 8, 8]),
        Entry::short(COMPRESSION, compression),
        Entry::short(PHOTOMETRIC, 2),
        Entry::ascii(IMAGE_DESCRIPTION, &description),
        Entry::longs(STRIP_OFFSETS, &[offset]),
        Entry::short(SAMPLES_PER_PIXEL, 3),
        Entry::long(ROWS_PER_STRIP, image.height),
        Entry::longs(STRIP_BYTE_COUNTS, &[data.len() as u32]),
        Entry::short(PLANAR_CONFIGURATION, 1),
    ]
}

// =============================================================================
// Raw TIFF Writer
// =============================================================================

/// One IFD entry with its little-endian value bytes.
struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    value: Vec<u8>,
}

impl Entry {
    fn short(tag: u16, value: u16) -> Self {
        Self::shorts(tag, &[value])
    }

    fn shorts(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            field_type: SHORT,
            count: values.len() as u32,
            value: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self::longs(tag, &[value])
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        Self {
            tag,
            field_type: LONG,
            count: values.len() as u32,
            value: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut value = text.as_bytes().to_vec();
        value.push(0);
        Self {
            tag,
            field_type: ASCII,
            count: value.len() as u32,
            value,
        }
    }

    fn rational(tag: u16, numerator: u32, denominator: u32) -> Self {
        let mut value = numerator.to_le_bytes().to_vec();
        value.extend_from_slice(&denominator.to_le_bytes());
        Self {
            tag,
            field_type: RATIONAL,
            count: 1,
            value,
        }
    }
}

struct TiffWriter {
    data: Vec<u8>,
}

impl TiffWriter {
    fn new() -> Self {
        // Header with the first IFD offset patched in finish()
        Self {
            data: vec![b'I', b'I', 42, 0, 0, 0, 0, 0],
        }
    }

    /// Append a blob at a word boundary, returning its offset.
    fn append(&mut self, bytes: &[u8]) -> u32 {
        if self.data.len() % 2 == 1 {
            self.data.push(0);
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        offset
    }

    fn finish(mut self, ifds: Vec<Vec<Entry>>) -> Vec<u8> {
        let mut next_pointer = 4usize;
        for mut entries in ifds {
            entries.sort_by_key(|e| e.tag);

            // Out-of-line values first
            let mut values = Vec::with_capacity(entries.len());
            for entry in &entries {
                if entry.value.len() > 4 {
                    values.push(self.append(&entry.value).to_le_bytes());
                } else {
                    let mut inline = [0u8; 4];
                    inline[..entry.value.len()].copy_from_slice(&entry.value);
                    values.push(inline);
                }
            }

            let ifd_offset = self.append(&(entries.len() as u16).to_le_bytes());
            self.data[next_pointer..next_pointer + 4].copy_from_slice(&ifd_offset.to_le_bytes());
            for (entry, value) in entries.iter().zip(values) {
                self.data.extend_from_slice(&entry.tag.to_le_bytes());
                self.data.extend_from_slice(&entry.field_type.to_le_bytes());
                self.data.extend_from_slice(&entry.count.to_le_bytes());
                self.data.extend_from_slice(&value);
            }
            next_pointer = self.data.len();
            self.data.extend_from_slice(&[0, 0, 0, 0]);
        }
        self.data
    }
}
