//! TIFF field types, tag IDs and compression schemes used by slide files.

// =============================================================================
// Field types
// =============================================================================

/// Encoding of the values stored in an IFD entry.
///
/// Only the types that appear in slide files are listed; other types parse as
/// unknown and their entries are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    /// Two LONGs: numerator, denominator
    Rational = 5,
    Undefined = 7,
    /// BigTIFF only
    Long8 = 16,
}

impl FieldType {
    /// Classic TIFF inline value field width.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// BigTIFF inline value field width.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Whether `count` values of this type fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF
        } else {
            Self::INLINE_THRESHOLD_TIFF
        };
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .map(|total| total <= threshold as u64)
            .unwrap_or(false)
    }
}

// =============================================================================
// Tags
// =============================================================================

/// TIFF tag IDs read by the slide decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    DocumentName = 269,
    /// Holds vendor metadata in Aperio files
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    StripOffsets = 273,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    XResolution = 282,
    YResolution = 283,
    PlanarConfiguration = 284,
    ResolutionUnit = 296,
    Software = 305,
    DateTime = 306,
    Artist = 315,
    HostComputer = 316,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    /// Quantization and Huffman tables shared by abbreviated JPEG tiles
    JpegTables = 347,
    YCbCrSubSampling = 530,
    Copyright = 33432,
}

/// ASCII tags exported as `tiff.<Name>` slide properties.
pub const ASCII_PROPERTY_TAGS: [TiffTag; 9] = [
    TiffTag::ImageDescription,
    TiffTag::Make,
    TiffTag::Model,
    TiffTag::Software,
    TiffTag::DateTime,
    TiffTag::Artist,
    TiffTag::HostComputer,
    TiffTag::Copyright,
    TiffTag::DocumentName,
];

impl TiffTag {
    pub fn from_u16(value: u16) -> Option<Self> {
        use TiffTag::*;
        let tag = match value {
            254 => NewSubfileType,
            256 => ImageWidth,
            257 => ImageLength,
            258 => BitsPerSample,
            259 => Compression,
            262 => PhotometricInterpretation,
            269 => DocumentName,
            270 => ImageDescription,
            271 => Make,
            272 => Model,
            273 => StripOffsets,
            277 => SamplesPerPixel,
            278 => RowsPerStrip,
            279 => StripByteCounts,
            282 => XResolution,
            283 => YResolution,
            284 => PlanarConfiguration,
            296 => ResolutionUnit,
            305 => Software,
            306 => DateTime,
            315 => Artist,
            316 => HostComputer,
            322 => TileWidth,
            323 => TileLength,
            324 => TileOffsets,
            325 => TileByteCounts,
            347 => JpegTables,
            530 => YCbCrSubSampling,
            33432 => Copyright,
            _ => return None,
        };
        Some(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Name used in `tiff.*` property keys.
    pub const fn name(self) -> &'static str {
        use TiffTag::*;
        match self {
            NewSubfileType => "NewSubfileType",
            ImageWidth => "ImageWidth",
            ImageLength => "ImageLength",
            BitsPerSample => "BitsPerSample",
            Compression => "Compression",
            PhotometricInterpretation => "PhotometricInterpretation",
            DocumentName => "DocumentName",
            ImageDescription => "ImageDescription",
            Make => "Make",
            Model => "Model",
            StripOffsets => "StripOffsets",
            SamplesPerPixel => "SamplesPerPixel",
            RowsPerStrip => "RowsPerStrip",
            StripByteCounts => "StripByteCounts",
            XResolution => "XResolution",
            YResolution => "YResolution",
            PlanarConfiguration => "PlanarConfiguration",
            ResolutionUnit => "ResolutionUnit",
            Software => "Software",
            DateTime => "DateTime",
            Artist => "Artist",
            HostComputer => "HostComputer",
            TileWidth => "TileWidth",
            TileLength => "TileLength",
            TileOffsets => "TileOffsets",
            TileByteCounts => "TileByteCounts",
            JpegTables => "JPEGTables",
            YCbCrSubSampling => "YCbCrSubSampling",
            Copyright => "Copyright",
        }
    }
}

// =============================================================================
// Compression
// =============================================================================

/// TIFF compression schemes seen in slide files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    None = 1,
    Lzw = 5,
    OldJpeg = 6,
    Jpeg = 7,
    Deflate = 8,
    AdobeDeflate = 32946,
    Jpeg2000 = 33003,
    /// Aperio JPEG 2000 with RGB components
    Jpeg2000Rgb = 33005,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32946 => Some(Compression::AdobeDeflate),
            33003 => Some(Compression::Jpeg2000),
            33005 => Some(Compression::Jpeg2000Rgb),
            _ => None,
        }
    }

    /// Pyramid tiles can only be decoded when JPEG-compressed.
    #[inline]
    pub const fn is_tile_decodable(self) -> bool {
        matches!(self, Compression::Jpeg)
    }

    /// Associated images additionally accept uncompressed data.
    #[inline]
    pub const fn is_image_decodable(self) -> bool {
        matches!(self, Compression::Jpeg | Compression::None)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::Jpeg2000 => "JPEG 2000",
            Compression::Jpeg2000Rgb => "JPEG 2000 (RGB)",
        }
    }
}

/// Describe a raw compression value for error messages.
pub fn compression_name(value: u16) -> String {
    match Compression::from_u16(value) {
        Some(c) => c.name().to_string(),
        None => format!("unknown ({value})"),
    }
}
