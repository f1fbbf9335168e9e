//! Deep Zoom Image (DZI) descriptors.
//!
//! A DZI file tells viewers such as OpenSeadragon how a tile tree is laid
//! out:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Image xmlns="http://schemas.microsoft.com/deepzoom/2008" Format="jpeg" Overlap="1" TileSize="512"><Size Height="33600" Width="46920"/></Image>
//! ```
//!
//! Deep Zoom numbers levels from 0 (1x1 pixel) up to full resolution.

/// Deep Zoom XML namespace
pub const DZI_NAMESPACE: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// The lowest level a published viewer loads. Levels below it are tiny and
/// never worth a request.
pub const MIN_TILE_LEVEL: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DziDescriptor {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub overlap: u32,
    pub format: String,
    pub min_tile_level: Option<u32>,
}

impl DziDescriptor {
    pub fn new(width: u32, height: u32, tile_size: u32, overlap: u32, format: &str) -> Self {
        Self {
            width,
            height,
            tile_size,
            overlap,
            format: format.to_string(),
            min_tile_level: None,
        }
    }

    /// Add a `MinTileLevel` attribute to the `Image` element.
    pub fn with_min_tile_level(mut self, level: u32) -> Self {
        self.min_tile_level = Some(level);
        self
    }

    pub fn to_xml(&self) -> String {
        let min_tile_level = self
            .min_tile_level
            .map(|l| format!(" MinTileLevel=\"{l}\""))
            .unwrap_or_default();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Image xmlns=\"{DZI_NAMESPACE}\" Format=\"{}\"{min_tile_level} Overlap=\"{}\" TileSize=\"{}\">\
             <Size Height=\"{}\" Width=\"{}\"/></Image>",
            escape_attr(&self.format),
            self.overlap,
            self.tile_size,
            self.height,
            self.width,
        )
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dzi_xml() {
        let xml = DziDescriptor::new(46920, 33600, 512, 1, "jpeg").to_xml();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Image "));
        assert!(xml.contains("xmlns=\"http://schemas.microsoft.com/deepzoom/2008\""));
        assert!(xml.contains("TileSize=\"512\""));
        assert!(xml.contains("Overlap=\"1\""));
        assert!(xml.contains("Format=\"jpeg\""));
        assert!(xml.contains("<Size Height=\"33600\" Width=\"46920\"/>"));
        assert!(!xml.contains("MinTileLevel"));
    }

    #[test]
    fn test_min_tile_level() {
        let xml = DziDescriptor::new(10, 10, 512, 1, "jpeg")
            .with_min_tile_level(MIN_TILE_LEVEL)
            .to_xml();
        assert!(xml.contains("MinTileLevel=\"8\""));
    }

    #[test]
    fn test_format_is_escaped() {
        let xml = DziDescriptor::new(1, 1, 1, 0, "a\"b").to_xml();
        assert!(xml.contains("Format=\"a&quot;b\""));
    }
}
