use std::sync::Arc;

use async_trait::async_trait;
use image::{imageops, Rgb, RgbImage};

use super::RegionSource;
use crate::error::SlideError;

/// A single-level slide over an in-memory image.
///
/// Associated images (label, macro, thumbnail) are tiled through this so the
/// Deep Zoom generator can treat them like any other slide.
#[derive(Debug, Clone)]
pub struct ImageSlide {
    image: Arc<RgbImage>,
}

impl ImageSlide {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }
}

#[async_trait]
impl RegionSource for ImageSlide {
    fn level_count(&self) -> usize {
        1
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        (level == 0).then(|| self.image.dimensions())
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        (level == 0).then_some(1.0)
    }

    async fn read_region(
        &self,
        location: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, SlideError> {
        if level != 0 {
            return Err(SlideError::InvalidLevel {
                level,
                level_count: 1,
            });
        }
        let mut region = RgbImage::from_pixel(size.0, size.1, Rgb([255, 255, 255]));
        imageops::replace(
            &mut region,
            self.image.as_ref(),
            -(location.0 as i64),
            -(location.1 as i64),
        );
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> ImageSlide {
        ImageSlide::new(RgbImage::from_fn(10, 6, |x, y| Rgb([x as u8, y as u8, 0])))
    }

    #[tokio::test]
    async fn test_read_region_inside() {
        let slide = gradient();
        let region = slide.read_region((2, 1), 0, (3, 2)).await.unwrap();
        assert_eq!(region.dimensions(), (3, 2));
        assert_eq!(region.get_pixel(0, 0).0, [2, 1, 0]);
        assert_eq!(region.get_pixel(2, 1).0, [4, 2, 0]);
    }

    #[tokio::test]
    async fn test_read_region_past_edge_is_white() {
        let slide = gradient();
        let region = slide.read_region((8, 4), 0, (4, 4)).await.unwrap();
        assert_eq!(region.get_pixel(1, 1).0, [9, 5, 0]);
        assert_eq!(region.get_pixel(2, 0).0, [255, 255, 255]);
        assert_eq!(region.get_pixel(0, 3).0, [255, 255, 255]);
    }

    #[tokio::test]
    async fn test_single_level() {
        let slide = gradient();
        assert_eq!(slide.level_count(), 1);
        assert_eq!(slide.level_dimensions(0), Some((10, 6)));
        assert_eq!(slide.level_dimensions(1), None);
        assert!(matches!(
            slide.read_region((0, 0), 1, (1, 1)).await,
            Err(SlideError::InvalidLevel { level: 1, .. })
        ));
    }
}
