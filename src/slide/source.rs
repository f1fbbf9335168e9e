use async_trait::async_trait;
use image::RgbImage;

use crate::error::SlideError;

/// A multi-resolution image that can render arbitrary regions.
///
/// Implemented by [`Slide`](super::Slide) for whole-slide files and by
/// [`ImageSlide`](super::ImageSlide) for single in-memory images, so the
/// Deep Zoom generator handles both the same way.
///
/// Level 0 is full resolution; every level's downsample is relative to it.
#[async_trait]
pub trait RegionSource: Send + Sync {
    fn level_count(&self) -> usize;

    /// `(width, height)` of a level, `None` if out of range.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    /// Downsample of a level relative to level 0, `None` if out of range.
    fn level_downsample(&self, level: usize) -> Option<f64>;

    /// Dimensions of level 0.
    fn dimensions(&self) -> (u32, u32) {
        self.level_dimensions(0).unwrap_or((0, 0))
    }

    /// The level with the largest downsample that does not exceed
    /// `downsample`; level 0 for anything finer than full resolution.
    fn best_level_for_downsample(&self, downsample: f64) -> usize {
        let count = self.level_count();
        for level in 1..count {
            match self.level_downsample(level) {
                Some(d) if downsample < d => return level - 1,
                Some(_) => {}
                None => return level - 1,
            }
        }
        count.saturating_sub(1)
    }

    /// Render `size` pixels of `level`, starting at `location` in level-0
    /// coordinates. Pixels outside the image are white.
    async fn read_region(
        &self,
        location: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, SlideError>;
}
