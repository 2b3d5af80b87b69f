use std::time::{Duration, Instant};

use async_trait::async_trait;
use palette::{FromColor, Hsv, Srgb};

use super::{CaptureError, FrameSource};
use crate::image::{PixelFormat, RawImage};

/// Hue rotation speed of the test pattern, in degrees per second
const DEGREES_PER_SECOND: f32 = 36.;

/// Rainbow moving across the screen, used when no real capture backend is available
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    started: Instant,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            started: Instant::now(),
        }
    }

    /// Render the pattern as it looks after `elapsed`
    pub fn render(&self, elapsed: Duration) -> RawImage {
        let phase = elapsed.as_secs_f32() * DEGREES_PER_SECOND;
        let width = self.width as usize;

        let row: Vec<u8> = (0..width)
            .flat_map(|x| {
                let hue = phase + 360. * x as f32 / width as f32;
                let hsv: Hsv = Hsv::new(hue, 1.0, 1.0);
                let rgb: Srgb = Srgb::from_color(hsv);
                let (r, g, b) = rgb.into_format::<u8>().into_components();
                [r, g, b]
            })
            .collect();

        let mut data = Vec::with_capacity(row.len() * self.height as usize);
        for _ in 0..self.height {
            data.extend_from_slice(&row);
        }

        RawImage::new(data, self.width, self.height, PixelFormat::Rgb)
            .unwrap_or_else(|_| RawImage::solid(self.width, self.height, Default::default()))
    }
}

#[async_trait]
impl FrameSource for TestPattern {
    async fn grab(&self) -> Result<RawImage, CaptureError> {
        let elapsed = self.started.elapsed();
        let pattern = self.clone();

        Ok(tokio::task::spawn_blocking(move || pattern.render(elapsed)).await?)
    }

    fn name(&self) -> &str {
        "test pattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_moves() {
        let pattern = TestPattern::new(32, 8);

        let a = pattern.render(Duration::from_secs(0));
        let b = pattern.render(Duration::from_secs(2));

        assert_eq!(a.width(), 32);
        assert_eq!(a.height(), 8);
        assert_ne!(a.color_at(0, 0), b.color_at(0, 0));

        // Every row is identical
        assert_eq!(a.color_at(5, 0), a.color_at(5, 7));
    }

    #[tokio::test]
    async fn grab_frame() {
        let pattern = TestPattern::new(16, 9);
        let frame = pattern.grab().await.unwrap();
        assert_eq!(frame.width(), 16);
    }
}
