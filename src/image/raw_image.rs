use std::convert::TryFrom;

use thiserror::Error;

use crate::color::Color;

#[derive(Debug, Clone, Error)]
pub enum RawImageError {
    #[error("invalid data ({data} bytes) for the given dimensions ({width} x {height} x {channels} = {expected})")]
    InvalidData {
        data: usize,
        width: usize,
        height: usize,
        channels: usize,
        expected: usize,
    },
    #[error("invalid image dimensions ({width} x {height})")]
    InvalidDimensions { width: usize, height: usize },
}

/// Byte layout of a pixel in a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Rgba,
    /// Common layout of desktop duplication buffers
    Bgra,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
        }
    }
}

/// Raw frame buffer handed over by a frame source
#[derive(Clone)]
pub struct RawImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
    format: PixelFormat,
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("RawImage");
        f.field("width", &self.width);
        f.field("height", &self.height);
        f.field("format", &self.format);

        if self.data.len() > 32 {
            f.field("data", &format!("[{} bytes]", self.data.len()));
        } else {
            f.field("data", &self.data);
        }

        f.finish()
    }
}

impl RawImage {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, RawImageError> {
        let channels = format.channels();
        let width = width as usize;
        let height = height as usize;
        let expected = width * height * channels;

        if width == 0 || height == 0 {
            return Err(RawImageError::InvalidDimensions { width, height });
        }

        if data.len() != expected {
            return Err(RawImageError::InvalidData {
                data: data.len(),
                width,
                height,
                channels,
                expected,
            });
        }

        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Create an image filled with a single color
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let (r, g, b) = color.into_components();
        let width = width.max(1) as usize;
        let height = height.max(1) as usize;
        let data = [r, g, b]
            .iter()
            .copied()
            .cycle()
            .take(width * height * 3)
            .collect();

        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb,
        }
    }

    pub fn width(&self) -> u32 {
        self.width as _
    }

    pub fn height(&self) -> u32 {
        self.height as _
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Get the color of a pixel, clamping the coordinates to the image bounds
    pub fn color_at_clamped(&self, x: u32, y: u32) -> Color {
        let x = (x as usize).min(self.width - 1);
        let y = (y as usize).min(self.height - 1);
        let idx = (y * self.width + x) * self.format.channels();
        let px = &self.data[idx..idx + self.format.channels()];

        match self.format {
            PixelFormat::Rgb | PixelFormat::Rgba => Color::new(px[0], px[1], px[2]),
            PixelFormat::Bgra => Color::new(px[2], px[1], px[0]),
        }
    }

    pub fn color_at(&self, x: u32, y: u32) -> Option<Color> {
        if (x as usize) < self.width && (y as usize) < self.height {
            Some(self.color_at_clamped(x, y))
        } else {
            None
        }
    }
}

impl TryFrom<(Vec<u8>, u32, u32)> for RawImage {
    type Error = RawImageError;

    fn try_from((data, width, height): (Vec<u8>, u32, u32)) -> Result<Self, Self::Error> {
        Self::new(data, width, height, PixelFormat::Rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(
            RawImage::try_from((vec![0u8; 10], 2, 2)),
            Err(RawImageError::InvalidData { expected: 12, .. })
        ));

        assert!(matches!(
            RawImage::new(vec![], 0, 2, PixelFormat::Rgba),
            Err(RawImageError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn pixel_formats() {
        let rgba = RawImage::new(vec![1, 2, 3, 255], 1, 1, PixelFormat::Rgba).unwrap();
        assert_eq!(rgba.color_at(0, 0), Some(Color::new(1, 2, 3)));

        let bgra = RawImage::new(vec![1, 2, 3, 255], 1, 1, PixelFormat::Bgra).unwrap();
        assert_eq!(bgra.color_at(0, 0), Some(Color::new(3, 2, 1)));
        assert_eq!(bgra.color_at(1, 0), None);
    }

    #[test]
    fn clamped_access() {
        let image = RawImage::try_from((vec![0, 0, 0, 9, 9, 9], 2, 1)).unwrap();
        assert_eq!(image.color_at_clamped(100, 100), Color::new(9, 9, 9));
    }
}
