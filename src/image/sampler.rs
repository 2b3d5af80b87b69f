use crate::color::{Color, GammaTable};
use crate::geometry::{LedCoordinate, LedMatrix};
use crate::models::{Capture, ColorSettings};

use super::RawImage;

/// Reduces LED sample areas to a single gamma-corrected color
#[derive(Debug, Clone)]
pub struct Sampler {
    grid: u32,
    skip_margin: u32,
    gamma: GammaTable,
}

impl Sampler {
    pub fn new(grid: u32, skip_margin: u32, gamma: f32) -> Self {
        Self {
            grid: grid.max(1),
            skip_margin,
            gamma: GammaTable::new(gamma),
        }
    }

    pub fn from_settings(capture: &Capture, color: &ColorSettings) -> Self {
        Self::new(capture.sample_grid, capture.skip_margin, color.gamma)
    }

    pub fn gamma(&self) -> f32 {
        self.gamma.gamma()
    }

    /// Sample positions along one axis of a LED area
    fn axis(&self, start: u32, len: u32) -> impl Iterator<Item = u32> {
        let len = len.max(1);
        // Small areas would be skipped entirely with the full margin
        let margin = self.skip_margin.min(len / 4);
        let inner = len - 2 * margin;
        let first = start + margin;
        let grid = self.grid;

        (0..grid).map(move |i| {
            if grid == 1 {
                first + inner / 2
            } else {
                first + i * (inner - 1) / (grid - 1)
            }
        })
    }

    pub fn sample(&self, image: &RawImage, led: &LedCoordinate) -> Color {
        let mut r_acc = 0u32;
        let mut g_acc = 0u32;
        let mut b_acc = 0u32;
        let mut cnt = 0u32;

        for y in self.axis(led.y, led.height) {
            for x in self.axis(led.x, led.width) {
                let (r, g, b) = image.color_at_clamped(x, y).into_components();
                r_acc += r as u32;
                g_acc += g as u32;
                b_acc += b as u32;
                cnt += 1;
            }
        }

        let cnt = cnt.max(1);
        self.gamma.apply(Color::new(
            (r_acc / cnt) as u8,
            (g_acc / cnt) as u8,
            (b_acc / cnt) as u8,
        ))
    }

    /// Sample every LED of a matrix, in index order
    pub fn sample_frame(&self, image: &RawImage, matrix: &LedMatrix) -> Vec<Color> {
        matrix
            .coordinates()
            .iter()
            .map(|led| self.sample(image, led))
            .collect()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::from_settings(&Capture::default(), &ColorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use super::*;
    use crate::geometry::{ScreenSize, ToLedMatrix, Zone};
    use crate::models::{AspectRatio, LedLayout};

    lazy_static::lazy_static! {
        static ref BASE_COLORS: [Color; 8] = [
            Color::new(0, 0, 0),
            Color::new(255, 255, 255),
            Color::new(255, 0, 0),
            Color::new(0, 255, 0),
            Color::new(0, 0, 255),
            Color::new(255, 255, 0),
            Color::new(0, 255, 255),
            Color::new(255, 0, 255),
        ];
    }

    fn led(x: u32, y: u32, width: u32, height: u32) -> LedCoordinate {
        LedCoordinate {
            x,
            y,
            width,
            height,
            zone: Zone::Top,
            grouped: false,
        }
    }

    #[test]
    fn solid_frame() {
        let sampler = Sampler::new(6, 10, 1.0);
        let image = RawImage::solid(64, 64, Color::new(10, 20, 30));

        assert_eq!(
            sampler.sample(&image, &led(0, 0, 64, 64)),
            Color::new(10, 20, 30)
        );

        let sampler = Sampler::new(6, 10, 2.2);
        assert_eq!(
            sampler.sample(&image, &led(0, 0, 64, 64)),
            GammaTable::new(2.2).apply(Color::new(10, 20, 30))
        );
    }

    #[test]
    fn gamma_keeps_extremes() {
        let sampler = Sampler::default();

        for &color in &*BASE_COLORS {
            let image = RawImage::solid(32, 32, color);
            assert_eq!(sampler.sample(&image, &led(0, 0, 32, 32)), color);
        }
    }

    #[test]
    fn averages_channels() {
        // Left half black, right half white
        let mut data = Vec::new();
        for _y in 0..4 {
            for x in 0..4 {
                let v = if x < 2 { 0 } else { 200 };
                data.extend_from_slice(&[v, v, v]);
            }
        }

        let image = RawImage::try_from((data, 4, 4)).unwrap();
        let sampler = Sampler::new(2, 0, 1.0);

        assert_eq!(
            sampler.sample(&image, &led(0, 0, 4, 4)),
            Color::new(100, 100, 100)
        );
    }

    #[test]
    fn clamps_to_buffer() {
        let sampler = Sampler::new(6, 10, 1.0);
        let image = RawImage::solid(8, 8, Color::new(1, 2, 3));

        assert_eq!(
            sampler.sample(&image, &led(100, 100, 50, 50)),
            Color::new(1, 2, 3)
        );
        assert_eq!(sampler.sample(&image, &led(7, 7, 1, 1)), Color::new(1, 2, 3));
    }

    #[test]
    fn deterministic() {
        let mut data = Vec::with_capacity(320 * 180 * 3);
        for i in 0..(320 * 180 * 3) {
            data.push((i * 31 % 251) as u8);
        }

        let image = RawImage::try_from((data, 320, 180)).unwrap();
        let matrix = LedLayout::default()
            .to_matrix(ScreenSize::new(320, 180), AspectRatio::Fullscreen)
            .unwrap();

        let sampler = Sampler::default();
        let first = sampler.sample_frame(&image, &matrix);
        let second = sampler.sample_frame(&image, &matrix);

        assert_eq!(first.len(), matrix.len());
        assert_eq!(first, second);
    }
}
