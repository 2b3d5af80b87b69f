use serde_derive::{Deserialize, Serialize};

mod utils;
pub use utils::*;

pub type Color = palette::rgb::LinSrgb<u8>;

pub const BLACK: Color = Color::new(0, 0, 0);

/// Default gamma applied to sampled colors
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Precomputed gamma correction table
///
/// Maps every 8-bit input value to `255 * (v / 255) ^ gamma`.
#[derive(Clone)]
pub struct GammaTable {
    gamma: f32,
    table: [u8; 256],
}

impl GammaTable {
    pub fn new(gamma: f32) -> Self {
        let mut table = [0u8; 256];
        for (v, out) in table.iter_mut().enumerate() {
            *out = gamma_correct(v as u8, gamma);
        }

        Self { gamma, table }
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn apply(&self, color: Color) -> Color {
        let (r, g, b) = color.into_components();
        Color::new(
            self.table[r as usize],
            self.table[g as usize],
            self.table[b as usize],
        )
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::new(DEFAULT_GAMMA)
    }
}

impl std::fmt::Debug for GammaTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GammaTable")
            .field("gamma", &self.gamma)
            .finish()
    }
}

/// Apply gamma correction to a single 8-bit channel value
pub fn gamma_correct(x: u8, gamma: f32) -> u8 {
    (255.0 * (x as f32 / 255.0).powf(gamma))
        .round()
        .clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    Rgb,
    Bgr,
    Rbg,
    Brg,
    Gbr,
    Grb,
}

impl ColorOrder {
    pub fn reorder_from_rgb(&self, color: Color) -> Color {
        let (r, g, b) = color.into_components();

        Color::from_components(match self {
            ColorOrder::Rgb => (r, g, b),
            ColorOrder::Bgr => (b, g, r),
            ColorOrder::Rbg => (r, b, g),
            ColorOrder::Brg => (b, r, g),
            ColorOrder::Gbr => (g, b, r),
            ColorOrder::Grb => (g, r, b),
        })
    }
}

impl Default for ColorOrder {
    fn default() -> Self {
        Self::Rgb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamma_extremes_are_fixed_points() {
        for &gamma in &[0.1f32, 0.5, 1.0, 1.8, 2.2, 3.0, 5.0] {
            assert_eq!(gamma_correct(0, gamma), 0);
            assert_eq!(gamma_correct(255, gamma), 255);

            let table = GammaTable::new(gamma);
            assert_eq!(table.apply(BLACK), BLACK);
            assert_eq!(
                table.apply(Color::new(255, 255, 255)),
                Color::new(255, 255, 255)
            );
        }
    }

    #[test]
    fn gamma_darkens_midtones() {
        let table = GammaTable::new(2.2);
        let out = table.apply(Color::new(128, 64, 200));
        assert!(out.red < 128);
        assert!(out.green < 64);
        assert!(out.blue < 200);

        // Identity gamma
        let table = GammaTable::new(1.0);
        assert_eq!(table.apply(Color::new(128, 64, 200)), Color::new(128, 64, 200));
    }

    #[test]
    fn color_order() {
        let c = Color::new(1, 2, 3);
        assert_eq!(ColorOrder::Rgb.reorder_from_rgb(c), Color::new(1, 2, 3));
        assert_eq!(ColorOrder::Grb.reorder_from_rgb(c), Color::new(2, 1, 3));
        assert_eq!(ColorOrder::Bgr.reorder_from_rgb(c), Color::new(3, 2, 1));
    }
}
