use super::ScreenSize;
use crate::models::AspectRatio;

/// Height of the letterbox bars, as a divisor of the screen height
pub const LETTERBOX_RATIO: u32 = 8;

/// Standard monitor shapes used to pick a pillarbox border
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorShape {
    Standard,
    Wide,
    UltraWide,
    SuperUltraWide,
}

impl MonitorShape {
    const SHAPES: [(MonitorShape, f64); 4] = [
        (MonitorShape::Standard, 4. / 3.),
        (MonitorShape::Wide, 16. / 9.),
        (MonitorShape::UltraWide, 21. / 9.),
        (MonitorShape::SuperUltraWide, 32. / 9.),
    ];

    /// Find the standard shape closest to the given screen
    pub fn detect(screen: ScreenSize) -> Self {
        let ratio = screen.width as f64 / screen.height.max(1) as f64;

        Self::SHAPES
            .iter()
            .min_by(|(_, a), (_, b)| {
                (ratio - a)
                    .abs()
                    .partial_cmp(&(ratio - b).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(shape, _)| *shape)
            .unwrap_or(MonitorShape::Wide)
    }

    /// Width of each pillarbox bar for this monitor shape
    fn pillarbox_border(&self, screen: ScreenSize) -> u32 {
        let w = screen.width as u64;
        let h = screen.height as u64;

        let border = match self {
            // No narrower standard content, keep a thin margin
            MonitorShape::Standard => w / 10,
            // 4:3 content
            MonitorShape::Wide => w.saturating_sub(h * 4 / 3) / 2,
            // 16:9 content
            MonitorShape::UltraWide => w.saturating_sub(h * 16 / 9) / 2,
            MonitorShape::SuperUltraWide => w / 4,
        };

        border as u32
    }
}

/// Black bars ignored by the sampler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Border {
    /// Height of the top and bottom bars
    pub horizontal: u32,
    /// Width of the left and right bars
    pub vertical: u32,
}

impl Border {
    pub fn for_mode(screen: ScreenSize, aspect_ratio: AspectRatio) -> Self {
        match aspect_ratio {
            AspectRatio::Fullscreen => Self::default(),
            AspectRatio::Letterbox => Self {
                horizontal: screen.height / LETTERBOX_RATIO,
                vertical: 0,
            },
            AspectRatio::Pillarbox => Self {
                horizontal: 0,
                vertical: MonitorShape::detect(screen).pillarbox_border(screen),
            },
        }
    }
}

/// Usable screen area once the borders are removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Area {
    pub fn new(screen: ScreenSize, border: Border) -> Option<Self> {
        let x0 = border.vertical;
        let y0 = border.horizontal;
        let x1 = screen.width.checked_sub(border.vertical)?;
        let y1 = screen.height.checked_sub(border.horizontal)?;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self { x0, y0, x1, y1 })
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_shapes() {
        assert_eq!(
            MonitorShape::detect(ScreenSize::new(1024, 768)),
            MonitorShape::Standard
        );
        assert_eq!(
            MonitorShape::detect(ScreenSize::new(1920, 1080)),
            MonitorShape::Wide
        );
        assert_eq!(
            MonitorShape::detect(ScreenSize::new(3440, 1440)),
            MonitorShape::UltraWide
        );
        assert_eq!(
            MonitorShape::detect(ScreenSize::new(5120, 1440)),
            MonitorShape::SuperUltraWide
        );
    }

    #[test]
    fn borders() {
        let screen = ScreenSize::new(1920, 1080);

        assert_eq!(
            Border::for_mode(screen, AspectRatio::Fullscreen),
            Border::default()
        );
        assert_eq!(
            Border::for_mode(screen, AspectRatio::Letterbox),
            Border {
                horizontal: 135,
                vertical: 0
            }
        );
        // 4:3 content on a 16:9 screen: (1920 - 1440) / 2
        assert_eq!(
            Border::for_mode(screen, AspectRatio::Pillarbox),
            Border {
                horizontal: 0,
                vertical: 240
            }
        );
        // 16:9 content on a 21:9 screen: (3440 - 2560) / 2
        assert_eq!(
            Border::for_mode(ScreenSize::new(3440, 1440), AspectRatio::Pillarbox).vertical,
            440
        );
    }

    #[test]
    fn area() {
        let area = Area::new(
            ScreenSize::new(100, 50),
            Border {
                horizontal: 5,
                vertical: 10,
            },
        )
        .unwrap();

        assert_eq!(area.width(), 80);
        assert_eq!(area.height(), 40);

        assert!(Area::new(
            ScreenSize::new(100, 50),
            Border {
                horizontal: 25,
                vertical: 0
            }
        )
        .is_none());
    }
}
