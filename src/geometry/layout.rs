use super::{Area, Border, GeometryError, LedCoordinate, LedMatrices, LedMatrix, ScreenSize, Zone};
use crate::models::{AspectRatio, LedLayout};

/// Trait for converting a LED layout to sample areas
pub trait ToLedMatrix {
    fn to_matrix(
        &self,
        screen: ScreenSize,
        aspect_ratio: AspectRatio,
    ) -> Result<LedMatrix, GeometryError>;

    fn to_matrices(&self, screen: ScreenSize) -> Result<LedMatrices, GeometryError> {
        Ok(LedMatrices {
            fullscreen: self.to_matrix(screen, AspectRatio::Fullscreen)?,
            letterbox: self.to_matrix(screen, AspectRatio::Letterbox)?,
            pillarbox: self.to_matrix(screen, AspectRatio::Pillarbox)?,
        })
    }
}

impl ToLedMatrix for LedLayout {
    fn to_matrix(
        &self,
        screen: ScreenSize,
        aspect_ratio: AspectRatio,
    ) -> Result<LedMatrix, GeometryError> {
        if self.total() == 0 {
            return Err(GeometryError::NoLeds);
        }

        if screen.width == 0 || screen.height == 0 {
            return Err(GeometryError::InvalidScreen(screen));
        }

        if self.group_by == 0 {
            return Err(GeometryError::InvalidGroupBy);
        }

        let area = Area::new(screen, Border::for_mode(screen, aspect_ratio)).ok_or(
            GeometryError::EmptyArea {
                aspect_ratio,
                screen,
            },
        )?;

        ZoneWalker::new(self, screen, area).walk()
    }
}

/// Per-LED distance rounding
#[derive(Debug, Clone, Copy)]
enum Step {
    /// `floor(span / n)`
    Floor,
    /// `round(span / 2n)`, used by the two halves of a split bottom row
    HalfRound,
}

impl Step {
    fn distance(self, zone: Zone, span: u32, leds: u32) -> Result<u32, GeometryError> {
        let distance = match self {
            Step::Floor => span / leds,
            Step::HalfRound => (span as f64 / (2 * leds) as f64).round() as u32,
        };

        if distance == 0 {
            Err(GeometryError::DegenerateZone { zone, span, leds })
        } else {
            Ok(distance)
        }
    }
}

/// Rectangle before clamping to the screen bounds
#[derive(Debug, Clone, Copy)]
struct Rect {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

fn percent(value: u32, pct: u32) -> u32 {
    (value as u64 * pct as u64 / 100) as u32
}

struct ZoneWalker<'l> {
    layout: &'l LedLayout,
    screen: ScreenSize,
    area: Area,
    depth_top_bottom: u32,
    depth_sides: u32,
    gap_top_bottom: u32,
    gap_sides: u32,
    leds: Vec<LedCoordinate>,
}

impl<'l> ZoneWalker<'l> {
    fn new(layout: &'l LedLayout, screen: ScreenSize, area: Area) -> Self {
        Self {
            layout,
            screen,
            area,
            depth_top_bottom: percent(area.height(), layout.grab_top_bottom),
            depth_sides: percent(area.width(), layout.grab_sides),
            gap_top_bottom: percent(area.width(), layout.gap_top_bottom),
            gap_sides: percent(area.height(), layout.gap_sides),
            leds: Vec::with_capacity(layout.total()),
        }
    }

    fn walk(mut self) -> Result<LedMatrix, GeometryError> {
        if self.layout.split_bottom_row {
            self.bottom_right()?;
        } else {
            self.bottom()?;
        }

        self.right()?;
        self.top()?;
        self.left()?;

        if self.layout.split_bottom_row {
            self.bottom_left()?;
        }

        debug_assert_eq!(self.leds.len(), self.layout.total());
        Ok(self.leds.into())
    }

    fn grouped(&self, count: u32) -> u32 {
        (count + self.layout.group_by - 1) / self.layout.group_by
    }

    fn depth(&self, zone: Zone) -> Result<i64, GeometryError> {
        let depth = match zone {
            Zone::Left | Zone::Right => self.depth_sides,
            _ => self.depth_top_bottom,
        };

        if depth == 0 {
            Err(GeometryError::DegenerateDepth { zone })
        } else {
            Ok(depth as i64)
        }
    }

    fn horizontal_span(&self) -> u32 {
        self.area.width().saturating_sub(2 * self.gap_top_bottom)
    }

    fn vertical_span(&self) -> u32 {
        self.area.height().saturating_sub(2 * self.gap_sides)
    }

    fn bottom(&mut self) -> Result<(), GeometryError> {
        let count = self.layout.bottom_row;
        let n = self.grouped(count);
        if n == 0 {
            return Ok(());
        }

        let d = Step::Floor.distance(Zone::Bottom, self.horizontal_span(), n)? as i64;
        let depth = self.depth(Zone::Bottom)?;
        let x0 = (self.area.x0 + self.gap_top_bottom) as i64;
        let y = self.area.y1 as i64 - depth;

        self.emit(
            Zone::Bottom,
            count,
            (0..n as i64).map(|i| Rect {
                x: x0 + i * d,
                y,
                width: d,
                height: depth,
            }),
        );

        Ok(())
    }

    fn bottom_right(&mut self) -> Result<(), GeometryError> {
        let count = self.layout.bottom_right;
        let n = self.grouped(count);
        if n == 0 {
            return Ok(());
        }

        let span = self.horizontal_span();
        let d = Step::HalfRound.distance(Zone::BottomRight, span, n)? as i64;
        let depth = self.depth(Zone::BottomRight)?;
        let x0 = (self.area.x0 + self.gap_top_bottom + span / 2) as i64;
        let y = self.area.y1 as i64 - depth;

        self.emit(
            Zone::BottomRight,
            count,
            (0..n as i64).map(|i| Rect {
                x: x0 + i * d,
                y,
                width: d,
                height: depth,
            }),
        );

        Ok(())
    }

    fn bottom_left(&mut self) -> Result<(), GeometryError> {
        let count = self.layout.bottom_left;
        let n = self.grouped(count);
        if n == 0 {
            return Ok(());
        }

        let d = Step::HalfRound.distance(Zone::BottomLeft, self.horizontal_span(), n)? as i64;
        let depth = self.depth(Zone::BottomLeft)?;
        let x0 = (self.area.x0 + self.gap_top_bottom) as i64;
        let y = self.area.y1 as i64 - depth;

        self.emit(
            Zone::BottomLeft,
            count,
            (0..n as i64).map(|i| Rect {
                x: x0 + i * d,
                y,
                width: d,
                height: depth,
            }),
        );

        Ok(())
    }

    fn right(&mut self) -> Result<(), GeometryError> {
        let count = self.layout.right;
        let n = self.grouped(count);
        if n == 0 {
            return Ok(());
        }

        let d = Step::Floor.distance(Zone::Right, self.vertical_span(), n)? as i64;
        let depth = self.depth(Zone::Right)?;
        let x = self.area.x1 as i64 - depth;
        let y1 = (self.area.y1 - self.gap_sides) as i64;

        self.emit(
            Zone::Right,
            count,
            (0..n as i64).map(|i| Rect {
                x,
                y: y1 - (i + 1) * d,
                width: depth,
                height: d,
            }),
        );

        Ok(())
    }

    fn top(&mut self) -> Result<(), GeometryError> {
        let count = self.layout.top;
        let n = self.grouped(count);
        if n == 0 {
            return Ok(());
        }

        let d = Step::Floor.distance(Zone::Top, self.horizontal_span(), n)? as i64;
        let depth = self.depth(Zone::Top)?;
        let x1 = (self.area.x1 - self.gap_top_bottom) as i64;
        let y = self.area.y0 as i64;

        self.emit(
            Zone::Top,
            count,
            (0..n as i64).map(|i| Rect {
                x: x1 - (i + 1) * d,
                y,
                width: d,
                height: depth,
            }),
        );

        Ok(())
    }

    fn left(&mut self) -> Result<(), GeometryError> {
        let count = self.layout.left;
        let n = self.grouped(count);
        if n == 0 {
            return Ok(());
        }

        let d = Step::Floor.distance(Zone::Left, self.vertical_span(), n)? as i64;
        let depth = self.depth(Zone::Left)?;
        let x = self.area.x0 as i64;
        let y0 = (self.area.y0 + self.gap_sides) as i64;

        self.emit(
            Zone::Left,
            count,
            (0..n as i64).map(|i| Rect {
                x,
                y: y0 + i * d,
                width: depth,
                height: d,
            }),
        );

        Ok(())
    }

    /// Clamp a rectangle to the raw pixel bounds
    fn clamp(&self, rect: Rect, zone: Zone) -> LedCoordinate {
        let sw = self.screen.width as i64;
        let sh = self.screen.height as i64;

        let x = rect.x.clamp(0, sw - 1);
        let y = rect.y.clamp(0, sh - 1);
        let width = rect.width.min(sw - x).max(1);
        let height = rect.height.min(sh - y).max(1);

        LedCoordinate {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
            zone,
            grouped: false,
        }
    }

    /// Replicate every rectangle `group_by` times, then pad with the last one up to `count`
    fn emit(&mut self, zone: Zone, count: u32, rects: impl Iterator<Item = Rect>) {
        let count = count as usize;
        let start = self.leds.len();
        let group_by = self.layout.group_by as usize;

        'rects: for rect in rects {
            let led = self.clamp(rect, zone);

            for k in 0..group_by {
                if self.leds.len() - start == count {
                    break 'rects;
                }

                self.leds.push(LedCoordinate {
                    grouped: k > 0,
                    ..led
                });
            }
        }

        while self.leds.len() - start < count {
            if let Some(last) = self.leds.last().copied() {
                self.leds.push(LedCoordinate {
                    grouped: true,
                    ..last
                });
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(top: u32, left: u32, right: u32, bottom: u32) -> LedLayout {
        LedLayout {
            top,
            left,
            right,
            bottom_row: bottom,
            ..Default::default()
        }
    }

    const HD: ScreenSize = ScreenSize {
        width: 1920,
        height: 1080,
    };

    #[test]
    fn end_to_end_fullscreen() {
        let matrix = layout(10, 10, 10, 20)
            .to_matrix(HD, AspectRatio::Fullscreen)
            .unwrap();

        assert_eq!(matrix.len(), 50);

        let bottom: Vec<_> = matrix
            .iter()
            .take(20)
            .map(|(_, led)| (led.x, led.width, led.zone))
            .collect();

        for (i, (x, width, zone)) in bottom.into_iter().enumerate() {
            assert_eq!(zone, Zone::Bottom);
            assert_eq!(width, 96);
            assert_eq!(x, i as u32 * 96);
        }

        // 8% of 1080
        assert_eq!(matrix.get(1).unwrap().y, 1080 - 86);

        // Right column starts at the bottom
        let first_right = matrix.get(21).unwrap();
        assert_eq!(first_right.zone, Zone::Right);
        assert_eq!(first_right.y, 1080 - 108);

        // Top row starts on the right
        let first_top = matrix.get(31).unwrap();
        assert_eq!(first_top.zone, Zone::Top);
        assert_eq!(first_top.x, 1920 - 192);

        // Left column ends at the bottom
        let last_left = matrix.get(50).unwrap();
        assert_eq!(last_left.zone, Zone::Left);
        assert_eq!(last_left.y, 9 * 108);
        assert!(matrix.get(51).is_none());
        assert!(matrix.get(0).is_none());
    }

    #[test]
    fn totals_are_preserved() {
        for group_by in 1..=7 {
            for &(top, left, right, bottom) in &[
                (10, 10, 10, 20),
                (33, 18, 18, 33),
                (0, 7, 0, 5),
                (1, 0, 0, 0),
                (59, 31, 29, 61),
            ] {
                let mut layout = layout(top, left, right, bottom);
                layout.group_by = group_by;

                for &aspect in &AspectRatio::ALL {
                    let matrix = layout.to_matrix(HD, aspect).unwrap();
                    assert_eq!(matrix.len(), layout.total());

                    let indices: Vec<_> = matrix.iter().map(|(i, _)| i).collect();
                    let expected: Vec<_> = (1..=layout.total()).collect();
                    assert_eq!(indices, expected);

                    for (_, led) in matrix.iter() {
                        assert!(led.width > 0 && led.height > 0);
                        assert!(led.x + led.width <= HD.width);
                        assert!(led.y + led.height <= HD.height);
                    }
                }
            }
        }
    }

    #[test]
    fn grouping_flags() {
        let mut layout = layout(0, 0, 0, 5);
        layout.group_by = 2;

        let matrix = layout.to_matrix(HD, AspectRatio::Fullscreen).unwrap();
        let flags: Vec<_> = matrix.iter().map(|(_, led)| led.grouped).collect();
        assert_eq!(flags, vec![false, true, false, true, false]);

        // Replicas share the sample area of their group leader
        assert_eq!(matrix.get(1).unwrap().x, matrix.get(2).unwrap().x);
        assert_ne!(matrix.get(2).unwrap().x, matrix.get(3).unwrap().x);
    }

    #[test]
    fn split_bottom_row_order() {
        let layout = LedLayout {
            top: 4,
            left: 2,
            right: 2,
            bottom_left: 3,
            bottom_right: 3,
            split_bottom_row: true,
            ..Default::default()
        };

        let matrix = layout.to_matrix(HD, AspectRatio::Fullscreen).unwrap();
        let zones: Vec<_> = matrix.iter().map(|(_, led)| led.zone).collect();

        assert_eq!(&zones[..3], &[Zone::BottomRight; 3]);
        assert_eq!(&zones[3..5], &[Zone::Right; 2]);
        assert_eq!(&zones[5..9], &[Zone::Top; 4]);
        assert_eq!(&zones[9..11], &[Zone::Left; 2]);
        assert_eq!(&zones[11..], &[Zone::BottomLeft; 3]);

        // round(1920 / 6) = 320, bottom right starts at the center
        assert_eq!(matrix.get(1).unwrap().x, 960);
        assert_eq!(matrix.get(1).unwrap().width, 320);
        assert_eq!(matrix.get(12).unwrap().x, 0);
    }

    #[test]
    fn letterbox_moves_rows() {
        let layout = layout(10, 10, 10, 20);
        let fullscreen = layout.to_matrix(HD, AspectRatio::Fullscreen).unwrap();
        let letterbox = layout.to_matrix(HD, AspectRatio::Letterbox).unwrap();

        assert_eq!(fullscreen.get(31).unwrap().y, 0);
        assert_eq!(letterbox.get(31).unwrap().y, 135);
        assert!(letterbox.get(1).unwrap().y + letterbox.get(1).unwrap().height <= 1080 - 135);
    }

    #[test]
    fn degenerate_layouts() {
        assert_eq!(
            layout(0, 0, 0, 0).to_matrix(HD, AspectRatio::Fullscreen),
            Err(GeometryError::NoLeds)
        );

        assert_eq!(
            layout(1, 1, 1, 1).to_matrix(ScreenSize::new(0, 1080), AspectRatio::Fullscreen),
            Err(GeometryError::InvalidScreen(ScreenSize::new(0, 1080)))
        );

        assert!(matches!(
            layout(0, 0, 0, 200).to_matrix(ScreenSize::new(64, 48), AspectRatio::Fullscreen),
            Err(GeometryError::DegenerateZone {
                zone: Zone::Bottom,
                ..
            })
        ));

        let mut shallow = layout(4, 0, 0, 0);
        shallow.grab_top_bottom = 1;
        assert_eq!(
            shallow.to_matrix(ScreenSize::new(64, 48), AspectRatio::Fullscreen),
            Err(GeometryError::DegenerateDepth { zone: Zone::Top })
        );
    }
}
