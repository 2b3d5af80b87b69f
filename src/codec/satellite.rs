use crate::color::{Color, BLACK};
use crate::geometry::{LedMatrix, Zone};
use crate::models::{Satellite, SatelliteZone};

/// Frame positions driven by a single satellite
#[derive(Debug, Clone)]
pub struct SatelliteSlice {
    pub satellite: Satellite,
    positions: Vec<usize>,
}

impl SatelliteSlice {
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// LED count of the satellite strip
    pub fn led_count(&self) -> usize {
        self.satellite
            .led_count
            .map(|n| n as usize)
            .unwrap_or_else(|| self.positions.len())
    }

    /// Extract the sub-frame of this satellite
    pub fn extract(&self, colors: &[Color]) -> Vec<Color> {
        let mut out: Vec<_> = self
            .positions
            .iter()
            .map(|&i| colors.get(i).copied().unwrap_or(BLACK))
            .collect();

        if self.satellite.reverse {
            out.reverse();
        }

        resample(&out, self.led_count())
    }
}

/// Precomputed satellite ranges for a LED matrix
#[derive(Debug, Clone, Default)]
pub struct SatelliteMap {
    slices: Vec<SatelliteSlice>,
}

impl SatelliteMap {
    pub fn new(satellites: &[Satellite], matrix: &LedMatrix) -> Self {
        Self {
            slices: satellites
                .iter()
                .map(|satellite| SatelliteSlice {
                    satellite: satellite.clone(),
                    positions: zone_positions(satellite.zone, matrix),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slices(&self) -> &[SatelliteSlice] {
        &self.slices
    }

    /// Split a frame into one sub-frame per satellite
    pub fn split<'s>(&'s self, colors: &[Color]) -> Vec<(&'s Satellite, Vec<Color>)> {
        self.slices
            .iter()
            .map(|slice| (&slice.satellite, slice.extract(colors)))
            .collect()
    }
}

/// Positions of a satellite zone in the frame
///
/// Horizontal zones are ordered left to right, vertical zones top to bottom.
fn zone_positions(zone: SatelliteZone, matrix: &LedMatrix) -> Vec<usize> {
    let top = || {
        let mut top = matrix.zone_positions(Zone::Top);
        top.reverse();
        top
    };

    let bottom = || {
        let mut bottom = matrix.zone_positions(Zone::BottomLeft);
        bottom.extend(matrix.zone_positions(Zone::BottomRight));
        bottom.extend(matrix.zone_positions(Zone::Bottom));
        bottom
    };

    match zone {
        SatelliteZone::Top => top(),
        SatelliteZone::TopLeft => third(top(), 0),
        SatelliteZone::TopCenter => third(top(), 1),
        SatelliteZone::TopRight => third(top(), 2),
        SatelliteZone::Left => matrix.zone_positions(Zone::Left),
        SatelliteZone::Right => {
            let mut right = matrix.zone_positions(Zone::Right);
            right.reverse();
            right
        }
        SatelliteZone::Bottom => bottom(),
        SatelliteZone::BottomLeft => third(bottom(), 0),
        SatelliteZone::BottomCenter => third(bottom(), 1),
        SatelliteZone::BottomRight => third(bottom(), 2),
        SatelliteZone::Entire => (0..matrix.len()).collect(),
    }
}

fn third(positions: Vec<usize>, index: usize) -> Vec<usize> {
    let n = positions.len();
    let start = n * index / 3;
    let end = n * (index + 1) / 3;
    positions[start..end].to_vec()
}

/// Nearest-neighbour resampling of a strip to `len` LEDs
pub fn resample(colors: &[Color], len: usize) -> Vec<Color> {
    if colors.len() == len {
        return colors.to_vec();
    }

    if colors.is_empty() {
        return vec![BLACK; len];
    }

    (0..len)
        .map(|i| colors[i * colors.len() / len])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ScreenSize, ToLedMatrix};
    use crate::models::{AspectRatio, LedLayout};

    fn satellite(zone: SatelliteZone) -> Satellite {
        Satellite {
            address: "10.0.0.9:4210".to_owned(),
            zone,
            led_count: None,
            reverse: false,
        }
    }

    fn matrix(split: bool) -> LedMatrix {
        LedLayout {
            top: 9,
            left: 4,
            right: 4,
            bottom_row: 6,
            bottom_left: 3,
            bottom_right: 3,
            split_bottom_row: split,
            ..Default::default()
        }
        .to_matrix(ScreenSize::new(1920, 1080), AspectRatio::Fullscreen)
        .unwrap()
    }

    #[test]
    fn top_thirds() {
        let matrix = matrix(false);
        // bottom 0..6, right 6..10, top 10..19, left 19..23
        let colors: Vec<_> = (0..matrix.len()).map(|i| Color::new(i as u8, 0, 0)).collect();

        let map = SatelliteMap::new(
            &[
                satellite(SatelliteZone::TopLeft),
                satellite(SatelliteZone::TopCenter),
                satellite(SatelliteZone::TopRight),
            ],
            &matrix,
        );

        let red = |frame: &[Color]| frame.iter().map(|c| c.red).collect::<Vec<_>>();
        let split = map.split(&colors);

        assert_eq!(red(&split[0].1), vec![18, 17, 16]);
        assert_eq!(red(&split[1].1), vec![15, 14, 13]);
        assert_eq!(red(&split[2].1), vec![12, 11, 10]);
    }

    #[test]
    fn split_bottom_and_sides() {
        let matrix = matrix(true);
        // bottom right 0..3, right 3..7, top 7..16, left 16..20, bottom left 20..23
        let map = SatelliteMap::new(
            &[
                satellite(SatelliteZone::Bottom),
                satellite(SatelliteZone::Right),
                satellite(SatelliteZone::Entire),
            ],
            &matrix,
        );

        assert_eq!(map.slices()[0].positions(), &[20, 21, 22, 0, 1, 2]);
        assert_eq!(map.slices()[1].positions(), &[6, 5, 4, 3]);
        assert_eq!(map.slices()[2].positions().len(), 23);
    }

    #[test]
    fn reverse_and_resample() {
        let matrix = matrix(false);
        let colors: Vec<_> = (0..matrix.len()).map(|i| Color::new(i as u8, 0, 0)).collect();

        let mut left = satellite(SatelliteZone::Left);
        left.reverse = true;
        left.led_count = Some(8);

        let map = SatelliteMap::new(&[left], &matrix);
        let (_, frame) = map.split(&colors).remove(0);

        assert_eq!(
            frame.iter().map(|c| c.red).collect::<Vec<_>>(),
            vec![22, 22, 21, 21, 20, 20, 19, 19]
        );
    }

    #[test]
    fn resample_edges() {
        assert_eq!(resample(&[], 2), vec![BLACK; 2]);
        assert_eq!(
            resample(&[Color::new(1, 0, 0), Color::new(2, 0, 0), Color::new(3, 0, 0), Color::new(4, 0, 0)], 2),
            vec![Color::new(1, 0, 0), Color::new(3, 0, 0)]
        );
    }
}
