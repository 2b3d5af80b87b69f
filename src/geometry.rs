//! LED position geometry
//!
//! Turns a [LedLayout](crate::models::LedLayout) and a screen size into the ordered list of
//! rectangles sampled for every LED. Index assignment is stable: it starts on the bottom
//! edge and goes around the screen (bottom, right, top, left), so that orientation and
//! start offset can be applied later on the color arrays.

use parse_display::Display;
use strum_macros::{EnumString, IntoStaticStr};
use thiserror::Error;

use crate::models::AspectRatio;

mod aspect;
pub use aspect::*;

mod cache;
pub use cache::*;

mod layout;
pub use layout::*;

mod orientation;
pub use orientation::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Zone {
    Top,
    Left,
    Right,
    Bottom,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{width}x{height}")]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Sample area of a single LED, in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedCoordinate {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub zone: Zone,
    /// `true` for LEDs which repeat the color of the previous LED of their group
    pub grouped: bool,
}

/// Ordered mapping from LED index (starting at 1) to its sample area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedMatrix {
    leds: Vec<LedCoordinate>,
}

impl LedMatrix {
    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    /// Get the LED at the given 1-based index
    pub fn get(&self, index: usize) -> Option<&LedCoordinate> {
        index.checked_sub(1).and_then(|i| self.leds.get(i))
    }

    /// Iterate over `(index, coordinate)` pairs, indices starting at 1
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LedCoordinate)> {
        self.leds.iter().enumerate().map(|(i, led)| (i + 1, led))
    }

    pub fn coordinates(&self) -> &[LedCoordinate] {
        &self.leds
    }

    /// 0-based positions in the color array of the LEDs of a zone, in traversal order
    pub fn zone_positions(&self, zone: Zone) -> Vec<usize> {
        self.leds
            .iter()
            .enumerate()
            .filter(|(_, led)| led.zone == zone)
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<Vec<LedCoordinate>> for LedMatrix {
    fn from(leds: Vec<LedCoordinate>) -> Self {
        Self { leds }
    }
}

/// One matrix per aspect ratio mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedMatrices {
    fullscreen: LedMatrix,
    letterbox: LedMatrix,
    pillarbox: LedMatrix,
}

impl LedMatrices {
    pub fn get(&self, aspect_ratio: AspectRatio) -> &LedMatrix {
        match aspect_ratio {
            AspectRatio::Fullscreen => &self.fullscreen,
            AspectRatio::Letterbox => &self.letterbox,
            AspectRatio::Pillarbox => &self.pillarbox,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("no LEDs configured")]
    NoLeds,
    #[error("invalid screen size {0}")]
    InvalidScreen(ScreenSize),
    #[error("group-by factor must be at least 1")]
    InvalidGroupBy,
    #[error("sample area is empty for {aspect_ratio} mode on a {screen} screen")]
    EmptyArea {
        aspect_ratio: AspectRatio,
        screen: ScreenSize,
    },
    #[error("zone {zone} is too small for {leds} LEDs ({span} pixels available)")]
    DegenerateZone { zone: Zone, span: u32, leds: u32 },
    #[error("grab area depth of zone {zone} is zero")]
    DegenerateDepth { zone: Zone },
}
