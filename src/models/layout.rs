use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use validator::Validate;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AspectRatio {
    Fullscreen,
    Letterbox,
    Pillarbox,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Fullscreen,
        AspectRatio::Letterbox,
        AspectRatio::Pillarbox,
    ];
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::Fullscreen
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Orientation {
    Clockwise,
    Anticlockwise,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::Clockwise
    }
}

/// LED strip layout around the screen
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
#[validate(schema(function = "validate_led_layout", message = "no LEDs configured"))]
pub struct LedLayout {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    /// LEDs of the bottom row, when it is not split
    pub bottom_row: u32,
    /// LEDs left of the bottom gap, when the bottom row is split
    pub bottom_left: u32,
    /// LEDs right of the bottom gap, when the bottom row is split
    pub bottom_right: u32,
    pub split_bottom_row: bool,
    #[validate(range(min = 1, max = 20))]
    pub group_by: u32,
    /// Depth of the top and bottom sample areas, in percent of the screen height
    #[validate(range(min = 1, max = 50))]
    pub grab_top_bottom: u32,
    /// Depth of the side sample areas, in percent of the screen width
    #[validate(range(min = 1, max = 50))]
    pub grab_sides: u32,
    /// Corner gap of the top and bottom rows, in percent of the screen width
    #[validate(range(max = 45))]
    pub gap_top_bottom: u32,
    /// Corner gap of the side columns, in percent of the screen height
    #[validate(range(max = 45))]
    pub gap_sides: u32,
    pub aspect_ratio: AspectRatio,
    pub orientation: Orientation,
    pub start_offset: i32,
}

impl LedLayout {
    /// Number of LEDs on the bottom edge, depending on the split mode
    pub fn bottom_total(&self) -> u32 {
        if self.split_bottom_row {
            self.bottom_left + self.bottom_right
        } else {
            self.bottom_row
        }
    }

    pub fn total(&self) -> usize {
        (self.top + self.left + self.right + self.bottom_total()) as usize
    }
}

fn validate_led_layout(layout: &LedLayout) -> Result<(), validator::ValidationError> {
    if layout.total() == 0 {
        return Err(validator::ValidationError::new("empty_layout"));
    }

    Ok(())
}

impl Default for LedLayout {
    fn default() -> Self {
        Self {
            top: 33,
            left: 18,
            right: 18,
            bottom_row: 33,
            bottom_left: 13,
            bottom_right: 13,
            split_bottom_row: false,
            group_by: 1,
            grab_top_bottom: 8,
            grab_sides: 8,
            gap_top_bottom: 0,
            gap_sides: 0,
            aspect_ratio: AspectRatio::Fullscreen,
            orientation: Orientation::Clockwise,
            start_offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names() {
        assert_eq!(AspectRatio::Letterbox.to_string(), "letterbox");
        assert_eq!(
            "pillarbox".parse::<AspectRatio>().ok(),
            Some(AspectRatio::Pillarbox)
        );
        assert_eq!(
            <&'static str>::from(Orientation::Anticlockwise),
            "anticlockwise"
        );
    }

    #[test]
    fn totals_follow_split_mode() {
        let mut layout = LedLayout::default();
        assert_eq!(layout.total(), 33 + 18 + 18 + 33);

        layout.split_bottom_row = true;
        assert_eq!(layout.total(), 33 + 18 + 18 + 13 + 13);
    }
}
