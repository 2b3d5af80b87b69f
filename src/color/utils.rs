use super::Color;

/// Pack a color as a `0x00RRGGBB` integer
pub fn pack_rgb(color: Color) -> u32 {
    let (r, g, b) = color.into_components();
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

pub fn unpack_rgb(packed: u32) -> Color {
    Color::new(
        ((packed >> 16) & 0xFF) as u8,
        ((packed >> 8) & 0xFF) as u8,
        (packed & 0xFF) as u8,
    )
}

/// Scale a color by a 0-255 brightness value
pub fn scale_brightness(color: Color, brightness: u8) -> Color {
    if brightness == u8::MAX {
        return color;
    }

    let (r, g, b) = color.into_components();
    let scale = |x: u8| ((x as u32 * brightness as u32) / 255) as u8;
    Color::new(scale(r), scale(g), scale(b))
}

/// Check that every channel of `a` is within `tolerance` of `b`
pub fn within_tolerance(a: Color, b: Color, tolerance: u8) -> bool {
    a.red.abs_diff(b.red) <= tolerance
        && a.green.abs_diff(b.green) <= tolerance
        && a.blue.abs_diff(b.blue) <= tolerance
}
