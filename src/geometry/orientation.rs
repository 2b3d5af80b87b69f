use crate::models::Orientation;

/// Apply the strip orientation and start offset to values in traversal order
///
/// After this call `leds[i]` holds the value that was at `(i + offset) mod N`, and the
/// whole array is reversed for anticlockwise strips.
pub fn apply_orientation<T>(leds: &mut [T], orientation: Orientation, start_offset: i32) {
    let n = leds.len();
    if n == 0 {
        return;
    }

    let offset = (start_offset as i64).rem_euclid(n as i64) as usize;
    leds.rotate_left(offset);

    if orientation == Orientation::Anticlockwise {
        leds.reverse();
    }
}
