//! HSV to 8-bit RGB conversion.

/// Convert HSV to RGB.
///
/// `hue` is in degrees and wraps into `[0, 360)`, so negative hues are
/// valid. The Go colorful library this palette came from turns negative
/// hues grey instead, so the negative half of smooth-hsv differs from it. `saturation` and `value` are expected in `[0, 1]`; out-of-range
/// results saturate when converted to bytes.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> (u8, u8, u8) {
    let h = hue.rem_euclid(360.0) / 60.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = value - chroma;

    let (r, g, b) = match h as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    (to_byte(r + m), to_byte(g + m), to_byte(b + m))
}

/// Unit float to byte with round-half-up. Saturates out-of-range input.
#[inline]
pub fn to_byte(unit: f64) -> u8 {
    (unit * 255.0 + 0.5) as u8
}
