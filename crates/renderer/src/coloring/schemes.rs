//! Coloring functions for escaped points.
//!
//! Every function here assumes `iterations < max_iterations`; interior
//! points are painted black before any of them is called.

use std::f64::consts::PI;

use fractal_common::Complex;

use super::hsv::hsv_to_rgb;
use super::Rgba;

/// Fractional iteration count, continuous across band boundaries.
#[inline]
fn smooth_iterations(iterations: u32, z: Complex) -> f64 {
    iterations as f64 - z.abs().ln().ln() / 2f64.ln()
}

/// Smooth iteration count normalized by the iteration budget.
#[inline]
fn smooth_fraction(iterations: u32, max_iterations: u32, z: Complex) -> f64 {
    smooth_iterations(iterations, z) / max_iterations as f64
}

fn opaque_hsv(hue: f64, saturation: f64, value: f64) -> Rgba {
    let (r, g, b) = hsv_to_rgb(hue, saturation, value);
    Rgba::opaque(r, g, b)
}

pub fn smooth_hsv(iterations: u32, _max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let hue = (smooth_iterations(iterations, z) * 0.1).sin();
    opaque_hsv(hue * 360.0, 0.8, 1.0)
}

pub fn stripes(iterations: u32, _max: u32, _z: Complex, _x: u32, _y: u32) -> Rgba {
    const STRIPE_WIDTH: u32 = 10;

    let stripe_index = iterations / STRIPE_WIDTH;
    let in_stripe = (iterations % STRIPE_WIDTH) as f64;

    let base_hue = (stripe_index % 6) as f64 / 6.0;
    let hue = base_hue + in_stripe / (STRIPE_WIDTH as f64 * 6.0);
    let saturation = 0.8 + 0.2 * (iterations as f64 * 0.1).sin();
    let value = 1.0 - 0.5 * in_stripe / STRIPE_WIDTH as f64;

    opaque_hsv(hue * 360.0, saturation, value)
}

pub fn electric_plasma(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let t = smooth_fraction(iterations, max, z);
    Rgba::opaque(
        ((t * PI).sin() * 127.0 + 128.0) as u8,
        ((t * PI * 2.0).sin() * 127.0 + 128.0) as u8,
        ((t * PI * 4.0).sin() * 127.0 + 128.0) as u8,
    )
}

pub fn psychedelic_swirl(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let angle = z.arg();
    let radius = z.abs();

    let hue = (angle.atan2(radius.ln()) + PI) / (2.0 * PI);
    let saturation = 0.8 + 0.2 * (iterations as f64 * 0.1).sin();
    let value = 1.0 - (iterations as f64 / max as f64).powf(0.3);

    opaque_hsv(hue * 360.0, saturation, value)
}

pub fn metallic_sheen(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let phase = smooth_fraction(iterations, max, z) * 2.0 * PI;
    Rgba::opaque(
        (128.0 + 127.0 * phase.sin()) as u8,
        (128.0 + 127.0 * (phase + 2.0 * PI / 3.0).sin()) as u8,
        (128.0 + 127.0 * (phase + 4.0 * PI / 3.0).sin()) as u8,
    )
}

pub fn rainbow_spiral(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let t = smooth_fraction(iterations, max, z);
    let (r, g, b) = hsv_to_rgb(t * 360.0, 1.0, 1.0);
    let alpha = (255.0 * (1.0 - t).powi(3)) as u8;
    Rgba { r, g, b, a: alpha }
}

pub fn autumn_leaves(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let t = smooth_fraction(iterations, max, z);
    let hue = 30.0 + 60.0 * (t * PI).sin();
    let saturation = 0.8 + 0.2 * (t * 2.0 * PI).cos();
    let value = 0.7 + 0.3 * (t * 4.0 * PI).sin();
    opaque_hsv(hue, saturation, value)
}

pub fn ocean_depths(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let t = smooth_fraction(iterations, max, z);
    let hue = 180.0 + 60.0 * (t * PI).sin();
    let saturation = 0.7 + 0.3 * (t * 2.0 * PI).cos();
    let value = 0.5 + 0.5 * t.max(0.0).sqrt();
    opaque_hsv(hue, saturation, value)
}

pub fn molten_lava(iterations: u32, max: u32, z: Complex, _x: u32, _y: u32) -> Rgba {
    let t = smooth_fraction(iterations, max, z).max(0.0);
    Rgba::opaque(
        (255.0 * t.sqrt()) as u8,
        (128.0 * t.powi(2)) as u8,
        (64.0 * t.powi(4)) as u8,
    )
}

/// Grey ramp indexed by `iterations mod 256`.
///
/// Entry 0 is lifted to 86 so the first escape band is distinguishable
/// from the black interior; entry 255 wraps to black.
pub fn grey_palette(iterations: u32, _max: u32, _z: Complex, _x: u32, _y: u32) -> Rgba {
    let level = match iterations % 256 {
        0 => 86,
        255 => 0,
        i => i as u8,
    };
    Rgba::opaque(level, level, level)
}

/// Checkerboard of [`electric_plasma`] and [`autumn_leaves`] by pixel parity.
pub fn alternating(iterations: u32, max: u32, z: Complex, x: u32, y: u32) -> Rgba {
    if (x + y) % 2 == 0 {
        electric_plasma(iterations, max, z, x, y)
    } else {
        autumn_leaves(iterations, max, z, x, y)
    }
}

/// Weighted blend of [`stripes`], [`metallic_sheen`] and [`ocean_depths`].
pub fn mixed(iterations: u32, max: u32, z: Complex, x: u32, y: u32) -> Rgba {
    let first = stripes(iterations, max, z, x, y);
    let second = metallic_sheen(iterations, max, z, x, y);
    let third = ocean_depths(iterations, max, z, x, y);

    let t = iterations as f64 / max as f64;
    let w1 = (t * PI).sin();
    let w2 = (t * 2.0 * PI).sin();
    let w3 = (t * 4.0 * PI).sin();
    let total = w1 + w2 + w3;

    // total can be zero (t == 0); the NaN channel saturates to 0
    let blend = |a: u8, b: u8, c: u8| {
        ((a as f64 * w1 + b as f64 * w2 + c as f64 * w3) / total) as u8
    };

    Rgba::opaque(
        blend(first.r, second.r, third.r),
        blend(first.g, second.g, third.g),
        blend(first.b, second.b, third.b),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grey_palette_levels() {
        let z = Complex::new(3.0, 0.0);
        assert_eq!(grey_palette(0, 100, z, 0, 0), Rgba::opaque(86, 86, 86));
        assert_eq!(grey_palette(7, 100, z, 0, 0), Rgba::opaque(7, 7, 7));
        assert_eq!(grey_palette(255, 1000, z, 0, 0), Rgba::opaque(0, 0, 0));
        assert_eq!(grey_palette(263, 1000, z, 0, 0), Rgba::opaque(7, 7, 7));
    }

    #[test]
    fn test_alternating_uses_pixel_parity() {
        let z = Complex::new(2.5, 0.5);
        assert_eq!(alternating(5, 100, z, 0, 0), electric_plasma(5, 100, z, 0, 0));
        assert_eq!(alternating(5, 100, z, 1, 0), autumn_leaves(5, 100, z, 1, 0));
    }

    #[test]
    fn test_rainbow_alpha_fades_with_depth() {
        let z = Complex::new(2.5, 0.0);
        let shallow = rainbow_spiral(1, 100, z, 0, 0);
        let deep = rainbow_spiral(90, 100, z, 0, 0);
        assert!(shallow.a > deep.a);
    }

    #[test]
    fn test_mixed_zero_weight_is_deterministic() {
        let z = Complex::new(3.0, 0.0);
        assert_eq!(mixed(0, 100, z, 0, 0), mixed(0, 100, z, 0, 0));
    }
}
