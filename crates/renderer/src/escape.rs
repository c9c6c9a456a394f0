//! Escape-time evaluation of the Julia iteration `z = z^2 + c`.

use fractal_common::Complex;

/// Escape radius squared (`|z| > 2`).
const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Outcome of iterating one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Escape {
    /// Steps taken before escaping, or `max_iterations` for interior points.
    pub iterations: u32,
    /// Orbit value when iteration stopped.
    pub final_z: Complex,
}

impl Escape {
    /// Whether the orbit stayed bounded for the whole iteration budget.
    #[inline]
    pub fn is_interior(&self, max_iterations: u32) -> bool {
        self.iterations >= max_iterations
    }
}

/// Iterate `point` under `z = z^2 + c`.
///
/// The radius test runs before each step, so a point that starts outside
/// the escape radius reports zero iterations.
#[inline]
pub fn evaluate(point: Complex, c: Complex, max_iterations: u32) -> Escape {
    let mut z = point;
    let mut iterations = 0;

    while iterations < max_iterations {
        if z.norm_sqr() > ESCAPE_RADIUS_SQ {
            break;
        }
        z = z * z + c;
        iterations += 1;
    }

    Escape {
        iterations,
        final_z: z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straightforward orbit check written without the shared complex type.
    fn oracle_stays_bounded(re0: f64, im0: f64, c_re: f64, c_im: f64, steps: u32) -> bool {
        let (mut re, mut im) = (re0, im0);
        for _ in 0..steps {
            if (re * re + im * im).sqrt() > 2.0 {
                return false;
            }
            let next_re = re * re - im * im + c_re;
            let next_im = 2.0 * re * im + c_im;
            re = next_re;
            im = next_im;
        }
        true
    }

    #[test]
    fn test_origin_classification_matches_oracle() {
        let c = Complex::new(-0.8, 0.156);
        let result = evaluate(Complex::ZERO, c, 100);

        let expected_interior = oracle_stays_bounded(0.0, 0.0, -0.8, 0.156, 100);
        assert_eq!(result.is_interior(100), expected_interior);
    }

    #[test]
    fn test_grid_classification_matches_oracle() {
        let c = Complex::new(-0.8, 0.156);
        for i in -8..=8 {
            for j in -8..=8 {
                let (re, im) = (i as f64 * 0.2, j as f64 * 0.15);
                let result = evaluate(Complex::new(re, im), c, 100);
                assert_eq!(
                    result.is_interior(100),
                    oracle_stays_bounded(re, im, -0.8, 0.156, 100),
                    "mismatch at ({}, {})",
                    re,
                    im
                );
            }
        }
    }

    #[test]
    fn test_point_outside_radius_escapes_immediately() {
        let result = evaluate(Complex::new(3.0, 0.0), Complex::ZERO, 50);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.final_z, Complex::new(3.0, 0.0));
    }

    #[test]
    fn test_fixed_point_is_interior() {
        // z = 0 is a fixed point of z^2 + 0
        let result = evaluate(Complex::ZERO, Complex::ZERO, 64);
        assert_eq!(result.iterations, 64);
        assert!(result.is_interior(64));
    }

    #[test]
    fn test_escaped_orbit_is_outside_radius() {
        let result = evaluate(Complex::new(1.5, 1.5), Complex::new(0.3, 0.5), 200);
        assert!(result.iterations < 200);
        assert!(result.final_z.norm_sqr() > 4.0);
    }

    #[test]
    fn test_deterministic() {
        let c = Complex::new(0.285, 0.01);
        let p = Complex::new(0.1234, -0.5678);
        assert_eq!(evaluate(p, c, 500), evaluate(p, c, 500));
    }
}
