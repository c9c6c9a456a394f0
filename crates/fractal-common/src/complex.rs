//! Minimal complex number type used by the escape-time evaluator.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// A complex number with `f64` components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub real: f64,
    pub imag: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { real: 0.0, imag: 0.0 };

    pub const fn new(real: f64, imag: f64) -> Self {
        Self { real, imag }
    }

    /// Squared modulus. Cheaper than [`Complex::abs`] for radius checks.
    #[inline]
    pub fn norm_sqr(&self) -> f64 {
        self.real * self.real + self.imag * self.imag
    }

    /// Modulus `|z|`.
    #[inline]
    pub fn abs(&self) -> f64 {
        self.real.hypot(self.imag)
    }

    /// Argument (phase angle) in radians, in `(-pi, pi]`.
    #[inline]
    pub fn arg(&self) -> f64 {
        self.imag.atan2(self.real)
    }

    pub fn is_finite(&self) -> bool {
        self.real.is_finite() && self.imag.is_finite()
    }
}

impl Add for Complex {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            real: self.real + other.real,
            imag: self.imag + other.imag,
        }
    }
}

impl Mul for Complex {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            real: self.real * other.real - self.imag * other.imag,
            imag: self.real * other.imag + self.imag * other.real,
        }
    }
}
