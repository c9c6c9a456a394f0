//! Closed registry of coloring functions.
//!
//! Colorings are addressed by the integer id carried in
//! [`RenderConfig::coloring`](fractal_common::RenderConfig). The table is a
//! `static`; ids outside it resolve to [`Coloring::DEFAULT_ID`].

mod hsv;
pub mod schemes;

pub use hsv::{hsv_to_rgb, to_byte};

use fractal_common::Complex;
use std::fmt;

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Opaque black, used for interior points.
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Signature shared by every coloring:
/// `(iterations, max_iterations, final_z, tile_pixel_x, tile_pixel_y)`.
pub type ColorFn = fn(u32, u32, Complex, u32, u32) -> Rgba;

/// A named entry of the coloring registry.
#[derive(Clone, Copy)]
pub struct Coloring {
    pub id: i32,
    pub name: &'static str,
    func: ColorFn,
}

static REGISTRY: [Coloring; 12] = [
    Coloring::entry(1, "smooth-hsv", schemes::smooth_hsv),
    Coloring::entry(2, "stripes", schemes::stripes),
    Coloring::entry(3, "electric-plasma", schemes::electric_plasma),
    Coloring::entry(4, "psychedelic-swirl", schemes::psychedelic_swirl),
    Coloring::entry(5, "metallic-sheen", schemes::metallic_sheen),
    Coloring::entry(6, "rainbow-spiral", schemes::rainbow_spiral),
    Coloring::entry(7, "autumn-leaves", schemes::autumn_leaves),
    Coloring::entry(8, "ocean-depths", schemes::ocean_depths),
    Coloring::entry(9, "molten-lava", schemes::molten_lava),
    Coloring::entry(10, "grey-palette", schemes::grey_palette),
    Coloring::entry(11, "alternating", schemes::alternating),
    Coloring::entry(12, "mixed", schemes::mixed),
];

impl Coloring {
    /// Id used for unknown or missing coloring ids.
    pub const DEFAULT_ID: i32 = 1;

    const fn entry(id: i32, name: &'static str, func: ColorFn) -> Self {
        Self { id, name, func }
    }

    /// Every registered coloring, ordered by id.
    pub fn all() -> &'static [Coloring] {
        &REGISTRY
    }

    /// Resolve an id, falling back to the default coloring.
    pub fn lookup(id: i32) -> &'static Coloring {
        REGISTRY
            .iter()
            .find(|c| c.id == id)
            .unwrap_or(&REGISTRY[0])
    }

    /// Whether `id` names a registered coloring.
    pub fn is_known(id: i32) -> bool {
        REGISTRY.iter().any(|c| c.id == id)
    }

    /// Color one evaluated point. Interior points are always black.
    #[inline]
    pub fn color(
        &self,
        iterations: u32,
        max_iterations: u32,
        z: Complex,
        x: u32,
        y: u32,
    ) -> Rgba {
        if iterations >= max_iterations {
            return Rgba::BLACK;
        }
        (self.func)(iterations, max_iterations, z, x, y)
    }
}

impl fmt::Debug for Coloring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coloring")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for Coloring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ids_are_contiguous() {
        let ids: Vec<i32> = Coloring::all().iter().map(|c| c.id).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_ids_fall_back_to_default() {
        for id in [0, -1, 13, i32::MAX, i32::MIN] {
            assert_eq!(Coloring::lookup(id).id, Coloring::DEFAULT_ID);
            assert!(!Coloring::is_known(id));
        }
        assert_eq!(Coloring::lookup(7).name, "autumn-leaves");
    }

    #[test]
    fn test_interior_is_black_for_every_coloring() {
        let z = Complex::new(0.1, 0.2);
        for coloring in Coloring::all() {
            assert_eq!(coloring.color(100, 100, z, 3, 4), Rgba::BLACK, "{}", coloring);
        }
    }

    #[test]
    fn test_every_coloring_is_deterministic() {
        let z = Complex::new(2.1, -1.3);
        for coloring in Coloring::all() {
            for i in [0, 1, 17, 99] {
                assert_eq!(
                    coloring.color(i, 100, z, 5, 9),
                    coloring.color(i, 100, z, 5, 9),
                    "{} at {}",
                    coloring,
                    i
                );
            }
        }
    }
}
