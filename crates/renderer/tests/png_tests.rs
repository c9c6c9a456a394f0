//! Tests for PNG encoding of rendered tiles.
//!
//! Encoded output is decoded back with the `image` crate to check that both
//! the indexed and the RGBA paths produce valid PNGs with the right pixels.

use fractal_common::{Complex, Offset, RenderConfig, TileExtent};
use renderer::png::{create_png, create_png_auto, encode_tile};
use renderer::{render_tile, NeverCancel};

// ============================================================================
// Helper functions
// ============================================================================

fn decode(png: &[u8]) -> image::RgbaImage {
    image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .expect("valid PNG")
        .to_rgba8()
}

fn color_type(png: &[u8]) -> u8 {
    // signature (8) + length (4) + "IHDR" (4) + width (4) + height (4) + depth (1)
    png[25]
}

fn julia_config(coloring: i32) -> RenderConfig {
    RenderConfig {
        c: Complex::new(-0.8, 0.156),
        center: Complex::ZERO,
        zoom: 120.0,
        coloring,
        max_iterations: 200,
        width: 256,
        height: 128,
        lod: 1,
    }
}

// ============================================================================
// Encoding path tests
// ============================================================================

#[test]
fn test_few_colors_use_indexed_encoding() {
    let pixels = [
        255, 0, 0, 255, // red
        0, 255, 0, 255, // green
        0, 255, 0, 255, // green
        255, 0, 0, 255, // red
    ];

    let png = create_png_auto(&pixels, 2, 2).unwrap();
    assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    assert_eq!(color_type(&png), 3);
    assert_eq!(decode(&png).into_raw(), pixels.to_vec());
}

#[test]
fn test_many_colors_fall_back_to_rgba() {
    let mut pixels = Vec::with_capacity(300 * 4);
    for i in 0..300u32 {
        pixels.extend_from_slice(&[(i % 256) as u8, (i / 2 % 256) as u8, (i / 3) as u8, 255]);
    }

    let png = create_png_auto(&pixels, 300, 1).unwrap();
    assert_eq!(color_type(&png), 6);
    assert_eq!(decode(&png).into_raw(), pixels);
}

#[test]
fn test_indexed_transparency_round_trips() {
    let pixels = [
        255, 0, 0, 255, // opaque
        0, 0, 0, 0, // transparent
        0, 255, 0, 128, // half
        0, 0, 255, 255, // opaque
    ];

    let png = create_png_auto(&pixels, 2, 2).unwrap();
    assert_eq!(decode(&png).into_raw(), pixels.to_vec());
}

#[test]
fn test_explicit_rgba_encoding() {
    let pixels = [10u8, 20, 30, 255].repeat(9);
    let png = create_png(&pixels, 3, 3).unwrap();
    assert_eq!(color_type(&png), 6);
    let decoded = decode(&png);
    assert_eq!(decoded.dimensions(), (3, 3));
}

// ============================================================================
// Rendered tile tests
// ============================================================================

#[test]
fn test_rendered_tile_decodes_to_same_pixels() {
    let config = julia_config(3);
    let extent = TileExtent::clip(&config, 128, 0, 128).unwrap();
    let image = render_tile(&config, extent, 4, Offset::default(), &NeverCancel).unwrap();

    let png = encode_tile(&image).unwrap();
    let decoded = decode(&png);
    assert_eq!(decoded.dimensions(), (128, 128));
    assert_eq!(decoded.into_raw(), image.as_bytes().to_vec());
}

#[test]
fn test_coarse_tile_encodes_smaller_than_fine_tile() {
    let config = julia_config(5);
    let extent = TileExtent::clip(&config, 0, 0, 128).unwrap();

    let coarse = render_tile(&config, extent, 1, Offset::default(), &NeverCancel).unwrap();
    let fine = render_tile(&config, extent, 4, Offset::default(), &NeverCancel).unwrap();

    assert!(encode_tile(&coarse).unwrap().len() < encode_tile(&fine).unwrap().len());
}

#[test]
fn test_equal_tiles_encode_identically() {
    let config = julia_config(12);
    let extent = TileExtent::clip(&config, 0, 0, 128).unwrap();

    let a = render_tile(&config, extent, 3, Offset::new(0.5, 0.25), &NeverCancel).unwrap();
    let b = render_tile(&config, extent, 3, Offset::new(0.5, 0.25), &NeverCancel).unwrap();
    assert_eq!(encode_tile(&a).unwrap(), encode_tile(&b).unwrap());
}

#[test]
fn test_clipped_edge_tile_dimensions() {
    let config = RenderConfig {
        width: 300,
        height: 200,
        ..julia_config(1)
    };
    let extent = TileExtent::clip(&config, 256, 128, 128).unwrap();
    let image = render_tile(&config, extent, 2, Offset::default(), &NeverCancel).unwrap();

    let decoded = decode(&encode_tile(&image).unwrap());
    assert_eq!(decoded.dimensions(), (44, 72));
}
