//! Raster drawing on RGB images: rectangles, dashed lines and bitmap text.
//!
//! Coordinates are signed so callers can place shapes partly off-canvas;
//! everything is clipped to the image.

mod font;

use image::{Rgb, RgbImage};

use crate::detect::BoundingBox;
use font::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const GREY: Rgb<u8> = Rgb([128, 128, 128]);

/// Fills `[x0, x1) x [y0, y1)`, clipped.
pub fn fill_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Outline of `bbox`, drawn inwards with the given thickness.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (top, right, bottom, left) = (
        bbox.top as i64,
        bbox.right as i64,
        bbox.bottom as i64,
        bbox.left as i64,
    );
    let t = thickness.max(1) as i64;
    fill_rect(image, left, top, right, top + t, color);
    fill_rect(image, left, bottom - t, right, bottom, color);
    fill_rect(image, left, top, left + t, bottom, color);
    fill_rect(image, right - t, top, right, bottom, color);
}

/// Vertical dashed line at `x` from `y0` to `y1`.
pub fn draw_dashed_vline(image: &mut RgbImage, x: i64, y0: i64, y1: i64, dash: i64, color: Rgb<u8>) {
    let dash = dash.max(1);
    let mut y = y0;
    while y < y1 {
        fill_rect(image, x, y, x + 1, (y + dash).min(y1), color);
        y += dash * 2;
    }
}

/// Pixel size of `text` at integer `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    let chars = text.chars().count() as u32;
    let width = if chars == 0 {
        0
    } else {
        (chars * (GLYPH_WIDTH + 1) - 1) * scale
    };
    (width, GLYPH_HEIGHT * scale)
}

/// Draws `text` with its top-left corner at `(x, y)`.
pub fn draw_text(image: &mut RgbImage, x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1) as i64;
    let advance = (GLYPH_WIDTH as i64 + 1) * scale;
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as i64 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i64 {
                if bits & (1 << (GLYPH_WIDTH as i64 - 1 - col)) == 0 {
                    continue;
                }
                let px = gx + col * scale;
                let py = y + row as i64 * scale;
                fill_rect(image, px, py, px + scale, py + scale, color);
            }
        }
    }
}
