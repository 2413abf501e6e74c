//! Preview composition onto the zoomed page raster

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::coords::CanvasPoint;

/// Scale the preview raster to the canvas size
pub fn scale_background(raster: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if raster.dimensions() == (width, height) {
        return raster.clone();
    }
    imageops::resize(raster, width.max(1), height.max(1), FilterType::Triangle)
}

/// Draw `sprite` with its center on `center`, clipped to the canvas
pub fn place_centered(canvas: &mut RgbaImage, sprite: &RgbaImage, center: CanvasPoint) {
    let left = (center.x - sprite.width() as f64 / 2.0).round() as i64;
    let top = (center.y - sprite.height() as f64 / 2.0).round() as i64;
    blend_over(canvas, sprite, left, top);
}

/// Composite `sprite` over `canvas` with its top-left corner at `(left, top)`
///
/// Parts falling outside the canvas are dropped.
pub fn blend_over(canvas: &mut RgbaImage, sprite: &RgbaImage, left: i64, top: i64) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);

    for (sx, sy, pixel) in sprite.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let x = left + sx as i64;
        let y = top + sy as i64;
        if x < 0 || y < 0 || x >= cw || y >= ch {
            continue;
        }
        let background = canvas.get_pixel_mut(x as u32, y as u32);
        *background = over(*background, *pixel);
    }
}

/// Porter-Duff "over" for straight-alpha pixels
fn over(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    let fg_alpha = foreground[3] as f32 / 255.0;
    let bg_alpha = background[3] as f32 / 255.0;
    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let fg = foreground[i] as f32;
        let bg = background[i] as f32;
        ((fg * fg_alpha + bg * bg_alpha * (1.0 - fg_alpha)) / out_alpha)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_alpha * 255.0).round() as u8,
    ])
}
