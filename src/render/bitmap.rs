//! Image watermark pipeline: resample, rotate with canvas expansion, scale alpha

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::{RenderTarget, MAX_RENDER_DIMENSION};
use crate::coords::{PagePoint, PointRect};
use crate::error::{Error, Result};
use crate::model::Transform;

const ANGLE_EPSILON: f64 = 1e-9;

/// A watermark image ready to be placed, with the density it was made at
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bitmap: RgbaImage,
    pub pixels_per_point: f64,
}

impl RenderedImage {
    /// Extent in points
    pub fn size_points(&self) -> (f64, f64) {
        (
            self.bitmap.width() as f64 / self.pixels_per_point,
            self.bitmap.height() as f64 / self.pixels_per_point,
        )
    }

    /// Placement rectangle with the image centered on `anchor`
    pub fn rect_at(&self, anchor: PagePoint) -> PointRect {
        let (w, h) = self.size_points();
        PointRect::centered(anchor, w, h)
    }
}

/// Render `source` with `transform` at the density of `target`
///
/// The source is never modified: the opacity is applied once per call to a
/// fresh copy, so rendering the same watermark repeatedly does not compound.
pub fn render_image(
    source: &RgbaImage,
    transform: &Transform,
    target: RenderTarget,
) -> Result<RenderedImage> {
    if source.width() == 0 || source.height() == 0 {
        return Err(Error::InvalidConfiguration(
            "watermark image has no pixels".to_string(),
        ));
    }

    let mut ppp = target.pixels_per_point();
    let longest = source.width().max(source.height()) as f64 * transform.scale;
    if longest * ppp > MAX_RENDER_DIMENSION as f64 {
        ppp = MAX_RENDER_DIMENSION as f64 / longest;
    }

    let width = (source.width() as f64 * transform.scale * ppp).round().max(1.0) as u32;
    let height = (source.height() as f64 * transform.scale * ppp).round().max(1.0) as u32;

    let resized = resample(source, width, height);
    let mut rotated = rotate_expand(&resized, transform.angle);
    apply_opacity(&mut rotated, transform.opacity);

    Ok(RenderedImage {
        bitmap: rotated,
        pixels_per_point: ppp,
    })
}

/// Resize with a Lanczos filter; returns a copy when the size already matches
pub fn resample(source: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if source.dimensions() == (width, height) {
        return source.clone();
    }
    imageops::resize(source, width, height, FilterType::Lanczos3)
}

/// Rotate counter-clockwise by `degrees`, growing the canvas to the rotated bounds
///
/// Quarter turns are lossless. Other angles sample bilinearly in
/// premultiplied alpha; uncovered pixels stay transparent.
pub fn rotate_expand(image: &RgbaImage, degrees: f64) -> RgbaImage {
    let turn = degrees.rem_euclid(360.0);
    let near = |target: f64| (turn - target).abs() < ANGLE_EPSILON;

    if near(0.0) || near(360.0) {
        return image.clone();
    }
    if near(90.0) {
        return imageops::rotate270(image);
    }
    if near(180.0) {
        return imageops::rotate180(image);
    }
    if near(270.0) {
        return imageops::rotate90(image);
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let src_w = image.width() as f64;
    let src_h = image.height() as f64;

    // Trim float noise so exact fits don't gain a pixel
    let dst_w = ((src_w * cos.abs() + src_h * sin.abs()) - 1e-6).ceil().max(1.0) as u32;
    let dst_h = ((src_w * sin.abs() + src_h * cos.abs()) - 1e-6).ceil().max(1.0) as u32;

    let (src_cx, src_cy) = (src_w / 2.0, src_h / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f64 / 2.0, dst_h as f64 / 2.0);

    RgbaImage::from_fn(dst_w, dst_h, |dx, dy| {
        // y grows downward, so a counter-clockwise turn maps back through
        // x = x'cos - y'sin, y = x'sin + y'cos
        let u = dx as f64 + 0.5 - dst_cx;
        let v = dy as f64 + 0.5 - dst_cy;
        let sx = u * cos - v * sin + src_cx - 0.5;
        let sy = u * sin + v * cos + src_cy - 0.5;
        sample_bilinear(image, sx, sy)
    })
}

/// Multiply every pixel's alpha by `opacity`
pub fn apply_opacity(image: &mut RgbaImage, opacity: f64) {
    let factor = opacity.clamp(0.0, 1.0);
    if factor >= 1.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = (pixel[3] as f64 * factor).round() as u8;
    }
}

fn sample_bilinear(image: &RgbaImage, sx: f64, sy: f64) -> Rgba<u8> {
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 4];
    for (x, y, weight) in taps {
        if weight <= 0.0 || x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
            continue;
        }
        let p = image.get_pixel(x as u32, y as u32);
        let alpha = p[3] as f64 / 255.0;
        acc[0] += p[0] as f64 * alpha * weight;
        acc[1] += p[1] as f64 * alpha * weight;
        acc[2] += p[2] as f64 * alpha * weight;
        acc[3] += alpha * weight;
    }

    if acc[3] <= 1e-6 {
        return Rgba([0, 0, 0, 0]);
    }
    let straight = |c: f64| (c / acc[3]).round().clamp(0.0, 255.0) as u8;
    Rgba([
        straight(acc[0]),
        straight(acc[1]),
        straight(acc[2]),
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
