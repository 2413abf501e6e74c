//! Compositing: turning a watermark and an anchor into pixels or draw instructions
//!
//! Image watermarks go through one pipeline (resample, rotate, alpha) that is
//! parametrized only by the target resolution, so the preview and the
//! written PDF agree in point space. Text watermarks are laid out as vector
//! instructions.

pub mod bitmap;
pub mod compose;
pub mod text;

pub use bitmap::{apply_opacity, render_image, resample, rotate_expand, RenderedImage};
pub use compose::{blend_over, place_centered, scale_background};
pub use text::{
    preview_text, PreviewSurface, PreviewText, Stipple, TextFill, TextLayout, TextPlacement,
};

use crate::coords::CoordinateSpace;
use crate::model::Transform;

/// Largest edge, in pixels, a rendered watermark may have
pub const MAX_RENDER_DIMENSION: u32 = 16_384;

/// Pixel density a watermark image is rendered at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    pixels_per_point: f64,
}

impl RenderTarget {
    /// Explicit density; `None` unless finite and positive
    pub fn new(pixels_per_point: f64) -> Option<Self> {
        (pixels_per_point.is_finite() && pixels_per_point > 0.0).then_some(Self { pixels_per_point })
    }

    /// Canvas density of the preview, if a page is loaded
    pub fn preview(space: &CoordinateSpace) -> Option<Self> {
        space.scale().and_then(Self::new)
    }

    /// Density for the written document
    ///
    /// At least one pixel per point, and never fewer pixels than the source
    /// has, so shrinking a large logo keeps its native detail.
    pub fn output(transform: &Transform) -> Self {
        Self {
            pixels_per_point: (1.0 / transform.scale).max(1.0),
        }
    }

    pub fn pixels_per_point(&self) -> f64 {
        self.pixels_per_point
    }
}
