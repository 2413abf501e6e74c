//! Text watermark layout
//!
//! Text is centered on its anchor and rotated about it. The same
//! [`TextLayout`] feeds both the preview instruction and the PDF text
//! operators, so the two agree on where the glyphs land.

use crate::coords::{CanvasPoint, CoordinateSpace, PagePoint, PointRect};
use crate::fonts::{measure_text, FontResolver, ResolvedFont, TextExtent, TEXT_BASE_SIZE};
use crate::model::{Rgb, TextStyle, Transform};

/// Opacity at or above which a surface without alpha draws solid text
pub const SOLID_THRESHOLD: f64 = 0.9;

/// Geometry of one text instance on a page, in points
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub anchor: PagePoint,
    pub font: ResolvedFont,
    /// Font size in points
    pub size: f64,
    pub extent: TextExtent,
    /// Degrees, counter-clockwise
    pub angle: f64,
}

impl TextLayout {
    pub fn new(
        style: &TextStyle,
        transform: &Transform,
        anchor: PagePoint,
        resolver: &FontResolver,
    ) -> Self {
        let font = resolver.resolve(&style.font_family, &style.content);
        let size = TEXT_BASE_SIZE * transform.scale;
        let extent = measure_text(&style.content, &font, size);
        Self {
            anchor,
            font,
            size,
            extent,
            angle: transform.angle,
        }
    }

    /// Start of the baseline relative to the anchor, before rotation
    pub fn baseline_offset(&self) -> (f64, f64) {
        (
            -self.extent.width / 2.0,
            (self.extent.descent - self.extent.ascent) / 2.0,
        )
    }

    /// Corners of the rotated text box, counter-clockwise from bottom-left
    pub fn corners(&self) -> [PagePoint; 4] {
        let hw = self.extent.width / 2.0;
        let hh = self.extent.height() / 2.0;
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(x, y)| self.to_page(x, y))
    }

    /// Axis-aligned bounds of [`corners`](Self::corners)
    pub fn bounds(&self) -> PointRect {
        let mut rect = PointRect {
            x0: f64::INFINITY,
            y0: f64::INFINITY,
            x1: f64::NEG_INFINITY,
            y1: f64::NEG_INFINITY,
        };
        for p in self.corners() {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        rect
    }

    /// Same text turned a further `delta` degrees about the anchor
    pub fn rotated(&self, delta: f64) -> Self {
        Self {
            angle: self.angle + delta,
            ..self.clone()
        }
    }

    /// PDF text matrix `[a b c d e f]` placing the baseline start on the page
    pub fn text_matrix(&self) -> [f64; 6] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (bx, by) = self.baseline_offset();
        let origin = self.to_page(bx, by);
        [cos, sin, -sin, cos, origin.x, origin.y]
    }

    fn to_page(&self, x: f64, y: f64) -> PagePoint {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        PagePoint::new(
            self.anchor.x + x * cos - y * sin,
            self.anchor.y + x * sin + y * cos,
        )
    }
}

/// A text instance as written into the output document
#[derive(Debug, Clone, PartialEq)]
pub struct TextPlacement {
    pub layout: TextLayout,
    pub content: String,
    pub color: Rgb,
    pub opacity: f64,
}

impl TextPlacement {
    pub fn new(
        style: &TextStyle,
        transform: &Transform,
        anchor: PagePoint,
        resolver: &FontResolver,
    ) -> Self {
        Self {
            layout: TextLayout::new(style, transform, anchor, resolver),
            content: style.content.clone(),
            color: style.color,
            opacity: transform.opacity,
        }
    }
}

/// Capabilities of the surface the preview is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSurface {
    /// Whether text can be drawn with per-item alpha
    pub native_alpha: bool,
}

/// Fill pattern approximating transparency on surfaces without alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stipple {
    Gray12,
    Gray25,
    Gray50,
    Gray75,
}

impl Stipple {
    /// Closest pattern for an opacity; `None` means draw solid
    pub fn for_opacity(opacity: f64) -> Option<Self> {
        match opacity {
            o if o >= SOLID_THRESHOLD => None,
            o if o >= 0.625 => Some(Stipple::Gray75),
            o if o >= 0.375 => Some(Stipple::Gray50),
            o if o >= 0.1875 => Some(Stipple::Gray25),
            _ => Some(Stipple::Gray12),
        }
    }

    /// Conventional bitmap name
    pub fn name(&self) -> &'static str {
        match self {
            Stipple::Gray12 => "gray12",
            Stipple::Gray25 => "gray25",
            Stipple::Gray50 => "gray50",
            Stipple::Gray75 => "gray75",
        }
    }

    /// Fraction of pixels the pattern paints
    pub fn coverage(&self) -> f64 {
        match self {
            Stipple::Gray12 => 0.125,
            Stipple::Gray25 => 0.25,
            Stipple::Gray50 => 0.5,
            Stipple::Gray75 => 0.75,
        }
    }
}

/// How preview text conveys its opacity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextFill {
    Alpha(f64),
    Stipple(Stipple),
    Solid,
}

impl TextFill {
    pub fn for_surface(opacity: f64, surface: PreviewSurface) -> Self {
        if surface.native_alpha {
            return TextFill::Alpha(opacity);
        }
        match Stipple::for_opacity(opacity) {
            Some(pattern) => TextFill::Stipple(pattern),
            None => TextFill::Solid,
        }
    }
}

/// Vector draw instruction for one text instance on the preview canvas
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewText {
    pub content: String,
    pub font: ResolvedFont,
    /// Font size in canvas pixels
    pub size_px: f64,
    pub center: CanvasPoint,
    /// Degrees, counter-clockwise on screen
    pub angle: f64,
    pub color: Rgb,
    pub fill: TextFill,
    /// Rotated box outline, for selection feedback
    pub corners: [CanvasPoint; 4],
}

/// Preview instruction for a text watermark at `anchor`; `None` with no page loaded
pub fn preview_text(
    style: &TextStyle,
    transform: &Transform,
    anchor: PagePoint,
    resolver: &FontResolver,
    space: &CoordinateSpace,
    surface: PreviewSurface,
) -> Option<PreviewText> {
    let scale = space.scale()?;
    let layout = TextLayout::new(style, transform, anchor, resolver);
    let center = space.to_canvas(anchor)?;

    let mut corners = [CanvasPoint::default(); 4];
    for (slot, corner) in corners.iter_mut().zip(layout.corners()) {
        *slot = space.to_canvas(corner)?;
    }

    Some(PreviewText {
        content: style.content.clone(),
        size_px: layout.size * scale,
        font: layout.font,
        center,
        angle: layout.angle,
        color: style.color,
        fill: TextFill::for_surface(transform.opacity, surface),
        corners,
    })
}
