//! Coordinate spaces used while placing watermarks
//!
//! Three spaces are in play:
//! - **points**: PDF user units (1/72 inch), origin bottom-left, y up. All
//!   watermark positions are stored here.
//! - **raster pixels**: the preview bitmap produced at a fixed DPI, origin
//!   top-left, y down.
//! - **canvas pixels**: the raster scaled by the live zoom factor, origin
//!   top-left, y down. Pointer events arrive in this space.

use serde::{Deserialize, Serialize};

/// Preview rasterization density used by the interactive front end
pub const PREVIEW_DPI: f64 = 144.0;

/// Points per inch
pub const POINTS_PER_INCH: f64 = 72.0;

/// A position in point space (origin bottom-left, y up)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

impl PagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A position in canvas pixel space (origin top-left, y down)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl CanvasPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Visual page extents in points (rotation already applied)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both extents are usable for conversions
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> PagePoint {
        PagePoint::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Axis-aligned rectangle in point space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PointRect {
    /// Rectangle of the given extents centered on `anchor`
    pub fn centered(anchor: PagePoint, width: f64, height: f64) -> Self {
        Self {
            x0: anchor.x - width / 2.0,
            y0: anchor.y - height / 2.0,
            x1: anchor.x + width / 2.0,
            y1: anchor.y + height / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Converts between point, raster and canvas space for the page on screen
///
/// The scale `S = canvas_width / page_width` is recomputed whenever the page
/// or the zoom changes. Until a page with non-zero extents is loaded every
/// conversion returns `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSpace {
    page: PageSize,
    raster_width: u32,
    zoom: f64,
    scale: Option<f64>,
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        Self {
            page: PageSize::default(),
            raster_width: 0,
            zoom: 1.0,
            scale: None,
        }
    }
}

impl CoordinateSpace {
    /// Empty space with no page loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Space for a page whose preview raster is `raster_width` pixels wide
    pub fn for_page(page: PageSize, raster_width: u32, zoom: f64) -> Self {
        let mut space = Self::new();
        space.zoom = sanitize_zoom(zoom, 1.0);
        space.set_page(page, raster_width);
        space
    }

    /// Load a new page; recomputes the scale
    pub fn set_page(&mut self, page: PageSize, raster_width: u32) {
        self.page = page;
        self.raster_width = raster_width;
        self.recompute();
    }

    /// Change the zoom factor; non-positive or non-finite values are ignored
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = sanitize_zoom(zoom, self.zoom);
        self.recompute();
    }

    /// Forget the current page (e.g. document closed)
    pub fn clear(&mut self) {
        self.page = PageSize::default();
        self.raster_width = 0;
        self.scale = None;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn page(&self) -> PageSize {
        self.page
    }

    /// Canvas pixels per point, if a page is loaded
    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    /// Displayed canvas size in whole pixels
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        let s = self.scale?;
        let width = canvas_width(self.raster_width, self.zoom);
        let height = (self.page.height * s).round().max(1.0) as u32;
        Some((width, height))
    }

    /// Raster pixels per point at the preview DPI
    pub fn raster_scale(&self) -> Option<f64> {
        if !self.page.is_valid() || self.raster_width == 0 {
            return None;
        }
        Some(self.raster_width as f64 / self.page.width)
    }

    /// `(x·S, (H − y)·S)`
    pub fn to_canvas(&self, point: PagePoint) -> Option<CanvasPoint> {
        let s = self.scale?;
        Some(CanvasPoint::new(point.x * s, (self.page.height - point.y) * s))
    }

    /// `(px/S, H − py/S)`
    pub fn to_points(&self, point: CanvasPoint) -> Option<PagePoint> {
        let s = self.scale?;
        Some(PagePoint::new(point.x / s, self.page.height - point.y / s))
    }

    /// Convert a canvas position into the unzoomed preview raster
    pub fn canvas_to_raster(&self, point: CanvasPoint) -> Option<(f64, f64)> {
        let page_point = self.to_points(point)?;
        let r = self.raster_scale()?;
        Some((page_point.x * r, (self.page.height - page_point.y) * r))
    }

    fn recompute(&mut self) {
        self.scale = if self.page.is_valid() && self.raster_width > 0 {
            let width = canvas_width(self.raster_width, self.zoom);
            Some(width as f64 / self.page.width)
        } else {
            None
        };
    }
}

/// Raster width in pixels for a page rendered at `dpi`
pub fn raster_width_for(page: PageSize, dpi: f64) -> u32 {
    (page.width * dpi / POINTS_PER_INCH).round().max(1.0) as u32
}

fn canvas_width(raster_width: u32, zoom: f64) -> u32 {
    ((raster_width as f64 * zoom).floor() as u32).max(1)
}

fn sanitize_zoom(zoom: f64, fallback: f64) -> f64 {
    if zoom.is_finite() && zoom > 0.0 {
        zoom
    } else {
        fallback
    }
}
