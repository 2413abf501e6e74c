//! Seams to the document engine and page rasterizer

use std::path::Path;

use image::RgbaImage;

use super::geometry::Matrix;
use crate::coords::{PageSize, PointRect};
use crate::error::Result;
use crate::render::TextPlacement;

/// Opens documents for watermarking
pub trait DocumentEngine {
    type Document: EditableDocument;

    /// Open the document at `path`; the handle is released on drop
    fn open(&self, path: &Path) -> Result<Self::Document>;
}

/// An open document that watermarks can be written into
///
/// Page indices are zero-based. Rectangles and text placements are in the
/// page's visual point space: origin at the bottom-left of the page as it is
/// displayed, rotation already applied.
pub trait EditableDocument {
    fn page_count(&self) -> usize;

    fn page_geometry(&self, index: usize) -> Result<PageGeometry>;

    /// Embed a bitmap once; the returned handle can be placed on any page
    fn register_image(&mut self, bitmap: &RgbaImage) -> Result<ImageRef>;

    /// Draw a registered image stretched over `rect`
    fn place_image(&mut self, index: usize, rect: PointRect, image: ImageRef) -> Result<()>;

    fn place_text(&mut self, index: usize, text: &TextPlacement) -> Result<()>;

    /// Write the document, replacing `path` only when the write succeeded
    fn save(&mut self, path: &Path) -> Result<()>;
}

/// Renders a page to pixels for the preview
pub trait PageRasterizer {
    fn rasterize(&self, path: &Path, page: usize, dpi: f64) -> Result<RgbaImage>;
}

/// Handle to an image embedded in one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef(usize);

impl ImageRef {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// How a page is displayed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Visual extents, swapped for quarter-turn rotations
    pub size: PageSize,
    /// Clockwise display rotation: 0, 90, 180 or 270
    pub rotation: u16,
    /// Lower-left corner of the visible box in user space
    pub origin: (f64, f64),
}

impl PageGeometry {
    /// Geometry of a box `width`×`height` in user space at `origin`
    pub fn new(width: f64, height: f64, rotation: u16, origin: (f64, f64)) -> Self {
        let rotation = rotation % 360;
        let size = if rotation == 90 || rotation == 270 {
            PageSize::new(height, width)
        } else {
            PageSize::new(width, height)
        };
        Self {
            size,
            rotation,
            origin,
        }
    }

    /// Unrotated width and height of the visible box
    pub fn user_size(&self) -> (f64, f64) {
        if self.rotation == 90 || self.rotation == 270 {
            (self.size.height, self.size.width)
        } else {
            (self.size.width, self.size.height)
        }
    }

    /// Matrix taking visual points into the page's user space
    pub fn visual_to_user(&self) -> Matrix {
        let (w, h) = self.user_size();
        let (ox, oy) = self.origin;
        let turn = match self.rotation {
            90 => Matrix::new(0.0, 1.0, -1.0, 0.0, w, 0.0),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
            270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, h),
            _ => Matrix::identity(),
        };
        turn.then(&Matrix::translate(ox, oy))
    }
}
