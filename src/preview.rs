//! Interactive preview: one page of one document with the live watermark set on top
//!
//! The session never keeps a document open between calls. Every page load
//! opens the document, reads what it needs and drops the handle before
//! returning, so a preview can never hold a file the batch wants to write.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::coords::{CanvasPoint, CoordinateSpace, PageSize, PREVIEW_DPI};
use crate::error::{Error, Result};
use crate::fonts::FontResolver;
use crate::grid;
use crate::model::{DragGesture, Watermark, WatermarkId, WatermarkKind, WatermarkSet};
use crate::pdf::{DocumentEngine, EditableDocument, PageGeometry, PageRasterizer};
use crate::render::{
    place_centered, preview_text, render_image, scale_background, PreviewSurface, PreviewText,
    RenderTarget,
};

/// A composed preview: page pixels with image watermarks blended in, plus
/// text watermarks as draw instructions for the canvas
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub canvas: RgbaImage,
    pub texts: Vec<PreviewText>,
    /// Image watermarks that failed to render and are missing from `canvas`
    pub skipped: Vec<WatermarkId>,
}

#[derive(Debug)]
struct LoadedPage {
    index: usize,
    geometry: PageGeometry,
    raster: RgbaImage,
}

/// Current document, page and zoom of the interactive front end
pub struct PreviewSession<E, R> {
    engine: E,
    rasterizer: R,
    dpi: f64,
    surface: PreviewSurface,
    fonts: FontResolver,
    path: Option<PathBuf>,
    page_count: usize,
    page: Option<LoadedPage>,
    space: CoordinateSpace,
}

impl<E: DocumentEngine, R: PageRasterizer> PreviewSession<E, R> {
    pub fn new(engine: E, rasterizer: R) -> Self {
        Self {
            engine,
            rasterizer,
            dpi: PREVIEW_DPI,
            surface: PreviewSurface { native_alpha: true },
            fonts: FontResolver::default(),
            path: None,
            page_count: 0,
            page: None,
            space: CoordinateSpace::new(),
        }
    }

    pub fn with_dpi(mut self, dpi: f64) -> Self {
        if dpi.is_finite() && dpi > 0.0 {
            self.dpi = dpi;
        }
        self
    }

    pub fn with_surface(mut self, surface: PreviewSurface) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_fonts(mut self, fonts: FontResolver) -> Self {
        self.fonts = fonts;
        self
    }

    /// Open a document and show its first page
    ///
    /// On failure the previously shown document stays loaded.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let (page_count, page) = {
            let document = self.engine.open(path)?;
            let count = document.page_count();
            if count == 0 {
                return Err(Error::EmptyPdf(path.to_path_buf()));
            }
            (count, self.read_page(&document, path, 0)?)
        };

        debug!(path = %path.display(), pages = page_count, "preview document opened");
        self.path = Some(path.to_path_buf());
        self.page_count = page_count;
        self.show(page);
        Ok(())
    }

    /// Forget the current document
    pub fn close(&mut self) {
        self.path = None;
        self.page_count = 0;
        self.page = None;
        self.space.clear();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Zero-based index of the page on screen
    pub fn current_page(&self) -> Option<usize> {
        self.page.as_ref().map(|p| p.index)
    }

    pub fn geometry(&self) -> Option<&PageGeometry> {
        self.page.as_ref().map(|p| &p.geometry)
    }

    /// Visual size of the page on screen, used for new watermarks and presets
    pub fn page_size(&self) -> Option<PageSize> {
        self.geometry().map(|g| g.size)
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    /// Step forward or back, stopping at the first and last page
    ///
    /// Returns whether the page changed.
    pub fn change_page(&mut self, delta: isize) -> Result<bool> {
        let Some(current) = self.current_page() else {
            return Ok(false);
        };
        let last = self.page_count.saturating_sub(1) as isize;
        let target = (current as isize + delta).clamp(0, last) as usize;
        if target == current {
            return Ok(false);
        }
        self.load_page(target)?;
        Ok(true)
    }

    /// Show the page with the given 1-based number
    pub fn jump_to_page(&mut self, number: usize) -> Result<()> {
        if number == 0 || number > self.page_count {
            return Err(Error::PageOutOfRange {
                index: number.saturating_sub(1),
                count: self.page_count,
            });
        }
        self.load_page(number - 1)
    }

    /// Non-positive or non-finite zoom factors are ignored
    pub fn set_zoom(&mut self, zoom: f64) {
        self.space.set_zoom(zoom);
    }

    /// Topmost watermark under the pointer
    pub fn pick(&self, set: &WatermarkSet, pointer: CanvasPoint) -> Option<WatermarkId> {
        set.hit_test(pointer, &self.space)
    }

    /// Select the watermark under the pointer and start dragging it
    pub fn begin_drag(&self, set: &mut WatermarkSet, pointer: CanvasPoint) -> Option<DragGesture> {
        let id = self.pick(set, pointer)?;
        set.select(id)?;
        set.begin_drag(id, pointer, &self.space)
    }

    /// Compose the current page with every watermark in z-order
    ///
    /// While a drag is in progress its transient copy is drawn in place of
    /// the stored watermark. A watermark whose grid cannot be expanded has its
    /// grid turned off in `set` and is drawn once. Returns `None` with no page
    /// loaded.
    pub fn compose(&self, set: &mut WatermarkSet, drag: Option<&DragGesture>) -> Option<PreviewFrame> {
        let page = self.page.as_ref()?;
        let (width, height) = self.space.canvas_size()?;
        let target = RenderTarget::preview(&self.space)?;
        let page_size = page.geometry.size;

        let invalid: Vec<WatermarkId> = set
            .iter()
            .filter(|w| grid::anchors_for(w, page_size).is_err())
            .map(|w| w.id())
            .collect();
        for id in invalid {
            warn!(id = id.get(), "invalid grid spacing, tiling turned off");
            set.disable_grid(id);
        }

        let mut frame = PreviewFrame {
            canvas: scale_background(&page.raster, width, height),
            texts: Vec::new(),
            skipped: Vec::new(),
        };

        for stored in set.iter() {
            let watermark = match drag {
                Some(gesture) if gesture.handle().set == set.set_id() && gesture.handle().id == stored.id() => {
                    gesture.watermark()
                }
                _ => stored,
            };
            self.draw(&mut frame, watermark, page_size, target);
        }

        Some(frame)
    }

    fn draw(&self, frame: &mut PreviewFrame, watermark: &Watermark, page: PageSize, target: RenderTarget) {
        let anchors = match grid::anchors_for(watermark, page) {
            Ok(anchors) => anchors,
            Err(e) => {
                warn!(id = watermark.id().get(), error = %e, "watermark not drawn");
                return;
            }
        };

        match &watermark.kind {
            WatermarkKind::Image(asset) => {
                let rendered = match render_image(asset.bitmap(), &watermark.transform, target) {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        warn!(id = watermark.id().get(), error = %e, "image watermark not drawn");
                        frame.skipped.push(watermark.id());
                        return;
                    }
                };
                for anchor in anchors {
                    if let Some(center) = self.space.to_canvas(anchor) {
                        place_centered(&mut frame.canvas, &rendered.bitmap, center);
                    }
                }
            }
            WatermarkKind::Text(style) => {
                frame.texts.extend(anchors.filter_map(|anchor| {
                    preview_text(
                        style,
                        &watermark.transform,
                        anchor,
                        &self.fonts,
                        &self.space,
                        self.surface,
                    )
                }));
            }
        }
    }

    fn load_page(&mut self, index: usize) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Err(Error::PageOutOfRange { index, count: 0 });
        };
        let page = {
            let document = self.engine.open(&path)?;
            self.read_page(&document, &path, index)?
        };
        self.show(page);
        Ok(())
    }

    fn read_page(&self, document: &E::Document, path: &Path, index: usize) -> Result<LoadedPage> {
        let geometry = document.page_geometry(index)?;
        let raster = self.rasterizer.rasterize(path, index, self.dpi)?;
        Ok(LoadedPage {
            index,
            geometry,
            raster,
        })
    }

    fn show(&mut self, page: LoadedPage) {
        self.space.set_page(page.geometry.size, page.raster.width());
        debug!(page = page.index + 1, "preview page shown");
        self.page = Some(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageAsset;
    use crate::coords::{raster_width_for, PointRect};
    use crate::model::WatermarkUpdate;
    use crate::render::{Stipple, TextFill, TextPlacement};
    use crate::pdf::ImageRef;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Three pages, the second one rotated; counts open handles
    #[derive(Default)]
    struct FakeEngine {
        open_handles: Arc<AtomicUsize>,
    }

    struct FakeDocument {
        open_handles: Arc<AtomicUsize>,
    }

    impl Drop for FakeDocument {
        fn drop(&mut self) {
            self.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl DocumentEngine for FakeEngine {
        type Document = FakeDocument;

        fn open(&self, path: &Path) -> Result<FakeDocument> {
            if path.to_string_lossy().contains("missing") {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            self.open_handles.fetch_add(1, Ordering::SeqCst);
            Ok(FakeDocument {
                open_handles: self.open_handles.clone(),
            })
        }
    }

    impl EditableDocument for FakeDocument {
        fn page_count(&self) -> usize {
            3
        }

        fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
            match index {
                0 | 2 => Ok(PageGeometry::new(612.0, 792.0, 0, (0.0, 0.0))),
                1 => Ok(PageGeometry::new(612.0, 792.0, 90, (0.0, 0.0))),
                _ => Err(Error::PageOutOfRange { index, count: 3 }),
            }
        }

        fn register_image(&mut self, _bitmap: &RgbaImage) -> Result<ImageRef> {
            Ok(ImageRef::new(0))
        }

        fn place_image(&mut self, _index: usize, _rect: PointRect, _image: ImageRef) -> Result<()> {
            Ok(())
        }

        fn place_text(&mut self, _index: usize, _text: &TextPlacement) -> Result<()> {
            Ok(())
        }

        fn save(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    /// White page at the requested density
    struct WhiteRasterizer;

    impl PageRasterizer for WhiteRasterizer {
        fn rasterize(&self, _path: &Path, page: usize, dpi: f64) -> Result<RgbaImage> {
            let size = if page == 1 {
                PageSize::new(792.0, 612.0)
            } else {
                PageSize::new(612.0, 792.0)
            };
            let width = raster_width_for(size, dpi);
            let height = raster_width_for(PageSize::new(size.height, size.width), dpi);
            Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
        }
    }

    fn session() -> PreviewSession<FakeEngine, WhiteRasterizer> {
        let mut session = PreviewSession::new(FakeEngine::default(), WhiteRasterizer);
        session.open("doc.pdf").unwrap();
        session
    }

    #[test]
    fn test_open_shows_first_page_and_releases_handle() {
        let session = session();
        assert_eq!(session.page_count(), 3);
        assert_eq!(session.current_page(), Some(0));
        assert_eq!(session.space().scale(), Some(2.0));
        assert_eq!(session.space().canvas_size(), Some((1224, 1584)));
        assert_eq!(session.engine.open_handles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_open_keeps_current_document() {
        let mut session = session();
        assert!(matches!(session.open("missing.pdf"), Err(Error::FileNotFound(_))));
        assert_eq!(session.path(), Some(Path::new("doc.pdf")));
        assert_eq!(session.current_page(), Some(0));
    }

    #[test]
    fn test_page_navigation_clamps() {
        let mut session = session();
        assert!(!session.change_page(-1).unwrap());

        assert!(session.change_page(1).unwrap());
        assert_eq!(session.page_size(), Some(PageSize::new(792.0, 612.0)));

        assert!(session.change_page(10).unwrap());
        assert_eq!(session.current_page(), Some(2));
        assert!(!session.change_page(1).unwrap());
        assert_eq!(session.engine.open_handles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_jump_to_page() {
        let mut session = session();
        assert!(matches!(
            session.jump_to_page(0),
            Err(Error::PageOutOfRange { count: 3, .. })
        ));
        assert!(matches!(
            session.jump_to_page(4),
            Err(Error::PageOutOfRange { index: 3, count: 3 })
        ));
        session.jump_to_page(2).unwrap();
        assert_eq!(session.current_page(), Some(1));
    }

    #[test]
    fn test_nothing_to_compose_without_document() {
        let session = PreviewSession::new(FakeEngine::default(), WhiteRasterizer);
        let mut set = WatermarkSet::new();
        assert!(session.compose(&mut set, None).is_none());
    }

    #[test]
    fn test_close_forgets_page() {
        let mut session = session();
        session.close();
        assert_eq!(session.current_page(), None);
        assert_eq!(session.space().scale(), None);
        assert!(!session.change_page(1).unwrap());
    }

    #[test]
    fn test_image_blended_at_canvas_position() {
        let session = session();
        let mut set = WatermarkSet::new();
        let id = set.add_image(
            ImageAsset::from_bitmap(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))),
            PageSize::new(612.0, 792.0),
        );
        set.update_properties(
            id,
            WatermarkUpdate {
                opacity: Some(1.0),
                ..Default::default()
            },
        );

        let frame = session.compose(&mut set, None).unwrap();
        assert_eq!(frame.canvas.dimensions(), (1224, 1584));
        // 10pt at 2 px/pt, centered on (612, 792)
        assert_eq!(frame.canvas.get_pixel(612, 792), &Rgba([255, 0, 0, 255]));
        assert_eq!(frame.canvas.get_pixel(603, 783), &Rgba([255, 0, 0, 255]));
        assert_eq!(frame.canvas.get_pixel(601, 781), &Rgba([255, 255, 255, 255]));
        assert!(frame.texts.is_empty());
        assert!(frame.skipped.is_empty());
    }

    #[test]
    fn test_zoom_rescales_frame() {
        let mut session = session();
        session.set_zoom(0.5);
        let frame = session.compose(&mut WatermarkSet::new(), None).unwrap();
        assert_eq!(frame.canvas.dimensions(), (612, 792));

        session.set_zoom(-1.0);
        assert_eq!(session.space().zoom(), 0.5);
    }

    #[test]
    fn test_text_fill_follows_surface() {
        let mut set = WatermarkSet::new();
        set.add_text("DRAFT", PageSize::new(612.0, 792.0));

        let frame = session().compose(&mut set, None).unwrap();
        assert_eq!(frame.texts.len(), 1);
        assert_eq!(frame.texts[0].fill, TextFill::Alpha(0.5));

        let mut stippled = PreviewSession::new(FakeEngine::default(), WhiteRasterizer)
            .with_surface(PreviewSurface {
                native_alpha: false,
            });
        stippled.open("doc.pdf").unwrap();
        let frame = stippled.compose(&mut set, None).unwrap();
        assert_eq!(frame.texts[0].fill, TextFill::Stipple(Stipple::Gray50));
    }

    #[test]
    fn test_grid_text_instances() {
        let mut set = WatermarkSet::new();
        let id = set.add_text("DRAFT", PageSize::new(612.0, 792.0));
        set.update_properties(
            id,
            WatermarkUpdate {
                grid_enabled: Some(true),
                gap_x: Some(200.0),
                gap_y: Some(200.0),
                ..Default::default()
            },
        );

        let frame = session().compose(&mut set, None).unwrap();
        assert_eq!(frame.texts.len(), 25);
    }

    #[test]
    fn test_drag_draws_transient_copy_only() {
        let session = session();
        let mut set = WatermarkSet::new();
        let id = set.add_text("DRAFT", PageSize::new(612.0, 792.0));

        let mut gesture = session
            .begin_drag(&mut set, CanvasPoint::new(612.0, 792.0))
            .unwrap();
        assert_eq!(set.selection().map(|s| s.id), Some(id));
        gesture.update(CanvasPoint::new(712.0, 792.0), session.space());

        let frame = session.compose(&mut set, Some(&gesture)).unwrap();
        assert_eq!(frame.texts[0].center, CanvasPoint::new(712.0, 792.0));
        assert_eq!(set.get(id).unwrap().position.x, 306.0);

        assert!(gesture.commit(&mut set));
        assert_eq!(set.get(id).unwrap().position.x, 356.0);
    }

    #[test]
    fn test_pick_misses_empty_area() {
        let session = session();
        let mut set = WatermarkSet::new();
        set.add_text("DRAFT", PageSize::new(612.0, 792.0));
        assert!(session.pick(&set, CanvasPoint::new(5.0, 5.0)).is_none());
        assert!(session.begin_drag(&mut set, CanvasPoint::new(5.0, 5.0)).is_none());
    }
}
