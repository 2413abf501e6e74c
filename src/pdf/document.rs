//! lopdf-backed document engine
//!
//! Watermark operations are buffered per page and written on save: the
//! page's original content is wrapped in `q … Q`, then one stream per page
//! maps visual points into user space and draws every watermark placed on it.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use lopdf::{Dictionary, Document, ObjectId, Stream};
use tracing::debug;

use super::engine::{DocumentEngine, EditableDocument, ImageRef, PageGeometry};
use super::geometry::{count_pages_from_catalog, number, page_geometry, Matrix};
use super::resources::{
    add_font, add_image_xobject, add_opacity_state, add_resources_to_page,
    append_content_to_page, base_font, encode_text, isolate_page_content, ResourceSet,
};
use crate::coords::PointRect;
use crate::error::{Error, Result};
use crate::render::TextPlacement;

/// Opens PDFs from disk with lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl DocumentEngine for LopdfEngine {
    type Document = LopdfDocument;

    fn open(&self, path: &Path) -> Result<LopdfDocument> {
        LopdfDocument::load(path)
    }
}

/// Watermark content waiting to be written onto one page
#[derive(Debug, Default)]
struct PageOverlay {
    operators: String,
    resources: ResourceSet,
}

/// An open PDF with pending watermark placements
pub struct LopdfDocument {
    source: PathBuf,
    doc: Document,
    pages: Vec<ObjectId>,
    images: Vec<ObjectId>,
    fonts: HashMap<&'static str, ObjectId>,
    opacity_states: HashMap<u32, ObjectId>,
    overlays: BTreeMap<usize, PageOverlay>,
}

impl LopdfDocument {
    /// Load a PDF; documents without pages are rejected
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let doc = Document::load(path)?;
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        if pages.is_empty() || count_pages_from_catalog(&doc).unwrap_or(pages.len()) == 0 {
            return Err(Error::EmptyPdf(path.to_path_buf()));
        }
        debug!(path = %path.display(), pages = pages.len(), "opened document");

        Ok(Self::from_document(doc, path))
    }

    /// Wrap an already parsed document
    pub fn from_document(doc: Document, source: impl Into<PathBuf>) -> Self {
        let pages = doc.get_pages().values().copied().collect();
        Self {
            source: source.into(),
            doc,
            pages,
            images: Vec::new(),
            fonts: HashMap::new(),
            opacity_states: HashMap::new(),
            overlays: BTreeMap::new(),
        }
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages.get(index).copied().ok_or(Error::PageOutOfRange {
            index,
            count: self.pages.len(),
        })
    }

    fn overlay(&mut self, index: usize) -> Result<&mut PageOverlay> {
        self.page_id(index)?;
        Ok(self.overlays.entry(index).or_default())
    }

    fn opacity_state(&mut self, opacity: f64) -> Option<(String, ObjectId)> {
        if opacity >= 1.0 {
            return None;
        }
        let key = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u32;
        let doc = &mut self.doc;
        let id = *self
            .opacity_states
            .entry(key)
            .or_insert_with(|| add_opacity_state(doc, key as f64 / 1000.0));
        Some((format!("WmGs{}", key), id))
    }

    /// Write every buffered overlay into its page
    fn flush_overlays(&mut self) -> Result<()> {
        let overlays = std::mem::take(&mut self.overlays);
        for (index, overlay) in overlays {
            let page_id = self.page_id(index)?;
            let geometry = page_geometry(&self.doc, page_id);

            let mut content = String::from("q\n");
            let to_user = geometry.visual_to_user();
            if !to_user.is_identity() {
                content.push_str(&to_user.to_operator("cm"));
            }
            content.push_str(&overlay.operators);
            content.push_str("Q\n");

            isolate_page_content(&mut self.doc, page_id)?;
            let content_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            append_content_to_page(&mut self.doc, page_id, content_id)?;
            add_resources_to_page(&mut self.doc, page_id, &overlay.resources)?;
        }
        Ok(())
    }
}

impl EditableDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
        let page_id = self.page_id(index)?;
        Ok(page_geometry(&self.doc, page_id))
    }

    fn register_image(&mut self, bitmap: &RgbaImage) -> Result<ImageRef> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(Error::InvalidConfiguration(
                "cannot embed an empty image".to_string(),
            ));
        }
        let id = add_image_xobject(&mut self.doc, bitmap);
        self.images.push(id);
        Ok(ImageRef::new(self.images.len() - 1))
    }

    fn place_image(&mut self, index: usize, rect: PointRect, image: ImageRef) -> Result<()> {
        let image_id = *self.images.get(image.index()).ok_or_else(|| {
            Error::General(format!("image {} is not registered", image.index()))
        })?;
        let name = format!("WmIm{}", image.index());

        let overlay = self.overlay(index)?;
        overlay.resources.xobjects.insert(name.clone(), image_id);
        overlay.operators.push_str("q\n");
        overlay.operators.push_str(
            &Matrix::new(rect.width(), 0.0, 0.0, rect.height(), rect.x0, rect.y0).to_operator("cm"),
        );
        overlay.operators.push_str(&format!("/{} Do\nQ\n", name));
        Ok(())
    }

    fn place_text(&mut self, index: usize, text: &TextPlacement) -> Result<()> {
        self.page_id(index)?;
        let class = text.layout.font.class;
        let base = base_font(class);

        let doc = &mut self.doc;
        let font_id = *self.fonts.entry(base).or_insert_with(|| add_font(doc, class));
        let font_name = format!("WmF{}", font_id.0);
        let state = self.opacity_state(text.opacity);

        let [a, b, c, d, e, f] = text.layout.text_matrix();
        let mut ops = String::from("q\n");
        if let Some((name, _)) = &state {
            ops.push_str(&format!("/{} gs\n", name));
        }
        ops.push_str(&format!(
            "{} {} {} rg\nBT\n/{} {} Tf\n",
            number(text.color.r),
            number(text.color.g),
            number(text.color.b),
            font_name,
            number(text.layout.size)
        ));
        ops.push_str(&Matrix::new(a, b, c, d, e, f).to_operator("Tm"));
        ops.push_str(&format!("{} Tj\nET\nQ\n", encode_text(&text.content, class)));

        let overlay = self.overlay(index)?;
        overlay.resources.fonts.insert(font_name, font_id);
        if let Some((name, id)) = state {
            overlay.resources.ext_gstates.insert(name, id);
        }
        overlay.operators.push_str(&ops);
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.flush_overlays()?;
        self.doc.compress();

        let temp = temp_path_for(path);
        let written = self
            .doc
            .save(&temp)
            .map(drop)
            .map_err(Error::from)
            .and_then(|_| fs::rename(&temp, path).map_err(Error::from));

        if written.is_err() {
            let _ = fs::remove_file(&temp);
        } else {
            debug!(source = %self.source.display(), path = %path.display(), "saved document");
        }
        written
    }
}

/// Sibling path the document is written to before being renamed into place
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.pdf".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
