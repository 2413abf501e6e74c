//! Page boxes, inherited page attributes and affine matrices

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::warn;

use super::engine::PageGeometry;
use crate::error::{Error, Result};

/// Parent links followed before giving up on an inherited attribute
const MAX_INHERITANCE_DEPTH: usize = 32;

/// US Letter, used when a page has no usable MediaBox
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Represents a PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Apply `self` first, then `next`
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    /// Inverse transform; `None` for a singular matrix
    pub fn inverse(&self) -> Option<Matrix> {
        // | a  c  e |        | d/det   -c/det   (c*f - d*e)/det |
        // | b  d  f |  -->   | -b/det   a/det   (b*e - a*f)/det |
        // | 0  0  1 |        |   0       0            1         |
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }
        Some(Matrix {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    pub fn is_identity(&self) -> bool {
        (self.a - 1.0).abs() < 1e-9
            && self.b.abs() < 1e-9
            && self.c.abs() < 1e-9
            && (self.d - 1.0).abs() < 1e-9
            && self.e.abs() < 1e-9
            && self.f.abs() < 1e-9
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Operands followed by `op`, e.g. `"1 0 0 1 10 20 cm"`
    pub fn to_operator(&self, op: &str) -> String {
        format!(
            "{} {} {} {} {} {} {}\n",
            number(self.a),
            number(self.b),
            number(self.c),
            number(self.d),
            number(self.e),
            number(self.f),
            op
        )
    }
}

/// Format a number for a content stream: short, no exponent, no `-0`
pub fn number(value: f64) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Count pages by reading the Count field from the Pages dictionary
///
/// Used to detect empty documents without walking the page tree.
pub fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc
        .catalog()
        .map_err(|_| Error::General("No Root catalog in trailer".to_string()))?;

    let pages_id = catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| Error::General("No Pages reference in catalog".to_string()))?;

    let pages = doc.get_dictionary(pages_id)?;
    match pages.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => Ok(*n as usize),
        _ => Err(Error::General("Pages Count is missing or invalid".to_string())),
    }
}

/// Display geometry of a page, resolving inherited boxes and rotation
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| read_rect(doc, &o))
        .unwrap_or(DEFAULT_MEDIA_BOX);

    let visible = inherited(doc, page_id, b"CropBox")
        .and_then(|o| read_rect(doc, &o))
        .and_then(|crop| intersect(crop, media))
        .unwrap_or(media);

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|o| resolve(doc, &o).as_i64().ok())
        .map(normalize_rotation)
        .unwrap_or(0);

    PageGeometry::new(
        visible[2] - visible[0],
        visible[3] - visible[1],
        rotation,
        (visible[0], visible[1]),
    )
}

/// Look up a page attribute, following `/Parent` for inheritable keys
pub fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current: &Dictionary = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Follow a reference to the object it points at
pub fn resolve(doc: &Document, object: &Object) -> Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).cloned().unwrap_or(Object::Null),
        other => other.clone(),
    }
}

/// Resolve an object that should be a dictionary; anything else is empty
pub fn resolve_dict(doc: &Document, object: &Object) -> Dictionary {
    match resolve(doc, object) {
        Object::Dictionary(dict) => dict,
        _ => Dictionary::new(),
    }
}

fn read_rect(doc: &Document, object: &Object) -> Option<[f64; 4]> {
    let Object::Array(items) = resolve(doc, object) else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }

    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(&items) {
        *slot = as_number(&resolve(doc, item))?;
    }

    // Normalize corner order
    let rect = [
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

fn as_number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn intersect(a: [f64; 4], b: [f64; 4]) -> Option<[f64; 4]> {
    let rect = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

fn normalize_rotation(rotate: i64) -> u16 {
    let turn = rotate.rem_euclid(360);
    if turn % 90 != 0 {
        warn!(rotate, "ignoring page rotation that is not a multiple of 90");
        return 0;
    }
    turn as u16
}
