//! PDF manipulation module

pub mod document;
pub mod engine;
pub mod geometry;
pub mod resources;

// Re-export commonly used items
pub use document::{LopdfDocument, LopdfEngine};
pub use engine::{DocumentEngine, EditableDocument, ImageRef, PageGeometry, PageRasterizer};
pub use geometry::Matrix;
