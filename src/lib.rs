//! PDF Watermarker Library
//!
//! Places image and text watermarks on PDF pages and applies a watermark set
//! to a batch of documents. This library provides functionality to:
//! - Keep an ordered, editable set of watermarks in PDF point space
//! - Convert between point space and the zoomed preview canvas
//! - Tile a watermark across a page on a regular grid
//! - Render watermarks identically for the preview and for the written PDF
//! - Select pages (all, odd, even or custom ranges)
//! - Write watermarks into PDFs with lopdf, one document at a time
//!
//! # Example
//!
//! ```no_run
//! use pdf_watermarker::batch::{BatchJob, CancelToken};
//! use pdf_watermarker::coords::PageSize;
//! use pdf_watermarker::model::WatermarkSet;
//! use pdf_watermarker::pdf::LopdfEngine;
//! use pdf_watermarker::selection::PageSelection;
//! use std::path::PathBuf;
//!
//! let mut set = WatermarkSet::new();
//! set.add_text("CONFIDENTIAL", PageSize::new(612.0, 792.0));
//!
//! let job = BatchJob::new(
//!     vec![PathBuf::from("report.pdf"), PathBuf::from("invoice.pdf")],
//!     &set,
//!     PageSelection::All,
//! );
//! let report = job
//!     .run(&LopdfEngine, &CancelToken::new(), |p| eprintln!("{}/{}", p.completed, p.total))
//!     .expect("batch could not start");
//! println!("{} documents watermarked", report.succeeded());
//! ```

pub mod assets;
pub mod batch;
pub mod coords;
pub mod error;
pub mod fonts;
pub mod grid;
pub mod model;
pub mod pdf;
pub mod preview;
pub mod render;
pub mod selection;
pub mod settings;

// Re-export commonly used items
pub use batch::{BatchJob, BatchReport, CancelToken, OutputLocation};
pub use error::{Error, Result};
pub use model::{Watermark, WatermarkId, WatermarkSet};
pub use selection::PageSelection;
pub use settings::Settings;
