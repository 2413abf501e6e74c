//! Error types for the PDF watermarker library

use std::path::PathBuf;
use thiserror::Error;

use crate::batch::SkippedWatermark;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF watermarker library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Watermark image could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings (de)serialization error
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// A watermark parameter that cannot be clamped into range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A watermark asset failed to load or render
    #[error("Asset error ({}): {reason}", .path.display())]
    Asset { path: PathBuf, reason: String },

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Page index beyond the document
    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    /// Output would replace its own input
    #[error("Output path is the source document: {}", .0.display())]
    OutputOverwritesSource(PathBuf),

    /// Batch started without any watermark
    #[error("No watermarks to apply")]
    NoWatermarks,

    /// Every watermark of a batch failed to prepare
    #[error("No watermark could be applied: {}", describe_skipped(.0))]
    AllWatermarksSkipped(Vec<SkippedWatermark>),

    /// Output path already written earlier in the same batch
    #[error("Output path already used by another document: {}", .0.display())]
    OutputCollision(PathBuf),

    /// Batch started without any document
    #[error("No input documents provided")]
    NoDocuments,

    /// Page selection cannot match any page
    #[error("Page selection does not select any page")]
    NoPagesSelected,

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Build an asset error for the given source path
    pub fn asset(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Asset {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn describe_skipped(skipped: &[SkippedWatermark]) -> String {
    skipped
        .iter()
        .map(|s| s.error.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
