//! Watermark image assets
//!
//! Assets are decoded once into an RGBA buffer and shared read-only, so a
//! batch snapshot can hold them without copying pixels.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::error::{Error, Result};

/// A decoded watermark image
#[derive(Clone)]
pub struct ImageAsset {
    source: Option<PathBuf>,
    bitmap: Arc<RgbaImage>,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("source", &self.source)
            .field("dimensions", &(self.bitmap.width(), self.bitmap.height()))
            .finish()
    }
}

impl ImageAsset {
    /// Wrap an in-memory bitmap
    pub fn from_bitmap(bitmap: RgbaImage) -> Self {
        Self {
            source: None,
            bitmap: Arc::new(bitmap),
        }
    }

    /// Wrap a bitmap decoded from `path`
    pub fn with_source(bitmap: RgbaImage, path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            bitmap: Arc::new(bitmap),
        }
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Intrinsic size in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }
}

/// Source of watermark images
pub trait AssetStore {
    /// Decode the image at `path` into RGBA
    fn load_image(&self, path: &Path) -> Result<ImageAsset>;
}

/// Loads images from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAssetStore;

impl AssetStore for FsAssetStore {
    fn load_image(&self, path: &Path) -> Result<ImageAsset> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let decoded = image::open(path).map_err(|e| Error::asset(path, e.to_string()))?;
        let bitmap = decoded.to_rgba8();
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(Error::asset(path, "image has no pixels"));
        }

        debug!(path = %path.display(), width = bitmap.width(), height = bitmap.height(), "loaded watermark image");
        Ok(ImageAsset::with_source(bitmap, path))
    }
}
