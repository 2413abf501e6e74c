//! Persisted user settings and named watermark templates
//!
//! The library only converts settings to and from JSON text; reading and
//! writing the file is left to the front end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::{OutputLocation, DEFAULT_SUFFIX};
use crate::error::Result;
use crate::model::{Transform, WatermarkSet, WatermarkTemplate, DEFAULT_OPACITY, DEFAULT_SCALE};
use crate::selection::{PageSelection, RangeMode};

/// File name used when the front end keeps settings next to the executable
pub const SETTINGS_FILE_NAME: &str = "watermark_settings.json";

/// Last-used values, restored on the next start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Image most recently chosen as a watermark
    #[serde(alias = "watermark_path")]
    pub last_watermark_path: Option<PathBuf>,
    pub scale: f64,
    pub opacity: f64,
    pub angle: f64,
    pub range_mode: RangeMode,
    pub custom_range: String,
    /// Output directory; `None` writes beside each source
    pub output_dir: Option<PathBuf>,
    pub output_suffix: String,
    pub templates: BTreeMap<String, WatermarkTemplate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_watermark_path: None,
            scale: DEFAULT_SCALE,
            opacity: DEFAULT_OPACITY,
            angle: 0.0,
            range_mode: RangeMode::All,
            custom_range: String::new(),
            output_dir: None,
            output_suffix: DEFAULT_SUFFIX.to_string(),
            templates: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)?;
        debug!(templates = settings.templates.len(), "settings parsed");
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The stored watermark path, ignoring an empty string
    pub fn last_watermark_path(&self) -> Option<&Path> {
        self.last_watermark_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn page_selection(&self) -> PageSelection {
        PageSelection::from_mode(self.range_mode, &self.custom_range)
    }

    /// Remember a selection, keeping the custom text for non-custom modes
    pub fn set_page_selection(&mut self, selection: &PageSelection) {
        self.range_mode = selection.mode();
        if let PageSelection::Custom(ranges) = selection {
            self.custom_range = ranges.to_string();
        }
    }

    /// Transform for newly added watermarks; invalid stored values fall back to defaults
    pub fn default_transform(&self) -> Transform {
        Transform {
            scale: self.scale,
            angle: self.angle,
            opacity: self.opacity,
        }
        .clamped()
    }

    pub fn output_location(&self) -> OutputLocation {
        match &self.output_dir {
            Some(dir) if !dir.as_os_str().is_empty() => OutputLocation::Directory(dir.clone()),
            _ => OutputLocation::BesideSource,
        }
    }

    pub fn template(&self, name: &str) -> Option<&WatermarkTemplate> {
        self.templates.get(name)
    }

    /// Store the set under `name`, replacing any template with that name
    pub fn save_template(&mut self, name: impl Into<String>, set: &WatermarkSet) {
        let name = name.into();
        let template = set.to_template();
        debug!(name = %name, watermarks = template.watermarks.len(), "template saved");
        self.templates.insert(name, template);
    }

    pub fn remove_template(&mut self, name: &str) -> bool {
        self.templates.remove(name).is_some()
    }
}
