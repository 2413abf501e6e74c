//! Watermark data model
//!
//! A [`WatermarkSet`] is an ordered collection: insertion order is z-order,
//! later entries are drawn on top. Every watermark carries its own
//! transform (scale, angle, opacity) and grid settings, and values are
//! clamped into range at this boundary so renderers never see invalid input.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assets::{AssetStore, ImageAsset};
use crate::coords::{CanvasPoint, CoordinateSpace, PagePoint, PageSize};
use crate::error::Error;
use crate::fonts::{self, FontResolver, DEFAULT_FONT_FAMILY, TEXT_BASE_SIZE};

pub const DEFAULT_SCALE: f64 = 1.0;
pub const DEFAULT_OPACITY: f64 = 0.5;
pub const MIN_SCALE: f64 = 0.01;
pub const MAX_SCALE: f64 = 10.0;
pub const MIN_OPACITY: f64 = 0.01;
pub const MIN_GRID_GAP: f64 = 1.0;
pub const DEFAULT_GRID_GAP: f64 = 100.0;

/// Margin used by the top-left placement preset
pub const TOP_LEFT_MARGIN: f64 = 50.0;

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a watermark within its set. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatermarkId(u64);

impl WatermarkId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Identifies a [`WatermarkSet`] instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetId(u64);

/// Handle to the selected watermark: owning set plus watermark id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub set: SetId,
    pub id: WatermarkId,
}

/// RGB color, channels in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Default for Rgb {
    fn default() -> Self {
        Self::black()
    }
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
        }
    }

    pub fn black() -> Self {
        Self { r: 0.0, g: 0.0, b: 0.0 }
    }

    /// Parse `#rrggbb` or `#rgb`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f64 / 255.0);
        match digits.len() {
            6 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let expand = |i: usize| {
                    let c = &digits[i..i + 1];
                    channel(&format!("{c}{c}"))
                };
                Some(Self::new(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => None,
        }
    }

    /// Channels as 0..=255
    pub fn to_bytes(&self) -> [u8; 3] {
        let b = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        [b(self.r), b(self.g), b(self.b)]
    }
}

/// Text watermark content and style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub content: String,
    pub font_family: String,
    pub color: Rgb,
}

impl TextStyle {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: Rgb::black(),
        }
    }
}

/// What a watermark draws
#[derive(Debug, Clone)]
pub enum WatermarkKind {
    Image(ImageAsset),
    Text(TextStyle),
}

/// Per-watermark visual transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Multiplier on the intrinsic size, > 0
    pub scale: f64,
    /// Degrees, positive is counter-clockwise
    pub angle: f64,
    /// Alpha multiplier in (0, 1]
    pub opacity: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            angle: 0.0,
            opacity: DEFAULT_OPACITY,
        }
    }
}

impl Transform {
    /// Copy with every field clamped into its valid range
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        Self {
            scale: clamp_scale(self.scale).unwrap_or(defaults.scale),
            angle: normalize_angle(self.angle).unwrap_or(defaults.angle),
            opacity: clamp_opacity(self.opacity).unwrap_or(defaults.opacity),
        }
    }
}

/// Grid / tiling settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub enabled: bool,
    pub gap_x: f64,
    pub gap_y: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            gap_x: DEFAULT_GRID_GAP,
            gap_y: DEFAULT_GRID_GAP,
        }
    }
}

/// A single placed watermark
#[derive(Debug, Clone)]
pub struct Watermark {
    id: WatermarkId,
    pub kind: WatermarkKind,
    /// Anchor (geometric center) in points
    pub position: PagePoint,
    pub transform: Transform,
    pub grid: GridSettings,
}

impl Watermark {
    pub fn id(&self) -> WatermarkId {
        self.id
    }

    /// Unrotated size in points at the current scale
    ///
    /// One image pixel maps to one point at scale 1.0. Text boxes use the
    /// default font resolver's metrics.
    pub fn extent(&self) -> (f64, f64) {
        match &self.kind {
            WatermarkKind::Image(asset) => {
                let (w, h) = asset.dimensions();
                (w as f64 * self.transform.scale, h as f64 * self.transform.scale)
            }
            WatermarkKind::Text(style) => {
                let font = FontResolver::default().resolve(&style.font_family, &style.content);
                let extent = fonts::measure_text(
                    &style.content,
                    &font,
                    TEXT_BASE_SIZE * self.transform.scale,
                );
                (extent.width, extent.height())
            }
        }
    }

    /// Axis-aligned size in points after rotation
    pub fn rotated_extent(&self) -> (f64, f64) {
        let (w, h) = self.extent();
        rotated_bounds(w, h, self.transform.angle)
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct WatermarkUpdate {
    pub position: Option<PagePoint>,
    pub scale: Option<f64>,
    pub angle: Option<f64>,
    pub opacity: Option<f64>,
    pub grid_enabled: Option<bool>,
    pub gap_x: Option<f64>,
    pub gap_y: Option<f64>,
    pub content: Option<String>,
    pub font_family: Option<String>,
    pub color: Option<Rgb>,
}

/// Ordered, z-ordered collection of watermarks with an optional selection
#[derive(Debug, Clone)]
pub struct WatermarkSet {
    set_id: SetId,
    items: Vec<Watermark>,
    next_id: u64,
    selected: Option<WatermarkId>,
}

impl Default for WatermarkSet {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkSet {
    pub fn new() -> Self {
        Self {
            set_id: SetId(NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)),
            items: Vec::new(),
            next_id: 1,
            selected: None,
        }
    }

    /// Frozen copy for a batch run: new identity, no selection
    pub fn snapshot(&self) -> Self {
        Self {
            set_id: SetId(NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)),
            items: self.items.clone(),
            next_id: self.next_id,
            selected: None,
        }
    }

    pub fn set_id(&self) -> SetId {
        self.set_id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Watermarks in z-order (bottom first)
    pub fn iter(&self) -> impl Iterator<Item = &Watermark> {
        self.items.iter()
    }

    pub fn get(&self, id: WatermarkId) -> Option<&Watermark> {
        self.items.iter().find(|w| w.id == id)
    }

    fn get_mut(&mut self, id: WatermarkId) -> Option<&mut Watermark> {
        self.items.iter_mut().find(|w| w.id == id)
    }

    /// Add an image watermark centered on `page` with default transform
    pub fn add_image(&mut self, asset: ImageAsset, page: PageSize) -> WatermarkId {
        self.push(WatermarkKind::Image(asset), page)
    }

    /// Add a text watermark centered on `page` with default transform
    pub fn add_text(&mut self, content: impl Into<String>, page: PageSize) -> WatermarkId {
        self.push(WatermarkKind::Text(TextStyle::new(content)), page)
    }

    fn push(&mut self, kind: WatermarkKind, page: PageSize) -> WatermarkId {
        let id = WatermarkId(self.next_id);
        self.next_id += 1;
        self.items.push(Watermark {
            id,
            kind,
            position: page.center(),
            transform: Transform::default(),
            grid: GridSettings::default(),
        });
        debug!(id = id.0, count = self.items.len(), "watermark added");
        id
    }

    /// Remove a watermark; clears the selection if it pointed at it
    pub fn remove(&mut self, id: WatermarkId) -> Option<Watermark> {
        let index = self.items.iter().position(|w| w.id == id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.items.remove(index))
    }

    /// Select a watermark for editing
    pub fn select(&mut self, id: WatermarkId) -> Option<Selection> {
        self.get(id)?;
        self.selected = Some(id);
        Some(Selection {
            set: self.set_id,
            id,
        })
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selected.map(|id| Selection {
            set: self.set_id,
            id,
        })
    }

    pub fn selected(&self) -> Option<&Watermark> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Resolve a handle against this set
    pub fn resolve(&self, handle: Selection) -> Option<&Watermark> {
        if handle.set != self.set_id {
            return None;
        }
        self.get(handle.id)
    }

    /// Merge the supplied fields into a watermark, clamping into range
    ///
    /// Returns false when the watermark does not exist.
    pub fn update_properties(&mut self, id: WatermarkId, update: WatermarkUpdate) -> bool {
        let Some(watermark) = self.get_mut(id) else {
            return false;
        };

        if let Some(position) = update.position {
            if position.x.is_finite() && position.y.is_finite() {
                watermark.position = position;
            }
        }
        if let Some(scale) = update.scale.and_then(clamp_scale) {
            watermark.transform.scale = scale;
        }
        if let Some(angle) = update.angle.and_then(normalize_angle) {
            watermark.transform.angle = angle;
        }
        if let Some(opacity) = update.opacity.and_then(clamp_opacity) {
            watermark.transform.opacity = opacity;
        }
        if let Some(enabled) = update.grid_enabled {
            watermark.grid.enabled = enabled;
        }
        if let Some(gap) = update.gap_x.and_then(clamp_gap) {
            watermark.grid.gap_x = gap;
        }
        if let Some(gap) = update.gap_y.and_then(clamp_gap) {
            watermark.grid.gap_y = gap;
        }

        match &mut watermark.kind {
            WatermarkKind::Text(style) => {
                if let Some(content) = update.content {
                    style.content = content;
                }
                if let Some(family) = update.font_family {
                    style.font_family = family;
                }
                if let Some(color) = update.color {
                    style.color = Rgb::new(color.r, color.g, color.b);
                }
            }
            WatermarkKind::Image(_) => {
                if update.content.is_some() || update.font_family.is_some() || update.color.is_some() {
                    debug!(id = id.0, "text properties ignored for image watermark");
                }
            }
        }
        true
    }

    /// Turn off tiling after the grid was rejected as invalid
    pub fn disable_grid(&mut self, id: WatermarkId) -> bool {
        match self.get_mut(id) {
            Some(watermark) => {
                watermark.grid.enabled = false;
                true
            }
            None => false,
        }
    }

    /// Move a watermark to the page center
    pub fn center_on(&mut self, id: WatermarkId, page: PageSize) -> bool {
        self.update_properties(
            id,
            WatermarkUpdate {
                position: Some(page.center()),
                ..Default::default()
            },
        )
    }

    /// Move a watermark so its unrotated box sits `margin` points from the top-left corner
    pub fn move_to_top_left(&mut self, id: WatermarkId, page: PageSize, margin: f64) -> bool {
        let Some(watermark) = self.get(id) else {
            return false;
        };
        let (w, h) = watermark.extent();
        let position = PagePoint::new(margin + w / 2.0, page.height - margin - h / 2.0);
        self.update_properties(
            id,
            WatermarkUpdate {
                position: Some(position),
                ..Default::default()
            },
        )
    }

    /// Topmost watermark whose rotated bounding box contains a canvas point
    pub fn hit_test(&self, point: CanvasPoint, space: &CoordinateSpace) -> Option<WatermarkId> {
        let target = space.to_points(point)?;
        self.items
            .iter()
            .rev()
            .find(|w| {
                let (bw, bh) = w.rotated_extent();
                (target.x - w.position.x).abs() <= bw / 2.0
                    && (target.y - w.position.y).abs() <= bh / 2.0
            })
            .map(|w| w.id)
    }

    /// Start dragging a watermark from a canvas pointer position
    ///
    /// Returns `None` when no page is loaded or the watermark does not exist.
    pub fn begin_drag(
        &self,
        id: WatermarkId,
        pointer: CanvasPoint,
        space: &CoordinateSpace,
    ) -> Option<DragGesture> {
        let watermark = self.get(id)?.clone();
        let origin = space.to_canvas(watermark.position)?;
        Some(DragGesture {
            handle: Selection {
                set: self.set_id,
                id,
            },
            pointer_start: pointer,
            origin,
            transient: watermark,
        })
    }

    /// Serializable description of the set (image pixels are referenced by path)
    pub fn to_template(&self) -> WatermarkTemplate {
        let watermarks = self
            .items
            .iter()
            .filter_map(|w| {
                let kind = match &w.kind {
                    WatermarkKind::Image(asset) => match asset.source() {
                        Some(path) => TemplateKind::Image {
                            path: path.to_path_buf(),
                        },
                        None => {
                            warn!(id = w.id.0, "image watermark without a source path left out of template");
                            return None;
                        }
                    },
                    WatermarkKind::Text(style) => TemplateKind::Text(style.clone()),
                };
                Some(TemplateEntry {
                    kind,
                    position: w.position,
                    transform: w.transform,
                    grid: w.grid,
                })
            })
            .collect();
        WatermarkTemplate { watermarks }
    }

    /// Rebuild a set from a template
    ///
    /// Image load failures only drop the affected entry; they are returned
    /// alongside the set.
    pub fn from_template(template: &WatermarkTemplate, assets: &dyn AssetStore) -> (Self, Vec<Error>) {
        let mut set = Self::new();
        let mut errors = Vec::new();

        for entry in &template.watermarks {
            let kind = match &entry.kind {
                TemplateKind::Image { path } => match assets.load_image(path) {
                    Ok(asset) => WatermarkKind::Image(asset),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "template image could not be loaded");
                        errors.push(e);
                        continue;
                    }
                },
                TemplateKind::Text(style) => WatermarkKind::Text(TextStyle {
                    color: Rgb::new(style.color.r, style.color.g, style.color.b),
                    ..style.clone()
                }),
            };

            let id = set.push(kind, PageSize::default());
            set.update_properties(
                id,
                WatermarkUpdate {
                    position: Some(entry.position),
                    scale: Some(entry.transform.scale),
                    angle: Some(entry.transform.angle),
                    opacity: Some(entry.transform.opacity),
                    grid_enabled: Some(entry.grid.enabled),
                    gap_x: Some(entry.grid.gap_x),
                    gap_y: Some(entry.grid.gap_y),
                    ..Default::default()
                },
            );
        }

        (set, errors)
    }
}

/// In-progress pointer drag over a transient copy of one watermark
///
/// Pointer motion only touches the copy. The authoritative set changes once,
/// when the gesture is committed on release.
#[derive(Debug, Clone)]
pub struct DragGesture {
    handle: Selection,
    pointer_start: CanvasPoint,
    origin: CanvasPoint,
    transient: Watermark,
}

impl DragGesture {
    pub fn handle(&self) -> Selection {
        self.handle
    }

    /// Follow the pointer; ignored while no page is loaded
    pub fn update(&mut self, pointer: CanvasPoint, space: &CoordinateSpace) {
        let center = CanvasPoint::new(
            self.origin.x + (pointer.x - self.pointer_start.x),
            self.origin.y + (pointer.y - self.pointer_start.y),
        );
        if let Some(position) = space.to_points(center) {
            self.transient.position = position;
        }
    }

    /// The watermark as it should be drawn mid-gesture
    pub fn watermark(&self) -> &Watermark {
        &self.transient
    }

    /// Write the final position back; false if the target is gone
    pub fn commit(self, set: &mut WatermarkSet) -> bool {
        if set.resolve(self.handle).is_none() {
            return false;
        }
        set.update_properties(
            self.handle.id,
            WatermarkUpdate {
                position: Some(self.transient.position),
                ..Default::default()
            },
        )
    }
}

/// Saved watermark set, as stored in settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatermarkTemplate {
    pub watermarks: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub kind: TemplateKind,
    pub position: PagePoint,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub grid: GridSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemplateKind {
    Image { path: PathBuf },
    Text(TextStyle),
}

/// Clamp a scale into `[MIN_SCALE, MAX_SCALE]`; `None` for NaN/infinite input
pub fn clamp_scale(scale: f64) -> Option<f64> {
    scale.is_finite().then(|| scale.clamp(MIN_SCALE, MAX_SCALE))
}

/// Clamp an opacity into `[MIN_OPACITY, 1]`; `None` for NaN/infinite input
pub fn clamp_opacity(opacity: f64) -> Option<f64> {
    opacity.is_finite().then(|| opacity.clamp(MIN_OPACITY, 1.0))
}

/// Clamp a grid gap to at least `MIN_GRID_GAP`; `None` for NaN/infinite input
pub fn clamp_gap(gap: f64) -> Option<f64> {
    gap.is_finite().then(|| gap.max(MIN_GRID_GAP))
}

/// Angle in `(-360, 360)`, sign kept; `None` for NaN/infinite input
pub fn normalize_angle(angle: f64) -> Option<f64> {
    angle.is_finite().then(|| angle % 360.0)
}

/// Axis-aligned bounds of a `w`×`h` box rotated by `angle` degrees
pub fn rotated_bounds(w: f64, h: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.to_radians().sin_cos();
    let (sin, cos) = (sin.abs(), cos.abs());
    (w * cos + h * sin, w * sin + h * cos)
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
