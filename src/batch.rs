//! Batch application of a frozen watermark set to many documents
//!
//! A [`BatchJob`] owns snapshots of the watermark set and the page selection,
//! so edits made while it runs never reach it. Documents are processed one
//! at a time; a failing document is recorded and the batch moves on.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fonts::FontResolver;
use crate::grid;
use crate::model::{Watermark, WatermarkId, WatermarkKind, WatermarkSet};
use crate::pdf::{DocumentEngine, EditableDocument, ImageRef};
use crate::render::{render_image, RenderTarget, RenderedImage, TextPlacement};
use crate::selection::PageSelection;

/// Suffix appended to the base name of each output document
pub const DEFAULT_SUFFIX: &str = "_marked";

/// Where output documents are written
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputLocation {
    /// Same directory as each source document
    #[default]
    BesideSource,
    /// One directory for every output, created if missing
    Directory(PathBuf),
}

/// Progress after each finished document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// A document that could not be watermarked
#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// A watermark left out of the whole batch
#[derive(Debug)]
pub struct SkippedWatermark {
    pub id: WatermarkId,
    pub error: Error,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Documents the batch tried to process
    pub attempted: usize,
    /// Written output paths, in input order
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<DocumentFailure>,
    pub skipped_watermarks: Vec<SkippedWatermark>,
    /// Set when the run stopped early
    pub cancelled: bool,
    /// Documents never started because of cancellation
    pub not_processed: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    /// Every document written and every watermark applied
    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.skipped_watermarks.is_empty()
    }
}

/// Shared flag asking a running batch to stop at the next document
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A watermark ready to be drawn: image pixels are rendered once per batch
enum Prepared {
    Image {
        watermark: Watermark,
        rendered: RenderedImage,
    },
    Text {
        watermark: Watermark,
    },
}

impl Prepared {
    fn watermark(&self) -> &Watermark {
        match self {
            Prepared::Image { watermark, .. } | Prepared::Text { watermark } => watermark,
        }
    }
}

/// Frozen inputs of one batch run
#[derive(Debug, Clone)]
pub struct BatchJob {
    documents: Vec<PathBuf>,
    watermarks: WatermarkSet,
    selection: PageSelection,
    output: OutputLocation,
    suffix: String,
    fonts: FontResolver,
}

impl BatchJob {
    /// Snapshot `watermarks` and `selection` for a run over `documents`
    pub fn new(documents: Vec<PathBuf>, watermarks: &WatermarkSet, selection: PageSelection) -> Self {
        Self {
            documents,
            watermarks: watermarks.snapshot(),
            selection,
            output: OutputLocation::default(),
            suffix: DEFAULT_SUFFIX.to_string(),
            fonts: FontResolver::default(),
        }
    }

    pub fn with_output(mut self, output: OutputLocation) -> Self {
        self.output = output;
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_fonts(mut self, fonts: FontResolver) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn documents(&self) -> &[PathBuf] {
        &self.documents
    }

    pub fn watermarks(&self) -> &WatermarkSet {
        &self.watermarks
    }

    /// `<dir>/<base name><suffix>.pdf` for a source document
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{}{}.pdf", stem, self.suffix);
        match &self.output {
            OutputLocation::BesideSource => source.with_file_name(name),
            OutputLocation::Directory(dir) => dir.join(name),
        }
    }

    /// Reject runs that cannot produce anything
    pub fn validate(&self) -> Result<()> {
        if self.documents.is_empty() {
            return Err(Error::NoDocuments);
        }
        if self.watermarks.is_empty() {
            return Err(Error::NoWatermarks);
        }
        if !self.selection.selects_any() {
            return Err(Error::NoPagesSelected);
        }
        Ok(())
    }

    /// Run the batch on the calling thread
    ///
    /// `progress` is called after every document, whether it succeeded or
    /// not. Cancellation is honored between documents.
    pub fn run<E, F>(&self, engine: &E, cancel: &CancelToken, mut progress: F) -> Result<BatchReport>
    where
        E: DocumentEngine,
        F: FnMut(Progress),
    {
        self.validate()?;

        let mut report = BatchReport::default();
        let prepared = self.prepare(&mut report);
        if prepared.is_empty() {
            return Err(Error::AllWatermarksSkipped(report.skipped_watermarks));
        }

        let total = self.documents.len();
        info!(documents = total, watermarks = prepared.len(), "batch started");
        let mut claimed = HashSet::new();

        for (index, source) in self.documents.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(remaining = total - index, "batch cancelled");
                report.cancelled = true;
                report.not_processed = self.documents[index..].to_vec();
                break;
            }

            report.attempted += 1;
            match self.process_document(engine, source, &prepared, &mut claimed) {
                Ok(output) => {
                    info!(source = %source.display(), output = %output.display(), "document watermarked");
                    report.outputs.push(output);
                }
                Err(error) => {
                    warn!(source = %source.display(), %error, "document failed");
                    report.failures.push(DocumentFailure {
                        path: source.clone(),
                        error,
                    });
                }
            }

            progress(Progress {
                completed: index + 1,
                total,
            });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failures.len(),
            "batch finished"
        );
        Ok(report)
    }

    /// Run the batch on a worker thread
    pub fn spawn<E>(self, engine: E) -> BatchHandle
    where
        E: DocumentEngine + Send + 'static,
    {
        let (sender, receiver) = channel();
        let cancel = CancelToken::new();
        let token = cancel.clone();

        let worker = thread::spawn(move || {
            self.run(&engine, &token, |p| {
                let _ = sender.send(p);
            })
        });

        BatchHandle {
            progress: receiver,
            cancel,
            worker,
        }
    }

    /// Render image watermarks and fix up grids; failures skip only that watermark
    fn prepare(&self, report: &mut BatchReport) -> Vec<Prepared> {
        let mut prepared = Vec::with_capacity(self.watermarks.len());

        for watermark in self.watermarks.iter() {
            let mut watermark = watermark.clone();
            if watermark.grid.enabled {
                if let Err(e) = grid::expand(&watermark.grid, Default::default(), watermark.position) {
                    warn!(id = watermark.id().get(), error = %e, "grid disabled for watermark");
                    watermark.grid.enabled = false;
                }
            }

            let rendered = match &watermark.kind {
                WatermarkKind::Image(asset) => {
                    let target = RenderTarget::output(&watermark.transform);
                    Some(render_image(asset.bitmap(), &watermark.transform, target).map_err(|e| {
                        let path = asset
                            .source()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| PathBuf::from("<memory>"));
                        Error::asset(path, e.to_string())
                    }))
                }
                WatermarkKind::Text(_) => None,
            };

            match rendered {
                Some(Ok(rendered)) => prepared.push(Prepared::Image {
                    watermark,
                    rendered,
                }),
                Some(Err(error)) => {
                    warn!(id = watermark.id().get(), %error, "watermark skipped");
                    report.skipped_watermarks.push(SkippedWatermark {
                        id: watermark.id(),
                        error,
                    });
                }
                None => prepared.push(Prepared::Text { watermark }),
            }
        }

        prepared
    }

    fn process_document<E: DocumentEngine>(
        &self,
        engine: &E,
        source: &Path,
        prepared: &[Prepared],
        claimed: &mut HashSet<PathBuf>,
    ) -> Result<PathBuf> {
        let output = self.output_path_for(source);
        if same_file(source, &output) {
            return Err(Error::OutputOverwritesSource(output));
        }
        if claimed.contains(&output) {
            return Err(Error::OutputCollision(output));
        }

        let mut document = engine.open(source)?;
        let marked = self.apply(&mut document, prepared)?;
        debug!(source = %source.display(), pages = marked, "pages watermarked");

        if let OutputLocation::Directory(dir) = &self.output {
            fs::create_dir_all(dir)?;
        }
        document.save(&output)?;
        claimed.insert(output.clone());
        Ok(output)
    }

    /// Draw every prepared watermark on every selected page; returns the page count touched
    fn apply<D: EditableDocument>(&self, document: &mut D, prepared: &[Prepared]) -> Result<usize> {
        let mut images: Vec<Option<ImageRef>> = vec![None; prepared.len()];
        let mut marked = 0;

        for page in 0..document.page_count() {
            if !self.selection.matches(page) {
                continue;
            }
            let geometry = document.page_geometry(page)?;
            marked += 1;

            for (slot, item) in prepared.iter().enumerate() {
                let anchors = grid::anchors_or_single(item.watermark(), geometry.size);
                match item {
                    Prepared::Image { rendered, .. } => {
                        let image = match images[slot] {
                            Some(image) => image,
                            None => {
                                let image = document.register_image(&rendered.bitmap)?;
                                images[slot] = Some(image);
                                image
                            }
                        };
                        for anchor in anchors {
                            document.place_image(page, rendered.rect_at(anchor), image)?;
                        }
                    }
                    Prepared::Text { watermark } => {
                        let WatermarkKind::Text(style) = &watermark.kind else {
                            continue;
                        };
                        for anchor in anchors {
                            let text = TextPlacement::new(style, &watermark.transform, anchor, &self.fonts);
                            document.place_text(page, &text)?;
                        }
                    }
                }
            }
        }

        Ok(marked)
    }
}

/// A batch running on a worker thread
pub struct BatchHandle {
    progress: Receiver<Progress>,
    cancel: CancelToken,
    worker: JoinHandle<Result<BatchReport>>,
}

impl BatchHandle {
    /// Progress updates, one per finished document
    pub fn progress(&self) -> &Receiver<Progress> {
        &self.progress
    }

    /// Stop before the next document
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker and return its report
    pub fn join(self) -> Result<BatchReport> {
        self.worker
            .join()
            .unwrap_or_else(|_| Err(Error::General("batch worker panicked".to_string())))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageAsset;
    use crate::coords::{PagePoint, PageSize, PointRect};
    use crate::model::WatermarkUpdate;
    use crate::pdf::PageGeometry;
    use crate::selection::PageRanges;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Register(String),
        Image(String, usize, PointRect),
        Text(String, usize, String),
        Save(String, PathBuf),
    }

    /// Records operations instead of touching files; paths containing
    /// "corrupt" fail to open
    #[derive(Clone, Default)]
    struct FakeEngine {
        log: Arc<Mutex<Vec<Op>>>,
    }

    struct FakeDocument {
        name: String,
        log: Arc<Mutex<Vec<Op>>>,
        images: usize,
    }

    impl DocumentEngine for FakeEngine {
        type Document = FakeDocument;

        fn open(&self, path: &Path) -> Result<FakeDocument> {
            let name = path.to_string_lossy().into_owned();
            if name.contains("corrupt") {
                return Err(Error::General(format!("cannot parse {}", name)));
            }
            Ok(FakeDocument {
                name,
                log: self.log.clone(),
                images: 0,
            })
        }
    }

    impl EditableDocument for FakeDocument {
        fn page_count(&self) -> usize {
            3
        }

        fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
            if index >= 3 {
                return Err(Error::PageOutOfRange { index, count: 3 });
            }
            Ok(PageGeometry::new(500.0, 300.0, 0, (0.0, 0.0)))
        }

        fn register_image(&mut self, _bitmap: &RgbaImage) -> Result<ImageRef> {
            self.log.lock().unwrap().push(Op::Register(self.name.clone()));
            self.images += 1;
            Ok(ImageRef::new(self.images - 1))
        }

        fn place_image(&mut self, index: usize, rect: PointRect, _image: ImageRef) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Op::Image(self.name.clone(), index, rect));
            Ok(())
        }

        fn place_text(&mut self, index: usize, text: &TextPlacement) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Op::Text(self.name.clone(), index, text.content.clone()));
            Ok(())
        }

        fn save(&mut self, path: &Path) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Op::Save(self.name.clone(), path.to_path_buf()));
            Ok(())
        }
    }

    fn text_set(content: &str) -> WatermarkSet {
        let mut set = WatermarkSet::new();
        set.add_text(content, PageSize::new(500.0, 300.0));
        set
    }

    fn docs(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("in/{}.pdf", n))).collect()
    }

    fn ops(engine: &FakeEngine) -> Vec<Op> {
        engine.log.lock().unwrap().clone()
    }

    #[test]
    fn test_failing_document_does_not_stop_batch() {
        let engine = FakeEngine::default();
        let job = BatchJob::new(docs(&["a", "corrupt", "c"]), &text_set("DRAFT"), PageSelection::All);

        let mut seen = Vec::new();
        let report = job.run(&engine, &CancelToken::new(), |p| seen.push(p)).unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.outputs,
            vec![PathBuf::from("in/a_marked.pdf"), PathBuf::from("in/c_marked.pdf")]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("in/corrupt.pdf"));
        assert!(!report.is_complete_success());

        let totals: Vec<(usize, usize)> = seen.iter().map(|p| (p.completed, p.total)).collect();
        assert_eq!(totals, vec![(1, 3), (2, 3), (3, 3)]);

        let saves = ops(&engine)
            .into_iter()
            .filter(|op| matches!(op, Op::Save(..)))
            .count();
        assert_eq!(saves, 2);
    }

    #[test]
    fn test_preconditions() {
        let engine = FakeEngine::default();
        let cancel = CancelToken::new();

        let job = BatchJob::new(Vec::new(), &text_set("x"), PageSelection::All);
        assert!(matches!(job.run(&engine, &cancel, |_| {}), Err(Error::NoDocuments)));

        let job = BatchJob::new(docs(&["a"]), &WatermarkSet::new(), PageSelection::All);
        assert!(matches!(job.run(&engine, &cancel, |_| {}), Err(Error::NoWatermarks)));

        let none = PageSelection::Custom(PageRanges::parse("bad,0"));
        let job = BatchJob::new(docs(&["a"]), &text_set("x"), none);
        assert!(matches!(job.run(&engine, &cancel, |_| {}), Err(Error::NoPagesSelected)));

        assert!(ops(&engine).is_empty());
    }

    #[test]
    fn test_selection_limits_pages() {
        let engine = FakeEngine::default();
        let job = BatchJob::new(docs(&["a"]), &text_set("DRAFT"), PageSelection::OddOnly);
        job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        let pages: Vec<usize> = ops(&engine)
            .into_iter()
            .filter_map(|op| match op {
                Op::Text(_, page, _) => Some(page),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![0, 2]);
    }

    #[test]
    fn test_custom_range_past_end_still_saves() {
        let engine = FakeEngine::default();
        let job = BatchJob::new(
            docs(&["a"]),
            &text_set("DRAFT"),
            PageSelection::Custom(PageRanges::parse("7-9")),
        );
        let report = job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        assert_eq!(report.succeeded(), 1);
        assert!(!ops(&engine).iter().any(|op| matches!(op, Op::Text(..))));
    }

    #[test]
    fn test_image_registered_once_per_document() {
        let engine = FakeEngine::default();
        let mut set = WatermarkSet::new();
        let id = set.add_image(
            ImageAsset::from_bitmap(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]))),
            PageSize::new(500.0, 300.0),
        );
        set.update_properties(
            id,
            WatermarkUpdate {
                grid_enabled: Some(true),
                gap_x: Some(100.0),
                gap_y: Some(100.0),
                ..Default::default()
            },
        );

        let job = BatchJob::new(docs(&["a", "b"]), &set, PageSelection::All);
        job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        let log = ops(&engine);
        let registers = log.iter().filter(|op| matches!(op, Op::Register(_))).count();
        let placements = log.iter().filter(|op| matches!(op, Op::Image(..))).count();
        assert_eq!(registers, 2);
        // 24 anchors on a 500x300 page, three pages, two documents
        assert_eq!(placements, 24 * 3 * 2);

        let first = log
            .iter()
            .find_map(|op| match op {
                Op::Image(_, _, rect) => Some(*rect),
                _ => None,
            })
            .unwrap();
        // Default opacity 0.5, scale 1: a 10pt square centered on the origin
        assert_eq!((first.x0, first.y0, first.x1, first.y1), (-5.0, -5.0, 5.0, 5.0));
    }

    #[test]
    fn test_broken_asset_skips_only_that_watermark() {
        let engine = FakeEngine::default();
        let mut set = WatermarkSet::new();
        let broken = set.add_image(
            ImageAsset::with_source(RgbaImage::new(0, 0), "empty.png"),
            PageSize::new(500.0, 300.0),
        );
        set.add_text("STILL HERE", PageSize::new(500.0, 300.0));

        let job = BatchJob::new(docs(&["a"]), &set, PageSelection::All);
        let report = job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.skipped_watermarks.len(), 1);
        assert_eq!(report.skipped_watermarks[0].id, broken);
        assert!(matches!(report.skipped_watermarks[0].error, Error::Asset { .. }));
        assert_eq!(
            ops(&engine).iter().filter(|op| matches!(op, Op::Text(..))).count(),
            3
        );
    }

    #[test]
    fn test_all_watermarks_broken_keeps_reasons() {
        let engine = FakeEngine::default();
        let mut set = WatermarkSet::new();
        let broken = set.add_image(
            ImageAsset::with_source(RgbaImage::new(0, 0), "empty.png"),
            PageSize::new(500.0, 300.0),
        );

        let job = BatchJob::new(docs(&["a"]), &set, PageSelection::All);
        match job.run(&engine, &CancelToken::new(), |_| {}) {
            Err(Error::AllWatermarksSkipped(skipped)) => {
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].id, broken);
                assert!(matches!(skipped[0].error, Error::Asset { .. }));
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.outputs)),
        }
        assert!(ops(&engine).is_empty());
    }

    #[test]
    fn test_cancel_before_start() {
        let engine = FakeEngine::default();
        let cancel = CancelToken::new();
        cancel.cancel();

        let job = BatchJob::new(docs(&["a", "b"]), &text_set("DRAFT"), PageSelection::All);
        let report = job.run(&engine, &cancel, |_| {}).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.attempted, 0);
        assert_eq!(report.not_processed, docs(&["a", "b"]));
        assert!(ops(&engine).is_empty());
    }

    #[test]
    fn test_snapshot_ignores_later_edits() {
        let engine = FakeEngine::default();
        let mut live = text_set("BEFORE");
        let job = BatchJob::new(docs(&["a"]), &live, PageSelection::All);

        let id = live.iter().next().unwrap().id();
        live.update_properties(
            id,
            WatermarkUpdate {
                content: Some("AFTER".to_string()),
                ..Default::default()
            },
        );
        live.add_text("EXTRA", PageSize::new(500.0, 300.0));

        job.run(&engine, &CancelToken::new(), |_| {}).unwrap();
        let texts: Vec<String> = ops(&engine)
            .into_iter()
            .filter_map(|op| match op {
                Op::Text(_, _, content) => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["BEFORE".to_string(); 3]);
    }

    #[test]
    fn test_output_paths() {
        let set = text_set("x");
        let job = BatchJob::new(Vec::new(), &set, PageSelection::All);
        assert_eq!(
            job.output_path_for(Path::new("/docs/report.pdf")),
            PathBuf::from("/docs/report_marked.pdf")
        );

        let job = job
            .with_output(OutputLocation::Directory(PathBuf::from("/out")))
            .with_suffix("-wm");
        assert_eq!(
            job.output_path_for(Path::new("/docs/report.pdf")),
            PathBuf::from("/out/report-wm.pdf")
        );
    }

    #[test]
    fn test_output_over_source_is_rejected() {
        let engine = FakeEngine::default();
        let job = BatchJob::new(docs(&["a"]), &text_set("x"), PageSelection::All).with_suffix("");
        let report = job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        assert_eq!(report.succeeded(), 0);
        assert!(matches!(report.failures[0].error, Error::OutputOverwritesSource(_)));
        assert!(ops(&engine).is_empty());
    }

    #[test]
    fn test_same_name_into_one_directory_is_rejected() {
        let engine = FakeEngine::default();
        let out = TempDir::new().unwrap();
        let sources = vec![PathBuf::from("d1/a.pdf"), PathBuf::from("d2/a.pdf")];
        let job = BatchJob::new(sources, &text_set("x"), PageSelection::All)
            .with_output(OutputLocation::Directory(out.path().to_path_buf()));
        let report = job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        assert_eq!(report.outputs, vec![out.path().join("a_marked.pdf")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("d2/a.pdf"));
        assert!(matches!(report.failures[0].error, Error::OutputCollision(_)));
        assert_eq!(
            ops(&engine).iter().filter(|op| matches!(op, Op::Save(..))).count(),
            1
        );
    }

    #[test]
    fn test_failed_document_does_not_claim_its_output() {
        let engine = FakeEngine::default();
        let out = TempDir::new().unwrap();
        let sources = vec![PathBuf::from("corrupt/a.pdf"), PathBuf::from("d2/a.pdf")];
        let job = BatchJob::new(sources, &text_set("x"), PageSelection::All)
            .with_output(OutputLocation::Directory(out.path().to_path_buf()));
        let report = job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        assert_eq!(report.outputs, vec![out.path().join("a_marked.pdf")]);
        assert_eq!(report.failures[0].path, PathBuf::from("corrupt/a.pdf"));
    }

    #[test]
    fn test_spawned_batch_reports_progress() {
        let engine = FakeEngine::default();
        let job = BatchJob::new(docs(&["a", "b", "c"]), &text_set("DRAFT"), PageSelection::All);

        let handle = job.spawn(engine.clone());
        let report = handle.join().unwrap();
        assert_eq!(report.succeeded(), 3);
        assert_eq!(
            ops(&engine).iter().filter(|op| matches!(op, Op::Save(..))).count(),
            3
        );
    }

    #[test]
    fn test_progress_channel() {
        let job = BatchJob::new(docs(&["a", "b"]), &text_set("DRAFT"), PageSelection::All);
        let handle = job.spawn(FakeEngine::default());

        let updates: Vec<Progress> = handle.progress().iter().collect();
        assert_eq!(updates.last(), Some(&Progress { completed: 2, total: 2 }));
        assert!(handle.join().unwrap().is_complete_success());
    }

    #[test]
    fn test_text_anchor_is_stored_position() {
        let engine = FakeEngine::default();
        let mut set = WatermarkSet::new();
        let id = set.add_text("DRAFT", PageSize::new(500.0, 300.0));
        set.update_properties(
            id,
            WatermarkUpdate {
                position: Some(PagePoint::new(50.0, 60.0)),
                ..Default::default()
            },
        );
        let job = BatchJob::new(docs(&["a"]), &set, PageSelection::Custom(PageRanges::parse("2")));
        job.run(&engine, &CancelToken::new(), |_| {}).unwrap();

        assert_eq!(
            ops(&engine)[0],
            Op::Text("in/a.pdf".to_string(), 1, "DRAFT".to_string())
        );
    }
}
