//! PDF Watermarker CLI tool
//!
//! A command-line tool for stamping image and text watermarks onto batches of PDFs.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pdf_watermarker::assets::{AssetStore, FsAssetStore};
use pdf_watermarker::batch::{BatchJob, CancelToken, OutputLocation};
use pdf_watermarker::coords::{PagePoint, PageSize};
use pdf_watermarker::model::{Rgb, WatermarkSet, WatermarkUpdate};
use pdf_watermarker::pdf::{EditableDocument, LopdfDocument, LopdfEngine};
use pdf_watermarker::selection::{PageSelection, RangeMode};
use pdf_watermarker::settings::{Settings, SETTINGS_FILE_NAME};

/// PDF Watermarker - Add image and text watermarks to PDFs
#[derive(Parser)]
#[command(name = "pdf-watermarker")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Stamp a logo on every page, writing report_marked.pdf
    pdf-watermarker apply --image logo.png report.pdf

    # Tile diagonal text over the odd pages of every PDF in a folder
    pdf-watermarker apply --text CONFIDENTIAL --angle 45 --grid-gap 200 --range odd \"scans/*.pdf\"

    # Custom pages, output into another directory
    pdf-watermarker apply --image stamp.png --pages \"1,3-5\" --output-dir out *.pdf

    # Reuse the last settings and save a named template
    pdf-watermarker apply --settings watermark_settings.json --text DRAFT --save-template draft *.pdf")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply watermarks to one or more PDF files
    Apply(ApplyArgs),

    /// Show page geometry of a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[derive(clap::Args)]
struct ApplyArgs {
    /// Input PDF files. Supports glob patterns like "*.pdf"
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Image watermark (PNG, JPEG, ...). May be repeated
    #[arg(long)]
    image: Vec<PathBuf>,

    /// Text watermark. May be repeated
    #[arg(long)]
    text: Vec<String>,

    /// Font family for text watermarks (Helvetica, Times-Roman, Courier)
    #[arg(long)]
    font: Option<String>,

    /// Text color as #rrggbb
    #[arg(long)]
    color: Option<String>,

    /// Size multiplier (0.01 to 10)
    #[arg(long)]
    scale: Option<f64>,

    /// Opacity (0.01 to 1)
    #[arg(long)]
    opacity: Option<f64>,

    /// Rotation in degrees, counter-clockwise
    #[arg(long, allow_hyphen_values = true)]
    angle: Option<f64>,

    /// Horizontal center in points from the left edge (default: page center)
    #[arg(long, requires = "y")]
    x: Option<f64>,

    /// Vertical center in points from the bottom edge (default: page center)
    #[arg(long, requires = "x")]
    y: Option<f64>,

    /// Tile across the page with this spacing in points ("X" or "X,Y")
    #[arg(long)]
    grid_gap: Option<String>,

    /// Pages to mark: all, odd, even or custom
    #[arg(long)]
    range: Option<RangeMode>,

    /// Custom pages, e.g. "1,3-5,9" (implies --range custom)
    #[arg(long)]
    pages: Option<String>,

    /// Directory for output files (default: beside each input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Suffix added to each output file name
    #[arg(long)]
    suffix: Option<String>,

    /// Settings file with last-used values and templates
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Use a template saved in the settings file
    #[arg(long)]
    template: Option<String>,

    /// Save the watermarks as a named template in the settings file
    #[arg(long)]
    save_template: Option<String>,

    /// Write the values used back to the settings file
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply(args) => cmd_apply(args),
        Commands::Info { input } => cmd_info(input),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = false;
            for entry in glob(&pattern).with_context(|| format!("Invalid pattern: {}", pattern))? {
                match entry {
                    Ok(path) => {
                        paths.push(path);
                        matched = true;
                    }
                    Err(e) => warn!("glob error for {}: {}", pattern, e),
                }
            }
            if !matched {
                bail!("No files matched pattern: {}", pattern);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    // Sort paths for consistent ordering
    paths.sort();
    paths.dedup();

    Ok(paths)
}

/// Parse "X" or "X,Y" into horizontal and vertical gaps
fn parse_grid_gap(text: &str) -> Result<(f64, f64)> {
    let mut parts = text.split(',').map(str::trim);
    let gap_x: f64 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("Invalid grid gap: {}", text))?;
    let gap_y = match parts.next() {
        Some(y) => y
            .parse()
            .with_context(|| format!("Invalid grid gap: {}", text))?,
        None => gap_x,
    };
    if parts.next().is_some() {
        bail!("Invalid grid gap: {} (expected X or X,Y)", text);
    }
    Ok((gap_x, gap_y))
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;
    Settings::from_json(&text).with_context(|| format!("Invalid settings file: {}", path.display()))
}

/// First page size of the first readable input, used to place new watermarks
fn first_page_size(inputs: &[PathBuf]) -> PageSize {
    for path in inputs {
        match LopdfDocument::load(path).and_then(|d| d.page_geometry(0)) {
            Ok(geometry) => return geometry.size,
            Err(e) => warn!("cannot read first page of {}: {}", path.display(), e),
        }
    }
    warn!("no readable input; assuming US Letter");
    PageSize::new(612.0, 792.0)
}

/// Watermark set from a template, explicit flags, or the last-used image
///
/// Template watermarks keep their stored style unless a flag overrides it;
/// `--image` and `--text` add watermarks on top of the template.
fn build_watermarks(args: &ApplyArgs, settings: &Settings, page: PageSize) -> Result<WatermarkSet> {
    let assets = FsAssetStore;

    let mut set = match &args.template {
        Some(name) => {
            let template = settings
                .template(name)
                .with_context(|| format!("No template named '{}' in settings", name))?;
            let (set, errors) = WatermarkSet::from_template(template, &assets);
            for e in errors {
                eprintln!("Warning: {}", e);
            }
            set
        }
        None => WatermarkSet::new(),
    };
    let from_template: HashSet<_> = set.iter().map(|w| w.id()).collect();

    let mut images = args.image.clone();
    if args.template.is_none() && images.is_empty() && args.text.is_empty() {
        if let Some(path) = settings.last_watermark_path() {
            eprintln!("Using last watermark image: {}", path.display());
            images.push(path.to_path_buf());
        }
    }

    for path in &images {
        let asset = assets
            .load_image(path)
            .with_context(|| format!("Failed to load watermark image {}", path.display()))?;
        set.add_image(asset, page);
    }
    for text in &args.text {
        set.add_text(text.clone(), page);
    }

    let defaults = settings.default_transform();
    let color = match &args.color {
        Some(hex) => Some(Rgb::from_hex(hex).with_context(|| format!("Invalid color: {}", hex))?),
        None => None,
    };
    let grid = args.grid_gap.as_deref().map(parse_grid_gap).transpose()?;
    let position = match (args.x, args.y) {
        (Some(x), Some(y)) => Some(PagePoint::new(x, y)),
        _ => None,
    };

    let ids: Vec<_> = set.iter().map(|w| w.id()).collect();
    for id in ids {
        // Stored template values win over defaults, never over explicit flags
        let stored = from_template.contains(&id);
        let value = |flag: Option<f64>, default: f64| flag.or((!stored).then_some(default));
        set.update_properties(
            id,
            WatermarkUpdate {
                position,
                scale: value(args.scale, defaults.scale),
                angle: value(args.angle, defaults.angle),
                opacity: value(args.opacity, defaults.opacity),
                grid_enabled: grid.map(|_| true),
                gap_x: grid.map(|g| g.0),
                gap_y: grid.map(|g| g.1),
                font_family: args.font.clone(),
                color,
                ..Default::default()
            },
        );
    }

    Ok(set)
}

fn page_selection(args: &ApplyArgs, settings: &Settings) -> PageSelection {
    match (args.range, &args.pages) {
        (Some(RangeMode::Custom), None) => {
            PageSelection::from_mode(RangeMode::Custom, &settings.custom_range)
        }
        (Some(mode), Some(pages)) => PageSelection::from_mode(mode, pages),
        (Some(mode), None) => PageSelection::from_mode(mode, ""),
        (None, Some(pages)) => PageSelection::from_mode(RangeMode::Custom, pages),
        (None, None) => settings.page_selection(),
    }
}

/// Apply watermarks to every input; returns false when any document failed
fn cmd_apply(args: ApplyArgs) -> Result<bool> {
    let settings_path = args
        .settings
        .clone()
        .or_else(|| {
            (args.save_settings || args.save_template.is_some())
                .then(|| PathBuf::from(SETTINGS_FILE_NAME))
        });
    let mut settings = load_settings(settings_path.as_deref())?;

    // Expand glob patterns; missing files are reported per document by the batch
    let inputs = expand_globs(args.inputs.clone())?;
    if inputs.is_empty() {
        bail!("No input files");
    }

    let page = first_page_size(&inputs);
    let set = build_watermarks(&args, &settings, page)?;
    let selection = page_selection(&args, &settings);

    let output = match &args.output_dir {
        Some(dir) => OutputLocation::Directory(dir.clone()),
        None => settings.output_location(),
    };
    let suffix = args
        .suffix
        .clone()
        .unwrap_or_else(|| settings.output_suffix.clone());

    eprintln!("Watermarking {} PDF files...", inputs.len());

    let job = BatchJob::new(inputs, &set, selection.clone())
        .with_output(output.clone())
        .with_suffix(suffix.clone());
    let report = job.run(&LopdfEngine, &CancelToken::new(), |p| {
        eprintln!("[{}/{}]", p.completed, p.total);
    })?;

    for path in &report.outputs {
        eprintln!("Output: {}", path.display());
    }
    for skipped in &report.skipped_watermarks {
        eprintln!("Skipped watermark {}: {}", skipped.id.get(), skipped.error);
    }
    for failure in &report.failures {
        eprintln!("Failed: {}: {}", failure.path.display(), failure.error);
    }
    eprintln!(
        "Done: {} of {} files watermarked",
        report.succeeded(),
        report.attempted
    );

    if let Some(path) = settings_path.filter(|_| args.save_settings || args.save_template.is_some()) {
        if args.save_settings {
            if let Some(image) = args.image.first() {
                settings.last_watermark_path = Some(image.clone());
            }
            let used = set.iter().next().map(|w| w.transform);
            if let Some(transform) = used {
                settings.scale = transform.scale;
                settings.angle = transform.angle;
                settings.opacity = transform.opacity;
            }
            settings.set_page_selection(&selection);
            settings.output_dir = match output {
                OutputLocation::Directory(dir) => Some(dir),
                OutputLocation::BesideSource => None,
            };
            settings.output_suffix = suffix;
        }
        if let Some(name) = &args.save_template {
            settings.save_template(name.clone(), &set);
        }
        fs::write(&path, settings.to_json()?)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        eprintln!("Settings saved to {}", path.display());
    }

    Ok(report.failures.is_empty())
}

/// Show page geometry of a PDF
fn cmd_info(input: PathBuf) -> Result<bool> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let document = LopdfDocument::load(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Pages: {}", document.page_count());

    for index in 0..document.page_count() {
        let g = document.page_geometry(index)?;
        println!(
            "  {:>4}: {:.1} x {:.1} pt, rotate {}",
            index + 1,
            g.size.width,
            g.size.height,
            g.rotation
        );
    }

    Ok(true)
}
