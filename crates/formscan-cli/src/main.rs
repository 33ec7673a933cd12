#![allow(
    clippy::needless_pass_by_value, // clap requires owned values
    clippy::must_use_candidate,     // CLI functions don't need must_use
)]

//! formscan - layout reconstruction for scanned labels and forms
//!
//! Recognizes each image with Tesseract (or reads a pre-computed Tesseract
//! TSV table), detects fillable fields, and prints the reconstructed pages
//! as plain text or as a positioned JSON document.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use formscan_layout::{
    build_positioned, page_from_records, parse_tsv, render_plain_text, AssociationPolicy,
    LayoutConfig, LayoutEngine, Page, PageImage, PageSize, TesseractCli,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Default)]
enum OutputFormat {
    /// One lower-cased line of text per reconstructed line (default)
    #[default]
    Text,
    /// Positioned document as JSON (points, underscore runs for fields)
    Positioned,
}

#[derive(Parser, Debug)]
#[command(name = "formscan")]
#[command(version, about = "Reconstruct the text layout of scanned labels and forms")]
struct Args {
    /// Input images, processed in order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// OCR language, e.g. "rus" or "rus+eng"
    #[arg(short, long)]
    lang: Option<String>,

    /// Minimum OCR confidence for recognized words
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Horizontal tolerance (pixels) when attaching fields to lines
    #[arg(long)]
    tolerance: Option<i32>,

    /// Line chosen when a field matches several: last-match, first-match, largest-overlap
    #[arg(long)]
    policy: Option<AssociationPolicy>,

    /// Fit positioned output onto a fixed page: a4, letter
    #[arg(long)]
    page_size: Option<PageSize>,

    /// TOML file with layout settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Pre-computed Tesseract TSV, one per image in the same order
    #[arg(long = "ocr-tsv")]
    ocr_tsv: Vec<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Environment and optional TOML file, then command-line overrides
    fn layout_config(&self) -> Result<LayoutConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => LayoutConfig::from_env(),
        };
        if let Some(lang) = &self.lang {
            config.language.clone_from(lang);
        }
        if let Some(threshold) = self.threshold {
            config.confidence_threshold = threshold;
        }
        if let Some(tolerance) = self.tolerance {
            config.horizontal_shift_tolerance = tolerance;
        }
        if let Some(policy) = self.policy {
            config.association_policy = policy;
        }
        if self.page_size.is_some() {
            config.page_size = self.page_size;
        }
        config.validate().context("Invalid layout configuration")?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<LayoutConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Pages from pre-computed OCR tables
fn pages_from_tsv(args: &Args, config: &LayoutConfig) -> Vec<Page> {
    args.images
        .iter()
        .zip(&args.ocr_tsv)
        .filter_map(|(image, tsv)| match page_from_tsv(image, tsv, config) {
            Ok(page) => Some(page),
            Err(e) => {
                log::warn!("Skipping {}: {e:#}", image.display());
                None
            }
        })
        .collect()
}

fn page_from_tsv(image: &Path, tsv: &Path, config: &LayoutConfig) -> Result<Page> {
    let page = PageImage::open(image)
        .with_context(|| format!("Failed to load image: {}", image.display()))?;
    let table = fs::read_to_string(tsv)
        .with_context(|| format!("Failed to read OCR table: {}", tsv.display()))?;
    let records = parse_tsv(&table).with_context(|| format!("In {}", tsv.display()))?;
    Ok(page_from_records(&page, &records, config)?)
}

/// Pages recognized by the tesseract binary
fn pages_from_tesseract(args: &Args, config: LayoutConfig) -> Result<Vec<Page>> {
    let tesseract = TesseractCli::new();
    let version = tesseract.check_available()?;
    log::debug!("Using {version}");

    let images: Vec<PageImage> = args
        .images
        .iter()
        .filter_map(|path| match PageImage::open(path) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                None
            }
        })
        .collect();
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let engine = LayoutEngine::new(tesseract, config)?;
    Ok(engine.process_lenient(&images))
}

fn render(pages: &[Page], format: OutputFormat, page_size: Option<PageSize>) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_plain_text(pages)),
        OutputFormat::Positioned => Ok(build_positioned(pages, page_size).to_json()? + "\n"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.layout_config()?;

    if !args.ocr_tsv.is_empty() && args.ocr_tsv.len() != args.images.len() {
        bail!(
            "Got {} OCR tables for {} images; pass one --ocr-tsv per image",
            args.ocr_tsv.len(),
            args.images.len()
        );
    }

    let page_size = config.page_size;
    let pages = if args.ocr_tsv.is_empty() {
        pages_from_tesseract(&args, config)?
    } else {
        pages_from_tsv(&args, &config)
    };

    if pages.is_empty() {
        bail!("No image could be processed");
    }
    log::debug!("Reconstructed {} of {} images", pages.len(), args.images.len());

    let rendered = render(&pages, args.format, page_size)?;
    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write output: {}", path.display()))?,
        None => io::stdout()
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?,
    }
    Ok(())
}
