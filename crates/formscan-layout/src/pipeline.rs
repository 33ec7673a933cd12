//! Per-image orchestration
//!
//! ```text
//! image ─> detect_fields ─> associate_fields ─┐
//!   └──> OCR backend ─> records ──────────────┴─> group_lines ─> Page
//! ```
//!
//! Every image is processed on its own; nothing is shared between pages.

use crate::association::associate_fields;
use crate::config::LayoutConfig;
use crate::error::{LayoutError, Result};
use crate::fields::{detect_fields, FieldDetectionParams};
use crate::grouping::group_lines;
use crate::ocr::{has_text, OcrBackend};
use crate::reconstruct::{build_positioned, render_plain_text, PositionedDocument};
use crate::resolution::dpi_from_bytes;
use crate::types::{Page, Record, RecordLevel, WordDetection};
use image::DynamicImage;
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A decoded input image and its declared resolution
#[derive(Debug, Clone)]
pub struct PageImage {
    pub image: DynamicImage,
    /// Dots per inch from the file metadata, if present
    pub dpi: Option<u32>,
}

impl PageImage {
    #[inline]
    #[must_use]
    pub const fn new(image: DynamicImage, dpi: Option<u32>) -> Self {
        Self { image, dpi }
    }

    /// Decode an encoded image (PNG, JPEG, TIFF, ...)
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::Decode` if the bytes are not a supported image.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image =
            image::load_from_memory(bytes).map_err(|e| LayoutError::Decode(e.to_string()))?;
        Ok(Self::new(image, dpi_from_bytes(bytes)))
    }

    /// Read and decode an image file
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::Io` if the file cannot be read and
    /// `LayoutError::Decode` if it is not a supported image.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Resolution to use for this page
    #[must_use]
    pub fn resolution(&self, default_dpi: u32) -> u32 {
        self.dpi.unwrap_or_else(|| {
            log::warn!("Image has no resolution metadata, assuming {default_dpi} dpi");
            default_dpi
        })
    }
}

/// Decode several encoded images, skipping the ones that fail
///
/// Input order is preserved among the images that decode.
pub fn decode_images<I, B>(inputs: I) -> Vec<PageImage>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    inputs
        .into_iter()
        .enumerate()
        .filter_map(|(i, bytes)| match PageImage::decode(bytes.as_ref()) {
            Ok(page) => Some(page),
            Err(e) => {
                log::warn!("Skipping input image {i}: {e}");
                None
            }
        })
        .collect()
}

/// Reconstruct one page from its image and OCR records
///
/// Pure and deterministic: the same inputs always give the same page.
#[must_use = "returns the reconstructed page"]
pub fn build_page(
    image: &DynamicImage,
    dpi: u32,
    records: &[WordDetection],
    config: &LayoutConfig,
) -> Page {
    let mut fields = detect_fields(image, &FieldDetectionParams::from(config));
    associate_fields(
        &mut fields,
        records,
        config.horizontal_shift_tolerance,
        config.association_policy,
    );

    let merged: Vec<Record> = records
        .iter()
        .cloned()
        .map(Record::Word)
        .chain(fields.iter().copied().map(Record::Field))
        .collect();
    let lines = group_lines(merged, config.confidence_threshold);

    Page {
        dpi,
        width: image.width(),
        height: image.height(),
        lines,
        fields,
    }
}

/// Reconstruct a page from OCR records produced elsewhere
///
/// # Errors
///
/// Returns `LayoutError::NoTextRecognized` if no word-level record has text.
pub fn page_from_records(
    page: &PageImage,
    records: &[WordDetection],
    config: &LayoutConfig,
) -> Result<Page> {
    if !has_text(records) {
        return Err(LayoutError::NoTextRecognized);
    }
    let dpi = page.resolution(config.default_dpi);
    Ok(build_page(&page.image, dpi, records, config))
}

/// Layout engine bound to an OCR backend
#[derive(Debug, Clone)]
pub struct LayoutEngine<B: OcrBackend> {
    backend: B,
    config: LayoutConfig,
}

impl<B: OcrBackend> LayoutEngine<B> {
    /// Create an engine
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::InvalidConfig` if `config` does not validate.
    pub fn new(backend: B, config: LayoutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &LayoutConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Recognize and reconstruct one image
    ///
    /// # Errors
    ///
    /// Backend failures are returned as-is; an OCR result without any text
    /// is `LayoutError::NoTextRecognized`.
    pub fn process(&self, page: &PageImage) -> Result<Page> {
        let records = self.backend.recognize(&page.image, &self.config.language)?;
        let words = records
            .iter()
            .filter(|r| r.level == RecordLevel::Word)
            .count();
        log::debug!("OCR: {} records, {words} words", records.len());
        page_from_records(page, &records, &self.config)
    }

    /// Process several images; results are in input order
    ///
    /// A failing image only affects its own slot.
    pub fn process_batch(&self, pages: &[PageImage]) -> Vec<Result<Page>> {
        #[cfg(feature = "parallel")]
        let results = pages.par_iter().map(|page| self.process(page)).collect();
        #[cfg(not(feature = "parallel"))]
        let results = pages.iter().map(|page| self.process(page)).collect();
        results
    }

    /// Successfully processed pages, in order; failures are logged and skipped
    pub fn process_lenient(&self, pages: &[PageImage]) -> Vec<Page> {
        self.process_batch(pages)
            .into_iter()
            .enumerate()
            .filter_map(|(i, result)| match result {
                Ok(page) => Some(page),
                Err(e) => {
                    log::warn!("Skipping image {i}: {e}");
                    None
                }
            })
            .collect()
    }

    /// Plain text of every image that could be processed
    pub fn render_text(&self, pages: &[PageImage]) -> String {
        render_plain_text(&self.process_lenient(pages))
    }

    /// Positioned document with one section per image that could be processed
    pub fn render_positioned(&self, pages: &[PageImage]) -> PositionedDocument {
        build_positioned(&self.process_lenient(pages), self.config.page_size)
    }
}
