//! Layout reconstruction for scanned product labels and forms
//!
//! OCR gives a flat table of words with a block/paragraph/line hierarchy but
//! knows nothing about fillable blanks. This crate finds those blanks on the
//! page image, attaches them to the text lines they belong to, and rebuilds
//! the page in reading order.
//!
//! # Architecture
//!
//! 1. **Field detection** ([`fields`]): Otsu binarization and a horizontal
//!    morphological opening keep rule lines and box edges; each outer
//!    contour becomes a [`FieldBox`].
//! 2. **Association** ([`association`]): a field joins the OCR line that
//!    covers one of its corners, with horizontal slack.
//! 3. **Filter & grouping** ([`grouping`]): low-confidence words are dropped,
//!    records are grouped per line and ordered left-to-right, top-to-bottom.
//! 4. **Reconstruction** ([`reconstruct`]): plain text, or a positioned
//!    document in points with fields drawn as underscore runs.
//!
//! [`LayoutEngine`] runs the whole pipeline against an [`OcrBackend`], by
//! default the `tesseract` binary ([`TesseractCli`]).
//!
//! # Example
//!
//! ```no_run
//! use formscan_layout::{LayoutConfig, LayoutEngine, PageImage, TesseractCli};
//!
//! # fn main() -> formscan_layout::Result<()> {
//! let engine = LayoutEngine::new(TesseractCli::new(), LayoutConfig::default())?;
//! let page = PageImage::open("label.png")?;
//! print!("{}", engine.render_text(&[page]));
//! # Ok(())
//! # }
//! ```

pub mod association;
pub mod config;
pub mod error;
pub mod extraction;
pub mod fields;
pub mod grouping;
pub mod ocr;
pub mod pipeline;
pub mod reconstruct;
pub mod resolution;
pub mod types;

pub use association::{associate_fields, covers_corner, AssociationPolicy};
pub use config::LayoutConfig;
pub use error::{LayoutError, Result};
pub use extraction::{parse_extraction, ExtractedFields};
pub use fields::{detect_fields, FieldDetectionParams};
pub use grouping::{group_lines, passes_confidence};
pub use ocr::{parse_tsv, OcrBackend, TesseractCli};
pub use pipeline::{build_page, decode_images, page_from_records, LayoutEngine, PageImage};
pub use reconstruct::{
    build_positioned, render_plain_text, DocumentItem, PageSize, Placement, PositionedDocument,
    Section,
};
pub use types::{
    BoundingBox, FieldBox, Line, LineAddress, Page, Record, RecordLevel, WordDetection,
    FIELD_PLACEHOLDER,
};
