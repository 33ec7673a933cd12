//! Error types for layout reconstruction

use std::io;
use thiserror::Error;

/// Errors that can occur while reconstructing a page layout
///
/// Field detection and field-to-line association never produce errors: a
/// degenerate image simply yields no fields. Everything here belongs to the
/// collaborators around the engine (image decoding, the OCR backend, the
/// downstream JSON consumer) or to invalid configuration.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The input bytes could not be decoded as a raster image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The OCR backend returned no usable word-level text
    #[error("No text recognized in image")]
    NoTextRecognized,

    /// The `tesseract` binary is not installed or not in `PATH`
    #[error("Tesseract not found in PATH. Please install tesseract-ocr with the required language data")]
    TesseractNotFound,

    /// The OCR backend ran but reported a failure
    #[error("OCR backend failed: {0}")]
    OcrBackend(String),

    /// A row of the OCR TSV table could not be parsed
    #[error("Malformed OCR table at line {line}: {message}")]
    TsvParse {
        /// 1-based line number in the TSV text (the header is line 1)
        line: usize,
        /// What was wrong with the row
        message: String,
    },

    /// Downstream structured output was not a JSON object
    #[error("Failed to parse extracted JSON: {0}")]
    ExtractionParse(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (temporary files, reading inputs)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Positioned output could not be serialized
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid UTF-8 in backend output
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for layout reconstruction operations
pub type Result<T> = std::result::Result<T, LayoutError>;
