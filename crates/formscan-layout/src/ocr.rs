//! OCR backend seam and the Tesseract adapter
//!
//! The engine only needs a flat table of word detections with a line
//! hierarchy. [`TesseractCli`] produces it by running the `tesseract` binary
//! in TSV mode; [`parse_tsv`] turns such a table into [`WordDetection`]s and
//! also serves pre-computed tables.

use crate::error::{LayoutError, Result};
use crate::types::{BoundingBox, LineAddress, RecordLevel, WordDetection, FIELD_PLACEHOLDER};
use image::{DynamicImage, ImageFormat};
use std::process::Command;

/// Number of columns before the optional `text` column
const TSV_NUMERIC_COLUMNS: usize = 11;

/// Anything that can turn an image into word detections
pub trait OcrBackend: Send + Sync {
    /// Recognize `image` using the `language` hint (e.g. `"rus"` or `"rus+eng"`)
    ///
    /// # Errors
    ///
    /// Backend-specific failures; the engine does not retry.
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<Vec<WordDetection>>;
}

/// Tesseract invoked as a subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractCli {
    /// Executable name or path
    pub binary: String,
    /// OCR engine mode (`--oem`); 1 = LSTM only
    pub oem: u8,
    /// Page segmentation mode (`--psm`); 3 = fully automatic
    pub psm: u8,
}

impl Default for TesseractCli {
    #[inline]
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            oem: 1,
            psm: 3,
        }
    }
}

impl TesseractCli {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that the binary can be run
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::TesseractNotFound` if it cannot be spawned or
    /// exits with an error.
    #[must_use = "this function returns the Tesseract version string that should be used or logged"]
    pub fn check_available(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|_| LayoutError::TesseractNotFound)?;

        if !output.status.success() {
            return Err(LayoutError::TesseractNotFound);
        }

        // Older releases print the banner on stderr
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or("unknown")
            .to_string())
    }

    /// Command-line arguments for recognizing `input`
    ///
    /// The field placeholder character is blacklisted so recognized text can
    /// never be mistaken for a field.
    #[must_use]
    pub fn args(&self, input: &str, language: &str) -> Vec<String> {
        vec![
            input.to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "-c".to_string(),
            format!("tessedit_char_blacklist={FIELD_PLACEHOLDER}"),
            "tsv".to_string(),
        ]
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<Vec<WordDetection>> {
        let input = tempfile::Builder::new()
            .prefix("formscan-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| LayoutError::OcrBackend(format!("failed to write page image: {e}")))?;

        let path = input.path().to_string_lossy().into_owned();
        let output = Command::new(&self.binary)
            .args(self.args(&path, language))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LayoutError::TesseractNotFound,
                _ => LayoutError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LayoutError::OcrBackend(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8(output.stdout)?;
        let records = parse_tsv(&tsv)?;
        log::debug!("Tesseract ({language}): {} records", records.len());
        Ok(records)
    }
}

/// Parse Tesseract's TSV output
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. The header row is optional, a missing `text`
/// column means an empty token, and rows with an unknown level are skipped.
///
/// # Errors
///
/// Returns `LayoutError::TsvParse` with the 1-based line number of the first
/// row that is too short or has a non-numeric column.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_tsv(tsv: &str) -> Result<Vec<WordDetection>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(false)
        .from_reader(tsv.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| LayoutError::TsvParse {
            line: e.position().map_or(0, |p| p.line() as usize),
            message: e.to_string(),
        })?;
        let line = row.position().map_or(0, |p| p.line() as usize);

        if row.get(0).is_some_and(|c| c.trim() == "level") {
            continue;
        }
        if row.len() < TSV_NUMERIC_COLUMNS {
            return Err(LayoutError::TsvParse {
                line,
                message: format!(
                    "expected at least {TSV_NUMERIC_COLUMNS} columns, found {}",
                    row.len()
                ),
            });
        }

        let int = |index: usize, name: &str| -> Result<i32> {
            let raw = row.get(index).unwrap_or_default().trim();
            raw.parse().map_err(|_| LayoutError::TsvParse {
                line,
                message: format!("invalid {name} '{raw}'"),
            })
        };

        let level = int(0, "level")?;
        let Some(level) = u8::try_from(level).ok().and_then(RecordLevel::from_tesseract) else {
            log::debug!("Skipping TSV line {line} with unknown level {level}");
            continue;
        };

        let raw_conf = row.get(10).unwrap_or_default().trim();
        let confidence: f32 = raw_conf.parse().map_err(|_| LayoutError::TsvParse {
            line,
            message: format!("invalid conf '{raw_conf}'"),
        })?;

        records.push(WordDetection {
            text: row.get(11).unwrap_or_default().to_string(),
            confidence,
            bbox: BoundingBox::new(
                int(6, "left")?,
                int(7, "top")?,
                int(8, "width")?,
                int(9, "height")?,
            ),
            address: LineAddress::new(
                int(2, "block_num")?,
                int(3, "par_num")?,
                int(4, "line_num")?,
            ),
            word: int(5, "word_num")?,
            level,
        });
    }
    Ok(records)
}

/// True when at least one word-level record carries non-blank text
#[must_use]
pub fn has_text(records: &[WordDetection]) -> bool {
    records
        .iter()
        .any(|r| r.level == RecordLevel::Word && !r.text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
2\t1\t1\t0\t0\t0\t20\t100\t420\t30\t-1\t
3\t1\t1\t1\t0\t0\t20\t100\t420\t30\t-1\t
4\t1\t1\t1\t1\t0\t20\t100\t420\t30\t-1\t
5\t1\t1\t1\t1\t1\t20\t100\t90\t30\t96.5\tСостав:
5\t1\t1\t1\t1\t2\t120\t102\t110\t28\t91\tмолоко,
";

    #[test]
    fn test_parse_tsv_sample() {
        let records = parse_tsv(SAMPLE).unwrap();
        assert_eq!(records.len(), 6);

        let line = &records[3];
        assert_eq!(line.level, RecordLevel::Line);
        assert_eq!(line.address, LineAddress::new(1, 1, 1));
        assert!(line.text.is_empty());
        assert!(line.confidence < 0.0);

        let word = &records[4];
        assert_eq!(word.level, RecordLevel::Word);
        assert_eq!(word.text, "Состав:");
        assert!((word.confidence - 96.5).abs() < 1e-6);
        assert_eq!(word.bbox, BoundingBox::new(20, 100, 90, 30));
        assert_eq!(word.word, 1);
        assert!(has_text(&records));
    }

    #[test]
    fn test_parse_tsv_missing_text_column() {
        let records = parse_tsv("4\t1\t1\t1\t1\t0\t0\t0\t10\t10\t-1\n").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].text.is_empty());
        assert!(!has_text(&records));
    }

    #[test]
    fn test_parse_tsv_reports_line_number() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\tok
5\t1\t1\t1\t1\t2\t0\t0\t10\t10\thigh\tbad
";
        match parse_tsv(tsv) {
            Err(LayoutError::TsvParse { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("conf"));
            }
            other => panic!("expected TsvParse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tsv_short_row() {
        assert!(matches!(
            parse_tsv("5\t1\t1\n"),
            Err(LayoutError::TsvParse { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_tsv_keeps_quotes_verbatim() {
        let records = parse_tsv("5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\t\"ГОСТ\n").unwrap();
        assert_eq!(records[0].text, "\"ГОСТ");
    }

    #[test]
    fn test_tesseract_args_blacklist_placeholder() {
        let args = TesseractCli::new().args("/tmp/page.png", "rus+eng");
        assert_eq!(args[0], "/tmp/page.png");
        assert_eq!(args[1], "stdout");
        assert!(args.windows(2).any(|w| w == ["-l", "rus+eng"]));
        assert!(args.windows(2).any(|w| w == ["--psm", "3"]));
        assert!(args.contains(&"tessedit_char_blacklist=_".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("tsv"));
    }

    #[test]
    fn test_missing_binary_is_not_found() {
        let cli = TesseractCli {
            binary: "formscan-no-such-tesseract".to_string(),
            ..TesseractCli::default()
        };
        assert!(matches!(
            cli.check_available(),
            Err(LayoutError::TesseractNotFound)
        ));
    }
}
