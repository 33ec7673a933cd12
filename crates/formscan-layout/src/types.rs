//! Core data types: OCR word detections, field boxes, lines and pages

use serde::{Deserialize, Serialize};

/// Placeholder token standing in for a detected field inside a line.
///
/// The Tesseract adapter blacklists `_`, so real OCR text never equals it.
pub const FIELD_PLACEHOLDER: &str = "_";

/// Synthetic confidence reported by field records.
///
/// Fields never go through the confidence filter, whatever this value and
/// the threshold are; see [`Record::is_synthetic`].
pub const FIELD_CONFIDENCE: f32 = 90.0;

/// Axis-aligned rectangle in image pixels (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left coordinate (x)
    pub left: i32,
    /// Top coordinate (y)
    pub top: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[inline]
    #[must_use = "bounding box is created but not used"]
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Get the right edge coordinate (saturating)
    #[inline]
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.left.saturating_add(self.width)
    }

    /// Get the bottom edge coordinate (saturating)
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height)
    }

    /// Horizontal extent `[left, right]` without overflow
    #[inline]
    #[must_use]
    pub const fn x_span(&self) -> (i64, i64) {
        (self.left as i64, self.left as i64 + self.width as i64)
    }

    /// Vertical extent `[top, bottom]` without overflow
    #[inline]
    #[must_use]
    pub const fn y_span(&self) -> (i64, i64) {
        (self.top as i64, self.top as i64 + self.height as i64)
    }

    /// Corners in the order top-left, top-right, bottom-left, bottom-right
    #[inline]
    #[must_use]
    pub const fn corners(&self) -> [(i32, i32); 4] {
        [
            (self.left, self.top),
            (self.right(), self.top),
            (self.left, self.bottom()),
            (self.right(), self.bottom()),
        ]
    }

    /// Area of the intersection with another box (0 when disjoint)
    #[must_use]
    pub fn intersection_area(&self, other: &Self) -> i64 {
        let ((l1, r1), (l2, r2)) = (self.x_span(), other.x_span());
        let ((t1, b1), (t2, b2)) = (self.y_span(), other.y_span());
        let w = r1.min(r2) - l1.max(l2);
        let h = b1.min(b2) - t1.max(t2);
        if w <= 0 || h <= 0 {
            0
        } else {
            w.saturating_mul(h)
        }
    }
}

/// Structural level of an OCR record (Tesseract numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordLevel {
    Page,
    Block,
    Paragraph,
    Line,
    Word,
}

impl RecordLevel {
    /// Map Tesseract's numeric level (1 = page .. 5 = word)
    #[must_use]
    pub const fn from_tesseract(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Page),
            2 => Some(Self::Block),
            3 => Some(Self::Paragraph),
            4 => Some(Self::Line),
            5 => Some(Self::Word),
            _ => None,
        }
    }
}

/// (block, paragraph, line) address of a text line in the OCR hierarchy.
///
/// Real OCR indices are non-negative. Unassociated field boxes carry a
/// synthetic address built from the negated field id, so two of them never
/// share a group with each other or with OCR text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineAddress {
    pub block: i32,
    pub paragraph: i32,
    pub line: i32,
}

impl LineAddress {
    #[inline]
    #[must_use]
    pub const fn new(block: i32, paragraph: i32, line: i32) -> Self {
        Self {
            block,
            paragraph,
            line,
        }
    }

    /// Synthetic address for a field that has not been associated with a line
    #[inline]
    #[must_use]
    pub const fn synthetic(field_id: u32) -> Self {
        let key = -(field_id as i32);
        Self::new(key, key, key)
    }

    /// True for addresses produced by [`LineAddress::synthetic`]
    #[inline]
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.block < 0
    }
}

/// One row of the OCR backend's output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordDetection {
    /// Recognized token, possibly empty for structural rows
    pub text: String,
    /// Recognition confidence; non-positive means "not a transcription"
    pub confidence: f32,
    /// Pixel bounding box
    pub bbox: BoundingBox,
    /// Line address in the OCR hierarchy
    pub address: LineAddress,
    /// Word index within the line
    pub word: i32,
    /// Structural level of the record
    pub level: RecordLevel,
}

impl WordDetection {
    /// Create a word-level detection
    #[must_use]
    pub fn word(
        text: impl Into<String>,
        confidence: f32,
        bbox: BoundingBox,
        address: LineAddress,
        word: i32,
    ) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
            address,
            word,
            level: RecordLevel::Word,
        }
    }

    /// Create a line-level structural row (empty text, no confidence)
    #[must_use]
    pub fn line(bbox: BoundingBox, address: LineAddress) -> Self {
        Self {
            text: String::new(),
            confidence: -1.0,
            bbox,
            address,
            word: 0,
            level: RecordLevel::Line,
        }
    }
}

/// A graphical region (rule line, box edge) found by the field detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBox {
    /// Page-scoped id, assigned 1, 2, 3, .. in detection order
    pub id: u32,
    /// Pixel bounding box
    pub bbox: BoundingBox,
    /// Line the field belongs to; synthetic until associated
    pub address: LineAddress,
}

impl FieldBox {
    #[must_use]
    pub const fn new(id: u32, bbox: BoundingBox) -> Self {
        Self {
            id,
            bbox,
            address: LineAddress::synthetic(id),
        }
    }

    /// Whether the associator attached this field to an OCR line
    #[inline]
    #[must_use]
    pub const fn is_associated(&self) -> bool {
        !self.address.is_synthetic()
    }
}

/// Input record of the filter & grouper: either OCR output or a field box
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Word(WordDetection),
    Field(FieldBox),
}

impl Record {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Word(w) => &w.text,
            Self::Field(_) => FIELD_PLACEHOLDER,
        }
    }

    /// True for records made by the field detector rather than OCR
    #[inline]
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        matches!(self, Self::Field(_))
    }

    #[must_use]
    pub const fn confidence(&self) -> f32 {
        match self {
            Self::Word(w) => w.confidence,
            Self::Field(_) => FIELD_CONFIDENCE,
        }
    }

    #[must_use]
    pub const fn bbox(&self) -> BoundingBox {
        match self {
            Self::Word(w) => w.bbox,
            Self::Field(f) => f.bbox,
        }
    }

    #[must_use]
    pub const fn address(&self) -> LineAddress {
        match self {
            Self::Word(w) => w.address,
            Self::Field(f) => f.address,
        }
    }

    #[must_use]
    pub const fn field_id(&self) -> Option<u32> {
        match self {
            Self::Word(_) => None,
            Self::Field(f) => Some(f.id),
        }
    }
}

/// One reconstructed text row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Tokens in left-to-right order; fields appear as [`FIELD_PLACEHOLDER`]
    pub words: Vec<String>,
    /// Geometry of the first record of the group
    pub bbox: BoundingBox,
    /// Field ids hosted by this line, left-to-right
    pub field_ids: Vec<u32>,
}

impl Line {
    /// True when every token is a field placeholder
    #[must_use]
    pub fn is_blank(&self) -> bool {
        !self.words.is_empty() && self.words.iter().all(|w| w == FIELD_PLACEHOLDER)
    }

    /// Tokens joined with single spaces
    #[must_use]
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

/// Reconstruction of one input image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Image resolution in dots per inch
    pub dpi: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Lines in reading (top-to-bottom) order
    pub lines: Vec<Line>,
    /// All fields detected on the page, associated or not
    pub fields: Vec<FieldBox>,
}

impl Page {
    /// Look up a detected field by id
    #[must_use]
    pub fn field(&self, id: u32) -> Option<&FieldBox> {
        self.fields.iter().find(|f| f.id == id)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_edges() {
        let bbox = BoundingBox::new(10, 20, 100, 50);
        assert_eq!(bbox.right(), 110);
        assert_eq!(bbox.bottom(), 70);
        assert_eq!(bbox.corners()[3], (110, 70));
    }

    #[test]
    fn test_intersection_area() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 5, 10, 10);
        let c = BoundingBox::new(20, 20, 5, 5);
        assert_eq!(a.intersection_area(&b), 25);
        assert_eq!(a.intersection_area(&c), 0);
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let far = BoundingBox::new(i32::MAX - 5, i32::MAX - 5, i32::MAX, i32::MAX);
        assert_eq!(far.right(), i32::MAX);
        assert_eq!(far.x_span().1, i64::from(i32::MAX - 5) + i64::from(i32::MAX));
        let whole = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(far.intersection_area(&whole), 0);
        assert_eq!(far.intersection_area(&far), i64::from(i32::MAX).pow(2));
    }

    #[test]
    fn test_synthetic_address() {
        let field = FieldBox::new(3, BoundingBox::new(0, 0, 40, 2));
        assert_eq!(field.address, LineAddress::new(-3, -3, -3));
        assert!(!field.is_associated());
        assert!(!LineAddress::new(0, 0, 0).is_synthetic());
    }

    #[test]
    fn test_record_level_from_tesseract() {
        assert_eq!(RecordLevel::from_tesseract(4), Some(RecordLevel::Line));
        assert_eq!(RecordLevel::from_tesseract(5), Some(RecordLevel::Word));
        assert_eq!(RecordLevel::from_tesseract(9), None);
    }

    #[test]
    fn test_line_is_blank() {
        let blank = Line {
            words: vec![FIELD_PLACEHOLDER.to_string()],
            bbox: BoundingBox::default(),
            field_ids: vec![1],
        };
        let mixed = Line {
            words: vec!["Дата".to_string(), FIELD_PLACEHOLDER.to_string()],
            bbox: BoundingBox::default(),
            field_ids: vec![2],
        };
        assert!(blank.is_blank());
        assert!(!mixed.is_blank());
        assert_eq!(mixed.text(), "Дата _");
    }
}
