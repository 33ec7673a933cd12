//! Page reconstruction: plain text and positioned output
//!
//! Plain text needs no geometry. Positioned output converts pixels to
//! typographic points through the page resolution, optionally fits the page
//! onto a fixed paper size, and replaces every field placeholder with a run
//! of underscores as wide as the detected field.

use crate::error::Result;
use crate::types::{Line, Page, FIELD_PLACEHOLDER};
use serde::{Deserialize, Serialize};

/// Typographic points per inch
pub const POINTS_PER_INCH: f64 = 72.0;

const POINTS_PER_MM: f64 = POINTS_PER_INCH / 25.4;

/// Advance of one underscore relative to the font size
const UNDERSCORE_ADVANCE_EM: f64 = 0.5;

/// Smallest font size emitted for a line
const MIN_FONT_SIZE: f64 = 1.0;

/// Fixed paper sizes a page can be fitted onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// ISO 216 A4, 210 x 297 mm
    A4,
    /// US Letter, 8.5 x 11 in
    Letter,
}

impl PageSize {
    /// Portrait (width, height) in points
    #[must_use]
    pub fn dimensions_pt(self) -> (f64, f64) {
        match self {
            Self::A4 => (210.0 * POINTS_PER_MM, 297.0 * POINTS_PER_MM),
            Self::Letter => (8.5 * POINTS_PER_INCH, 11.0 * POINTS_PER_INCH),
        }
    }
}

impl std::fmt::Display for PageSize {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A4 => write!(f, "a4"),
            Self::Letter => write!(f, "letter"),
        }
    }
}

impl std::str::FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "letter" | "us-letter" => Ok(Self::Letter),
            _ => Err(format!("Unknown page size '{s}'. Expected: a4, letter")),
        }
    }
}

/// Convert a pixel length to points at the given resolution
#[inline]
#[must_use]
pub fn px_to_pt(px: f64, dpi: u32) -> f64 {
    px / f64::from(dpi.max(1)) * POINTS_PER_INCH
}

/// Horizontal and vertical factors that fit an image onto `target`
///
/// When the image is wider than tall, the target's width is matched against
/// the image height and the target's height against the image width.
#[must_use]
pub fn scale_factors(width_px: u32, height_px: u32, dpi: u32, target: PageSize) -> (f64, f64) {
    let (target_w, target_h) = target.dimensions_pt();
    let width_pt = px_to_pt(f64::from(width_px.max(1)), dpi);
    let height_pt = px_to_pt(f64::from(height_px.max(1)), dpi);
    if width_px > height_px {
        (target_w / height_pt, target_h / width_pt)
    } else {
        (target_w / width_pt, target_h / height_pt)
    }
}

/// Uniform factor applied to every length of a page
#[must_use]
pub fn uniform_scale(page: &Page, target: Option<PageSize>) -> f64 {
    target.map_or(1.0, |size| {
        let (sx, sy) = scale_factors(page.width, page.height, page.dpi, size);
        sx.min(sy)
    })
}

/// Plain text of one page: each line lower-cased and newline-terminated
///
/// Fields stay in the text as the `_` placeholder token, so a reader of the
/// plain text can still see where the blanks are (`жирность _`). A page
/// made only of standalone fields yields one `_` line per field.
#[must_use]
pub fn page_text(page: &Page) -> String {
    page.lines
        .iter()
        .map(|line| line.text().to_lowercase() + "\n")
        .collect()
}

/// Plain text of several pages, concatenated in input order
#[must_use]
pub fn render_plain_text(pages: &[Page]) -> String {
    pages.iter().map(page_text).collect()
}

/// One reconstructed line placed on the output page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Line text with fields rendered as underscore runs
    pub text: String,
    /// Left offset (points)
    pub left: f64,
    /// Top offset (points)
    pub top: f64,
    /// Line box width (points)
    pub width: f64,
    /// Vertical distance from the previous line's top, or from the page top
    pub space_before: f64,
    /// Font size (points), proportional to the line height
    pub font_size: f64,
    /// Ids of the fields rendered on this line
    pub field_ids: Vec<u32>,
}

/// Positioned output of one input image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Page width (points)
    pub width: f64,
    /// Page height (points)
    pub height: f64,
    /// Uniform scale applied to image geometry
    pub scale: f64,
    /// Lines in reading order
    pub placements: Vec<Placement>,
}

/// Flattened view of a [`PositionedDocument`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DocumentItem<'a> {
    Placement(&'a Placement),
    PageBreak,
}

/// Positioned reconstruction of a batch: one section per input image
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionedDocument {
    pub sections: Vec<Section>,
}

impl PositionedDocument {
    /// Placements of every section with a page break between sections
    #[must_use]
    pub fn items(&self) -> Vec<DocumentItem<'_>> {
        let mut items = Vec::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                items.push(DocumentItem::PageBreak);
            }
            items.extend(section.placements.iter().map(DocumentItem::Placement));
        }
        items
    }

    /// Serialize to pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the positioned document for `pages`, in order
#[must_use]
pub fn build_positioned(pages: &[Page], target: Option<PageSize>) -> PositionedDocument {
    PositionedDocument {
        sections: pages.iter().map(|page| build_section(page, target)).collect(),
    }
}

/// Positioned output of a single page
#[must_use]
pub fn build_section(page: &Page, target: Option<PageSize>) -> Section {
    let scale = uniform_scale(page, target);
    let to_pt = |px: i32| px_to_pt(f64::from(px), page.dpi) * scale;

    let (width, height) = target.map_or_else(
        || {
            (
                px_to_pt(f64::from(page.width), page.dpi),
                px_to_pt(f64::from(page.height), page.dpi),
            )
        },
        PageSize::dimensions_pt,
    );

    let mut previous_top = 0;
    let mut placements = Vec::with_capacity(page.lines.len());
    for line in &page.lines {
        let font_size = to_pt(line.bbox.height).max(MIN_FONT_SIZE);
        placements.push(Placement {
            text: render_line(line, page, font_size, scale),
            left: to_pt(line.bbox.left),
            top: to_pt(line.bbox.top),
            width: to_pt(line.bbox.width),
            space_before: to_pt(line.bbox.top - previous_top),
            font_size,
            field_ids: line.field_ids.clone(),
        });
        previous_top = line.bbox.top;
    }

    Section {
        width,
        height,
        scale,
        placements,
    }
}

/// Number of underscores standing in for a field `width_pt` wide
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn underscore_count(width_pt: f64, font_size: f64) -> usize {
    let advance = font_size.max(MIN_FONT_SIZE) * UNDERSCORE_ADVANCE_EM;
    let n = (width_pt.max(0.0) / advance).round();
    (n as usize).max(1)
}

fn render_line(line: &Line, page: &Page, font_size: f64, scale: f64) -> String {
    let mut ids = line.field_ids.iter();
    line.words
        .iter()
        .map(|word| {
            if word != FIELD_PLACEHOLDER {
                return word.clone();
            }
            let width_px = ids
                .next()
                .and_then(|id| page.field(*id))
                .map_or(0, |field| field.bbox.width);
            let width_pt = px_to_pt(f64::from(width_px), page.dpi) * scale;
            "_".repeat(underscore_count(width_pt, font_size))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, FieldBox};

    fn line(words: &[&str], bbox: BoundingBox, field_ids: Vec<u32>) -> Line {
        Line {
            words: words.iter().map(|w| (*w).to_string()).collect(),
            bbox,
            field_ids,
        }
    }

    fn page_72dpi(lines: Vec<Line>, fields: Vec<FieldBox>) -> Page {
        Page {
            dpi: 72,
            width: 600,
            height: 800,
            lines,
            fields,
        }
    }

    #[test]
    fn test_px_to_pt() {
        assert!((px_to_pt(300.0, 300) - 72.0).abs() < 1e-9);
        assert!((px_to_pt(150.0, 72) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_page_size_parse() {
        assert_eq!("A4".parse::<PageSize>().unwrap(), PageSize::A4);
        assert_eq!("letter".parse::<PageSize>().unwrap(), PageSize::Letter);
        assert!("a5".parse::<PageSize>().is_err());
        let (w, h) = PageSize::Letter.dimensions_pt();
        assert!((w - 612.0).abs() < 1e-9 && (h - 792.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_factors_swap_for_landscape() {
        // Letter-sized scan at 100 dpi: 850 x 1100 px is exactly 612 x 792 pt
        let (sx, sy) = scale_factors(850, 1100, 100, PageSize::Letter);
        assert!((sx - 1.0).abs() < 1e-9 && (sy - 1.0).abs() < 1e-9);

        let (sx, sy) = scale_factors(1100, 850, 100, PageSize::Letter);
        assert!((sx - 1.0).abs() < 1e-9 && (sy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_text_lowercased() {
        let page = page_72dpi(
            vec![
                line(&["Состав:", "Молоко"], BoundingBox::new(0, 10, 100, 20), vec![]),
                line(&["ЖИРНОСТЬ", "_"], BoundingBox::new(0, 40, 100, 20), vec![1]),
            ],
            vec![],
        );
        assert_eq!(render_plain_text(&[page]), "состав: молоко\nжирность _\n");
        assert_eq!(render_plain_text(&[]), "");
    }

    #[test]
    fn test_plain_text_keeps_field_placeholders() {
        let page = page_72dpi(
            vec![
                line(&["Дата", "_", "г."], BoundingBox::new(0, 10, 100, 20), vec![1]),
                line(&["_"], BoundingBox::new(0, 40, 100, 2), vec![2]),
            ],
            vec![],
        );
        assert_eq!(page_text(&page), "дата _ г.\n_\n");
    }

    #[test]
    fn test_field_rendered_as_underscore_run() {
        let field = FieldBox::new(1, BoundingBox::new(120, 30, 200, 2));
        let page = page_72dpi(
            vec![line(&["Дата:", "_"], BoundingBox::new(10, 20, 400, 20), vec![1])],
            vec![field],
        );
        let section = build_section(&page, None);
        let placement = &section.placements[0];
        assert!((placement.font_size - 20.0).abs() < 1e-9);
        // 200pt wide field, 10pt per underscore
        assert_eq!(placement.text, format!("Дата: {}", "_".repeat(20)));
        assert_eq!(placement.field_ids, vec![1]);
    }

    #[test]
    fn test_space_before_accumulates() {
        let page = page_72dpi(
            vec![
                line(&["a"], BoundingBox::new(0, 100, 50, 20), vec![]),
                line(&["b"], BoundingBox::new(0, 160, 50, 20), vec![]),
            ],
            vec![],
        );
        let section = build_section(&page, None);
        assert!((section.placements[0].space_before - 100.0).abs() < 1e-9);
        assert!((section.placements[1].space_before - 60.0).abs() < 1e-9);
        assert!((section.width - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_target_page_scales_geometry() {
        // 1224 x 1584 px at 72 dpi is Letter at twice the size
        let page = Page {
            dpi: 72,
            width: 1224,
            height: 1584,
            lines: vec![line(&["x"], BoundingBox::new(100, 200, 50, 40), vec![])],
            fields: vec![],
        };
        let section = build_section(&page, Some(PageSize::Letter));
        assert!((section.scale - 0.5).abs() < 1e-9);
        let p = &section.placements[0];
        assert!((p.left - 50.0).abs() < 1e-9);
        assert!((p.top - 100.0).abs() < 1e-9);
        assert!((p.font_size - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_page_breaks_between_sections() {
        let page = page_72dpi(
            vec![line(&["a"], BoundingBox::new(0, 0, 10, 10), vec![])],
            vec![],
        );
        let empty = page_72dpi(vec![], vec![]);
        let doc = build_positioned(&[page.clone(), empty, page], None);
        let items = doc.items();
        assert_eq!(items.len(), 4);
        assert!(matches!(items[1], DocumentItem::PageBreak));
        assert!(matches!(items[2], DocumentItem::PageBreak));
        assert!(doc.to_json().unwrap().contains("\"sections\""));
    }

    #[test]
    fn test_underscore_count_minimum() {
        assert_eq!(underscore_count(0.0, 12.0), 1);
        assert_eq!(underscore_count(60.0, 12.0), 10);
    }
}
