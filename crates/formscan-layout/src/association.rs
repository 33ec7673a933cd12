//! Field-to-line association
//!
//! A field belongs to a text line when any of its four corners lies inside
//! the line's box, widened horizontally by a tolerance. There is no vertical
//! tolerance: the corner must sit within the line's own vertical band.

use crate::types::{BoundingBox, FieldBox, RecordLevel, WordDetection};
use serde::{Deserialize, Serialize};

/// How to choose among several lines that all pass the corner test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssociationPolicy {
    /// The last matching line in OCR order wins. Kept for output
    /// compatibility; it is not a best-fit choice.
    #[default]
    LastMatch,
    /// The first matching line in OCR order wins
    FirstMatch,
    /// The matching line whose widened box overlaps the field most wins;
    /// ties go to the earlier line
    LargestOverlap,
}

impl std::fmt::Display for AssociationPolicy {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastMatch => write!(f, "last-match"),
            Self::FirstMatch => write!(f, "first-match"),
            Self::LargestOverlap => write!(f, "largest-overlap"),
        }
    }
}

impl std::str::FromStr for AssociationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "last-match" | "last" => Ok(Self::LastMatch),
            "first-match" | "first" => Ok(Self::FirstMatch),
            "largest-overlap" | "overlap" => Ok(Self::LargestOverlap),
            _ => Err(format!(
                "Unknown association policy '{s}'. Expected: last-match, first-match, largest-overlap"
            )),
        }
    }
}

/// Line box widened by `tolerance` pixels on the left and right
///
/// Saturates at the `i32` range; use [`covers_corner`] for the exact test.
#[inline]
#[must_use]
pub const fn widened(line: &BoundingBox, tolerance: i32) -> BoundingBox {
    BoundingBox::new(
        line.left.saturating_sub(tolerance),
        line.top,
        line.width.saturating_add(tolerance.saturating_mul(2)),
        line.height,
    )
}

/// Corner-containment test between a field box and a line box
///
/// A corner is covered when `line.left - T <= x <= line.right + T` and
/// `line.top <= y <= line.bottom` (both bounds inclusive). Evaluated in
/// `i64`, so any `i32` geometry and tolerance is exact.
#[must_use]
pub fn covers_corner(field: &BoundingBox, line: &BoundingBox, tolerance: i32) -> bool {
    let t = i64::from(tolerance);
    let (line_left, line_right) = line.x_span();
    let (band_top, band_bottom) = line.y_span();
    let (band_left, band_right) = (line_left - t, line_right + t);

    // The corners are every pairing of the two x edges with the two y edges
    let (x0, x1) = field.x_span();
    let (y0, y1) = field.y_span();
    let x_in = [x0, x1].iter().any(|&x| band_left <= x && x <= band_right);
    let y_in = [y0, y1].iter().any(|&y| band_top <= y && y <= band_bottom);
    x_in && y_in
}

/// Pick the line a field belongs to, as an index into `lines`
#[must_use]
pub fn best_line(
    field: &BoundingBox,
    lines: &[&BoundingBox],
    tolerance: i32,
    policy: AssociationPolicy,
) -> Option<usize> {
    let mut matches = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| covers_corner(field, line, tolerance));

    match policy {
        AssociationPolicy::LastMatch => matches.last().map(|(i, _)| i),
        AssociationPolicy::FirstMatch => matches.next().map(|(i, _)| i),
        AssociationPolicy::LargestOverlap => {
            let mut best: Option<(usize, i64)> = None;
            for (i, line) in matches {
                let overlap = field.intersection_area(&widened(line, tolerance));
                if best.map_or(true, |(_, b)| overlap > b) {
                    best = Some((i, overlap));
                }
            }
            best.map(|(i, _)| i)
        }
    }
}

/// Attach each field to the OCR line it geometrically belongs to
///
/// Only `RecordLevel::Line` rows of `records` are candidates. Fields with no
/// matching line keep their synthetic address. Returns how many fields were
/// associated.
pub fn associate_fields(
    fields: &mut [FieldBox],
    records: &[WordDetection],
    tolerance: i32,
    policy: AssociationPolicy,
) -> usize {
    let lines: Vec<&WordDetection> = records
        .iter()
        .filter(|r| r.level == RecordLevel::Line)
        .collect();
    let boxes: Vec<&BoundingBox> = lines.iter().map(|l| &l.bbox).collect();

    let mut associated = 0;
    for field in fields.iter_mut() {
        if let Some(i) = best_line(&field.bbox, &boxes, tolerance, policy) {
            field.address = lines[i].address;
            associated += 1;
        }
    }

    log::debug!(
        "Field association: {associated}/{} fields attached to {} lines ({policy})",
        fields.len(),
        lines.len()
    );
    associated
}
