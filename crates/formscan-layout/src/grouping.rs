//! Recognition filter and line grouper
//!
//! Drops unreliable transcriptions, groups the surviving records by their
//! (block, paragraph, line) address and orders everything for reading:
//! records left-to-right inside a line, lines top-to-bottom on the page.

use crate::types::{BoundingBox, Line, LineAddress, Record};
use std::collections::BTreeMap;

/// Confidence filter
///
/// Non-positive confidence marks a structural or synthetic record and always
/// passes. Anything else must reach `threshold`.
#[inline]
#[must_use]
pub fn passes_confidence(confidence: f32, threshold: f32) -> bool {
    confidence <= 0.0 || confidence >= threshold
}

/// Filter `records` by confidence and group them into ordered lines
///
/// - OCR records in (0, threshold) are dropped. Field records are always
///   kept, at any threshold.
/// - Each group is stably sorted by `left`; its geometry is the first
///   record's box after that sort, never a union of boxes.
/// - Groups with no non-blank token are dropped.
/// - Lines are stably sorted by `top`. Equal tops keep address order.
#[must_use = "returns the grouped lines"]
pub fn group_lines(records: Vec<Record>, threshold: f32) -> Vec<Line> {
    let total = records.len();
    let mut groups: BTreeMap<LineAddress, Vec<Record>> = BTreeMap::new();
    for record in records {
        if record.is_synthetic() || passes_confidence(record.confidence(), threshold) {
            groups.entry(record.address()).or_default().push(record);
        }
    }
    let kept: usize = groups.values().map(Vec::len).sum();

    let mut lines: Vec<Line> = groups.into_values().filter_map(build_line).collect();
    lines.sort_by_key(|line| line.bbox.top);

    log::debug!(
        "Grouping: kept {kept}/{total} records (threshold {threshold}), {} lines",
        lines.len()
    );
    lines
}

fn build_line(mut group: Vec<Record>) -> Option<Line> {
    group.sort_by_key(|r| r.bbox().left);
    let bbox: BoundingBox = group.first()?.bbox();

    let mut words = Vec::new();
    let mut field_ids = Vec::new();
    for record in &group {
        let token = record.text().trim();
        if !token.is_empty() {
            words.push(token.to_string());
        }
        if let Some(id) = record.field_id() {
            field_ids.push(id);
        }
    }

    if words.is_empty() {
        return None;
    }
    Some(Line {
        words,
        bbox,
        field_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldBox, WordDetection, FIELD_PLACEHOLDER};

    fn word(text: &str, conf: f32, left: i32, top: i32, line: i32) -> Record {
        Record::Word(WordDetection::word(
            text,
            conf,
            BoundingBox::new(left, top, 40, 20),
            LineAddress::new(1, 1, line),
            1,
        ))
    }

    #[test]
    fn test_passes_confidence() {
        assert!(passes_confidence(-1.0, 25.0));
        assert!(passes_confidence(0.0, 25.0));
        assert!(passes_confidence(25.0, 25.0));
        assert!(!passes_confidence(24.9, 25.0));
        assert!(!passes_confidence(0.5, 25.0));
    }

    #[test]
    fn test_low_confidence_token_dropped() {
        let lines = group_lines(
            vec![word("шум", 10.0, 0, 100, 1), word("молоко", 30.0, 50, 100, 1)],
            25.0,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words, vec!["молоко"]);
    }

    #[test]
    fn test_words_sorted_left_to_right() {
        let lines = group_lines(
            vec![
                word("сахар", 95.0, 200, 100, 1),
                word("Состав:", 95.0, 0, 100, 1),
                word("молоко,", 95.0, 100, 100, 1),
            ],
            25.0,
        );
        assert_eq!(lines[0].text(), "Состав: молоко, сахар");
        assert_eq!(lines[0].bbox.left, 0);
    }

    #[test]
    fn test_geometry_from_first_record() {
        let line_row = Record::Word(WordDetection::line(
            BoundingBox::new(0, 98, 400, 30),
            LineAddress::new(1, 1, 1),
        ));
        let lines = group_lines(vec![line_row, word("Состав:", 95.0, 0, 100, 1)], 25.0);
        assert_eq!(lines[0].bbox, BoundingBox::new(0, 98, 400, 30));
    }

    #[test]
    fn test_lines_sorted_top_to_bottom() {
        let lines = group_lines(
            vec![word("низ", 90.0, 0, 300, 1), word("верх", 90.0, 0, 100, 2)],
            25.0,
        );
        let tops: Vec<i32> = lines.iter().map(|l| l.bbox.top).collect();
        assert_eq!(tops, vec![100, 300]);
    }

    #[test]
    fn test_structural_only_groups_dropped() {
        let block = Record::Word(WordDetection::line(
            BoundingBox::new(0, 0, 500, 500),
            LineAddress::new(1, 0, 0),
        ));
        let blank = word("   ", 95.0, 0, 50, 3);
        assert!(group_lines(vec![block, blank], 25.0).is_empty());
    }

    #[test]
    fn test_standalone_field_is_blank_line() {
        let field = Record::Field(FieldBox::new(4, BoundingBox::new(10, 400, 120, 2)));
        let lines = group_lines(vec![word("Дата", 90.0, 0, 100, 1), field], 25.0);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].is_blank());
        assert_eq!(lines[1].words, vec![FIELD_PLACEHOLDER]);
        assert_eq!(lines[1].field_ids, vec![4]);
        assert!(lines[0].field_ids.is_empty());
    }

    #[test]
    fn test_fields_survive_any_threshold() {
        for threshold in [95.0, 100.0, f32::MAX] {
            let mut attached = FieldBox::new(1, BoundingBox::new(120, 105, 80, 2));
            attached.address = LineAddress::new(1, 1, 1);
            let standalone = FieldBox::new(2, BoundingBox::new(10, 400, 120, 2));
            let lines = group_lines(
                vec![
                    word("Дата:", 99.0, 0, 100, 1),
                    Record::Field(attached),
                    Record::Field(standalone),
                ],
                threshold,
            );
            let ids: Vec<u32> = lines.iter().flat_map(|l| l.field_ids.clone()).collect();
            assert_eq!(ids, vec![1, 2], "threshold {threshold}");
        }
        let alone = group_lines(
            vec![Record::Field(FieldBox::new(1, BoundingBox::new(0, 0, 50, 2)))],
            100.0,
        );
        assert_eq!(alone.len(), 1);
        assert!(alone[0].is_blank());
    }

    #[test]
    fn test_associated_field_joins_line() {
        let mut field = FieldBox::new(1, BoundingBox::new(120, 105, 80, 2));
        field.address = LineAddress::new(1, 1, 1);
        let lines = group_lines(
            vec![
                word("Дата:", 90.0, 0, 100, 1),
                Record::Field(field),
                word("г.", 90.0, 210, 100, 1),
            ],
            25.0,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "Дата: _ г.");
        assert_eq!(lines[0].field_ids, vec![1]);
    }
}
