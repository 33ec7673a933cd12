//! Property-Based Tests
//!
//! Invariants of the filter, grouper and associator over random inputs:
//! - No record with confidence in (0, threshold) survives
//! - Words inside a line are ordered by left coordinate
//! - Lines are ordered by top coordinate
//! - Field ids appear at most once across all lines
//! - A field outside every line band becomes its own blank line

use formscan_layout::{
    associate_fields, covers_corner, group_lines, AssociationPolicy, BoundingBox, FieldBox,
    LineAddress, Record, WordDetection, FIELD_PLACEHOLDER,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// (line index, left, top, confidence)
fn word_strategy() -> impl Strategy<Value = (i32, i32, i32, f32)> {
    (0..4i32, 0..1000i32, 0..800i32, -1.0f32..100.0f32)
}

fn field_strategy() -> impl Strategy<Value = (i32, i32, i32, i32)> {
    (0..1000i32, 0..800i32, 1..300i32, 1..40i32)
}

fn build_records(words: &[(i32, i32, i32, f32)]) -> (Vec<Record>, HashMap<String, (i32, f32)>) {
    let mut records = Vec::new();
    let mut by_token = HashMap::new();
    for (i, &(line, left, top, conf)) in words.iter().enumerate() {
        let token = format!("w{i}");
        by_token.insert(token.clone(), (left, conf));
        records.push(Record::Word(WordDetection::word(
            token,
            conf,
            BoundingBox::new(left, top, 30, 20),
            LineAddress::new(1, 1, line),
            i as i32,
        )));
    }
    (records, by_token)
}

/// Property: every retained word passes the confidence filter, and every
/// passing word is retained
#[test]
fn proptest_confidence_filter() {
    proptest!(|(words in prop::collection::vec(word_strategy(), 0..40), threshold in 1.0f32..99.0)| {
        let (records, by_token) = build_records(&words);
        let lines = group_lines(records, threshold);

        let kept: HashSet<&String> = lines.iter().flat_map(|l| l.words.iter()).collect();
        for (token, &(_, conf)) in &by_token {
            let passes = conf <= 0.0 || conf >= threshold;
            prop_assert_eq!(kept.contains(token), passes, "token {} conf {}", token, conf);
        }
    });
}

/// Property: words are left-to-right inside lines, lines are top-to-bottom
#[test]
fn proptest_reading_order() {
    proptest!(|(words in prop::collection::vec(word_strategy(), 0..40))| {
        let (records, by_token) = build_records(&words);
        let lines = group_lines(records, 25.0);

        for line in &lines {
            let lefts: Vec<i32> = line.words.iter().map(|w| by_token[w].0).collect();
            prop_assert!(lefts.windows(2).all(|w| w[0] <= w[1]), "lefts {:?}", lefts);
        }
        prop_assert!(lines.windows(2).all(|w| w[0].bbox.top <= w[1].bbox.top));
    });
}

/// Property: association never duplicates a field, and fields outside every
/// band stay standalone blank lines
#[test]
fn proptest_field_ids_unique_and_standalone() {
    proptest!(|(
        words in prop::collection::vec(word_strategy(), 1..20),
        raw_fields in prop::collection::vec(field_strategy(), 0..8),
        tolerance in 0..80i32
    )| {
        let (mut records, _) = build_records(&words);
        let line_rows: Vec<WordDetection> = (0..4)
            .map(|n| WordDetection::line(
                BoundingBox::new(100, 100 + n * 150, 600, 40),
                LineAddress::new(1, 1, n),
            ))
            .collect();

        let mut fields: Vec<FieldBox> = raw_fields
            .iter()
            .enumerate()
            .map(|(i, &(l, t, w, h))| FieldBox::new(i as u32 + 1, BoundingBox::new(l, t, w, h)))
            .collect();
        associate_fields(&mut fields, &line_rows, tolerance, AssociationPolicy::LastMatch);

        for field in &fields {
            let matched = line_rows.iter().any(|r| covers_corner(&field.bbox, &r.bbox, tolerance));
            prop_assert_eq!(field.is_associated(), matched);
        }

        records.extend(line_rows.into_iter().map(Record::Word));
        records.extend(fields.iter().copied().map(Record::Field));
        let lines = group_lines(records, 25.0);

        let mut seen = HashSet::new();
        for id in lines.iter().flat_map(|l| l.field_ids.iter()) {
            prop_assert!(seen.insert(*id), "field {} appears twice", id);
        }
        prop_assert_eq!(seen.len(), fields.len());

        for field in fields.iter().filter(|f| !f.is_associated()) {
            let own = lines.iter().find(|l| l.field_ids.contains(&field.id));
            prop_assert!(own.is_some());
            if let Some(line) = own {
                prop_assert_eq!(&line.words, &vec![FIELD_PLACEHOLDER.to_string()]);
                prop_assert_eq!(&line.field_ids, &vec![field.id]);
            }
        }
    });
}

/// Property: grouping is deterministic
#[test]
fn proptest_grouping_idempotent() {
    proptest!(|(words in prop::collection::vec(word_strategy(), 0..30))| {
        let (first, _) = build_records(&words);
        let (second, _) = build_records(&words);
        prop_assert_eq!(group_lines(first, 25.0), group_lines(second, 25.0));
    });
}
