//! Tests for per-label text flattening

mod common;

use chrono::{Duration, NaiveDateTime};
use common::day;
use inspection_features::flatten::{EventIndex, FlattenOptions, TextFlattener, SEPARATOR};
use inspection_features::models::{
    CanonicalId, FieldValue, LabelId, LabelRecord, Record, RecordSet, SourceKind,
};
use proptest::prelude::*;

fn event(restaurant: &str, date: Option<NaiveDateTime>, text: Option<&str>) -> Record {
    Record::new()
        .with("restaurant_id", FieldValue::Text(restaurant.to_string()))
        .with(
            "review_date",
            date.map_or(FieldValue::Missing, FieldValue::Timestamp),
        )
        .with(
            "text",
            text.map_or(FieldValue::Missing, |t| FieldValue::Text(t.to_string())),
        )
}

fn events(records: Vec<Record>) -> RecordSet {
    RecordSet::new(SourceKind::Event, records)
}

fn label(id: &str, restaurant: &str, date: NaiveDateTime) -> LabelRecord {
    LabelRecord {
        id: LabelId(id.to_string()),
        restaurant_id: CanonicalId::new(restaurant),
        inspection_date: date,
        targets: None,
    }
}

fn flatten(index: &EventIndex, labels: &[LabelRecord]) -> Vec<(String, String)> {
    TextFlattener::new(index, FlattenOptions::default())
        .flatten(labels)
        .iter()
        .map(|(id, text)| (id.0.clone(), text.to_string()))
        .collect()
}

#[test]
fn test_restaurant_with_earlier_and_later_reviews() {
    let index = EventIndex::from_events(&events(vec![
        event("B1", Some(day("2014-01-01")), Some("good food")),
        event("B1", Some(day("2014-01-05")), Some("bad service")),
    ]));

    let docs = flatten(&index, &[label("L1", "B1", day("2014-01-03"))]);
    assert_eq!(docs, vec![("L1".to_string(), "good food".to_string())]);
}

#[test]
fn test_restaurant_without_events_gets_empty_document() {
    let index = EventIndex::from_events(&events(vec![event(
        "B1",
        Some(day("2014-01-01")),
        Some("good food"),
    )]));

    let docs = TextFlattener::new(&index, FlattenOptions::default())
        .flatten(&[label("L9", "B9", day("2015-01-01"))]);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs.get(&LabelId("L9".to_string())), Some(""));
    assert_eq!(docs.empty_count(), 1);
}

#[test]
fn test_label_order_is_preserved() {
    let index = EventIndex::from_events(&events(vec![
        event("B1", Some(day("2014-01-01")), Some("one")),
        event("B2", Some(day("2014-01-01")), Some("two")),
    ]));
    let labels = [
        label("L3", "B2", day("2014-02-01")),
        label("L1", "B1", day("2014-02-01")),
        label("L2", "B9", day("2014-02-01")),
    ];

    let ids: Vec<String> = flatten(&index, &labels).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["L3", "L1", "L2"]);
}

#[test]
fn test_texts_keep_source_order_not_date_order() {
    // A later review listed before an earlier tip stays first
    let index = EventIndex::from_events(&events(vec![
        event("B1", Some(day("2014-01-10")), Some("review")),
        event("B1", Some(day("2014-01-02")), Some("tip")),
    ]));

    let docs = flatten(&index, &[label("L1", "B1", day("2014-02-01"))]);
    assert_eq!(docs[0].1, format!("review{SEPARATOR}tip"));
}

#[test]
fn test_same_day_and_undated_events_are_excluded() {
    let index = EventIndex::from_events(&events(vec![
        event("B1", Some(day("2014-01-03")), Some("same day")),
        event("B1", None, Some("undated")),
        event("B1", Some(day("2014-01-02")), Some("day before")),
    ]));

    let docs = flatten(&index, &[label("L1", "B1", day("2014-01-03"))]);
    assert_eq!(docs[0].1, "day before");
}

#[test]
fn test_events_without_text_are_not_indexed() {
    let index = EventIndex::from_events(&events(vec![
        event("B1", Some(day("2014-01-01")), None),
        event("B1", Some(day("2014-01-01")), Some("kept")),
    ]));

    assert_eq!(index.len(), 1);
    assert_eq!(index.restaurants(), 1);
    let docs = flatten(&index, &[label("L1", "B1", day("2014-02-01"))]);
    assert_eq!(docs[0].1, "kept");
}

#[test]
fn test_each_inspection_is_filtered_independently() {
    let index = EventIndex::from_events(&events(vec![
        event("B1", Some(day("2014-01-01")), Some("early")),
        event("B1", Some(day("2014-06-01")), Some("late")),
    ]));
    let labels = [
        label("L1", "B1", day("2014-03-01")),
        label("L2", "B1", day("2014-12-01")),
    ];

    let docs = flatten(&index, &labels);
    assert_eq!(docs[0].1, "early");
    assert_eq!(docs[1].1, "early late");
}

#[test]
fn test_parallel_matches_sequential() {
    let records = (0..200)
        .map(|i| {
            event(
                &format!("B{}", i % 7),
                Some(day("2014-01-01") + Duration::days(i)),
                Some(format!("text{i}").as_str()),
            )
        })
        .collect();
    let index = EventIndex::from_events(&events(records));
    let labels: Vec<LabelRecord> = (0..50)
        .map(|i| label(&format!("L{i}"), &format!("B{}", i % 9), day("2014-01-01") + Duration::days(i * 4)))
        .collect();

    let sequential = TextFlattener::new(&index, FlattenOptions::default()).flatten(&labels);
    let parallel = TextFlattener::new(
        &index,
        FlattenOptions {
            progress_interval: 10,
            parallel: true,
        },
    )
    .flatten(&labels);

    assert_eq!(sequential, parallel);
}

fn arb_events() -> impl Strategy<Value = Vec<(u8, i64, String)>> {
    prop::collection::vec((0u8..4, 0i64..60, "[a-z]{1,6}"), 0..40)
}

fn arb_labels() -> impl Strategy<Value = Vec<(u8, i64)>> {
    prop::collection::vec((0u8..5, 0i64..60), 0..20)
}

proptest! {
    #[test]
    fn prop_documents_match_naive_scan(raw_events in arb_events(), raw_labels in arb_labels()) {
        let base = day("2014-01-01");
        let records = raw_events
            .iter()
            .map(|(r, offset, text)| event(&format!("B{r}"), Some(base + Duration::days(*offset)), Some(text.as_str())))
            .collect();
        let index = EventIndex::from_events(&events(records));
        let labels: Vec<LabelRecord> = raw_labels
            .iter()
            .enumerate()
            .map(|(i, (r, offset))| label(&format!("L{i}"), &format!("B{r}"), base + Duration::days(*offset)))
            .collect();

        let docs = flatten(&index, &labels);

        prop_assert_eq!(docs.len(), labels.len());
        for ((id, text), label) in docs.iter().zip(&labels) {
            prop_assert_eq!(id, &label.id.0);
            let expected: Vec<&str> = raw_events
                .iter()
                .filter(|(r, offset, _)| {
                    format!("B{r}") == label.restaurant_id.0
                        && base + Duration::days(*offset) < label.inspection_date
                })
                .map(|(_, _, t)| t.as_str())
                .collect();
            prop_assert_eq!(text, &expected.join(SEPARATOR));
        }
    }
}
