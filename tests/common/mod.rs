//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use inspection_features::crosswalk::CrosswalkEntry;
use inspection_features::models::{CanonicalId, ExternalId, RawRecord};
use inspection_features::sources::RawDatasets;
use serde_json::{json, Value};

pub fn raw(value: Value) -> RawRecord {
    value.as_object().cloned().expect("fixture must be a JSON object")
}

pub fn day(date: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("valid fixture date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
}

pub fn review(business: &str, user: &str, date: &str, text: &str) -> RawRecord {
    raw(json!({
        "business_id": business,
        "date": date,
        "review_id": format!("r-{text}"),
        "stars": 4,
        "text": text,
        "type": "review",
        "user_id": user,
        "votes": {"cool": 1, "funny": 0, "useful": 2},
    }))
}

pub fn tip(business: &str, user: &str, date: &str, text: &str) -> RawRecord {
    raw(json!({
        "business_id": business,
        "date": date,
        "likes": 0,
        "text": text,
        "type": "tip",
        "user_id": user,
    }))
}

pub fn user(id: &str) -> RawRecord {
    raw(json!({
        "average_stars": 4.2,
        "compliments": {"funny": 1},
        "elite": ["2012"],
        "fans": 3,
        "friends": [],
        "name": "Ann",
        "review_count": 10,
        "type": "user",
        "user_id": id,
        "votes": {"cool": 5, "funny": 2, "useful": 7},
        "yelping_since": "2010-03",
    }))
}

pub fn business(id: &str, name: &str) -> RawRecord {
    raw(json!({
        "attributes": {"Take-out": true},
        "business_id": id,
        "categories": ["Pizza", "Restaurants"],
        "city": "Boston",
        "full_address": "1 Main St\nBoston, MA 02110",
        "hours": {},
        "latitude": 42.36,
        "longitude": -71.05,
        "name": name,
        "neighborhoods": ["Downtown"],
        "open": true,
        "review_count": 12,
        "stars": 3.5,
        "state": "MA",
        "type": "business",
    }))
}

pub fn checkin(id: &str) -> RawRecord {
    raw(json!({
        "business_id": id,
        "checkin_info": {"9-5": 2},
        "type": "checkin",
    }))
}

pub fn train_label(id: &str, date: &str, restaurant: &str, targets: (u32, u32, u32)) -> RawRecord {
    raw(json!({
        "id": id,
        "date": date,
        "restaurant_id": restaurant,
        "*": targets.0.to_string(),
        "**": targets.1.to_string(),
        "***": targets.2.to_string(),
    }))
}

pub fn submission_row(id: &str, date: &str, restaurant: &str) -> RawRecord {
    raw(json!({
        "id": id,
        "date": date,
        "restaurant_id": restaurant,
        "*": null,
        "**": null,
        "***": null,
    }))
}

pub fn crosswalk_entry(canonical: &str, externals: &[&str]) -> CrosswalkEntry {
    CrosswalkEntry::new(
        CanonicalId::new(canonical),
        externals.iter().map(|e| ExternalId::new(*e)).collect(),
    )
    .expect("fixture entry within width limit")
}

/// B1 is known on Yelp as Y1 and Y2; B2 as Y3. Y1 has a review before and
/// after the B1 inspection; Z9 is not in the crosswalk.
pub fn scenario() -> RawDatasets {
    RawDatasets {
        crosswalk: vec![
            crosswalk_entry("B1", &["Y1", "Y2"]),
            crosswalk_entry("B2", &["Y3"]),
        ],
        reviews: vec![
            review("Y1", "U1", "2014-01-01", "good food"),
            review("Y1", "U1", "2014-01-05", "bad service"),
            review("Z9", "U1", "2014-01-01", "unmapped"),
        ],
        tips: vec![tip("Y3", "U2", "2014-02-01", "try the soup")],
        users: vec![user("U1"), user("U2")],
        businesses: vec![
            business("Y1", "Pizza Place"),
            business("Y2", "Pizza Place Annex"),
            business("Y3", "Soup Shop"),
        ],
        checkins: vec![checkin("Y3")],
        train_labels: vec![
            train_label("L1", "2014-01-03", "B1", (1, 0, 2)),
            train_label("L2", "2014-03-01", "B2", (0, 1, 0)),
        ],
        submission: vec![
            submission_row("S1", "2014-02-01", "B2"),
            submission_row("S2", "2014-06-01", "B1"),
        ],
    }
}
