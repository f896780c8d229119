//! No-future filter.
//!
//! An event may only feed an inspection's features if it happened strictly
//! before the inspection. Same-day events are excluded. An event without a
//! usable date never qualifies.

use chrono::NaiveDateTime;
use tracing::info;

use crate::join::JoinedTable;

/// True iff an event at `event_date` may be used for an inspection at
/// `inspection_date`
#[must_use]
pub fn precedes(event_date: Option<NaiveDateTime>, inspection_date: NaiveDateTime) -> bool {
    event_date.is_some_and(|date| date < inspection_date)
}

/// Keep only rows whose event predates their inspection
#[must_use]
pub fn drop_future_events(table: JoinedTable) -> JoinedTable {
    let before = table.rows.len();
    let rows: Vec<_> = table
        .rows
        .into_iter()
        .filter(|row| precedes(row.event_date, row.inspection_date))
        .collect();

    info!(
        kept = rows.len(),
        removed = before - rows.len(),
        "Removed events at or after their inspection"
    );
    JoinedTable {
        rows,
        stats: table.stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 3, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_same_day_is_excluded() {
        assert!(!precedes(Some(day(5)), day(5)));
    }

    #[test]
    fn test_earlier_is_kept() {
        assert!(precedes(Some(day(4)), day(5)));
        assert!(!precedes(Some(day(6)), day(5)));
    }

    #[test]
    fn test_undated_event_never_qualifies() {
        assert!(!precedes(None, day(5)));
    }
}
