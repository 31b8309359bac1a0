//! Expansion of weekly meeting patterns into dated meeting instances.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Course, MeetingInstance, MeetingPattern};

/// The part of `[from, to]` that lies within the course's own date range.
///
/// Returns `None` when the two do not overlap.
pub fn effective_window(course: &Course, from: NaiveDate, to: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = course.start_date.max(from);
    let end = course.end_date.min(to);
    (start <= end).then_some((start, end))
}

/// First date on or after `start` that falls on `pattern`'s weekday.
fn first_meeting(start: NaiveDate, pattern: &MeetingPattern) -> NaiveDate {
    let ahead = (7 + pattern.weekday.num_days_from_monday() - start.weekday().num_days_from_monday()) % 7;
    start + Days::new(u64::from(ahead))
}

/// Lazily yields the meetings of `course` between `from` and `to` (inclusive).
///
/// Virtual courses yield nothing. Dates in `skips` are left out. Each
/// instance gets a fresh id; no deduplication happens here.
pub fn occurrences<'a>(
    course: &'a Course,
    patterns: &'a [MeetingPattern],
    skips: &'a BTreeSet<NaiveDate>,
    from: NaiveDate,
    to: NaiveDate,
) -> impl Iterator<Item = MeetingInstance> + 'a {
    let window = if course.is_virtual {
        None
    } else {
        effective_window(course, from, to)
    };

    window.into_iter().flat_map(move |(start, end)| {
        patterns
            .iter()
            .filter(move |p| {
                if p.start_time >= p.end_time {
                    warn!(pattern = %p.id, course = %course.id, "skipping meeting pattern that does not end after it starts");
                    return false;
                }
                true
            })
            .flat_map(move |p| {
                std::iter::successors(Some(first_meeting(start, p)), |d| d.checked_add_days(Days::new(7)))
                    .take_while(move |d| *d <= end)
                    .filter(move |d| !skips.contains(d))
                    .map(move |d| MeetingInstance {
                        id: Uuid::new_v4(),
                        course_id: course.id,
                        pattern_id: p.id,
                        start: d.and_time(p.start_time),
                        end: d.and_time(p.end_time),
                        cancelled: false,
                        override_title: None,
                        override_location: None,
                    })
            })
    })
}

/// Collects [`occurrences`] into a vector.
pub fn expand(
    course: &Course,
    patterns: &[MeetingPattern],
    skips: &BTreeSet<NaiveDate>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<MeetingInstance> {
    occurrences(course, patterns, skips, from, to).collect()
}
