//! Property tests for the expanders.
//!
//! Templates and courses are drawn from a two-year span with arbitrary
//! windows, including inverted ones.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use planust::days::{self, DaySet};
use planust::models::{Course, Frequency, MeetingPattern, Recurrence, TaskTemplate};
use planust::{meeting, recurrence};
use proptest::prelude::*;
use uuid::Uuid;

fn day(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Days::new(u64::from(offset))
}

fn frequency() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::None),
        Just(Frequency::Daily),
        Just(Frequency::Weekly),
        Just(Frequency::Biweekly),
        Just(Frequency::Monthly),
    ]
}

fn template(freq: Frequency, interval: u32, mask: u8, start: u32, len: u32) -> TaskTemplate {
    TaskTemplate {
        id: Uuid::new_v4(),
        title: "prop".into(),
        course_id: None,
        priority: 3,
        start_date: day(start),
        end_date: day(start + len),
        recurrence: Recurrence::from_parts(freq, interval, DaySet::from_mask(mask)).unwrap(),
        due_offset_days: 0,
        reminder_offset_minutes: None,
    }
}

/// Property: the same template and window always give the same anchors
#[test]
fn proptest_expansion_is_deterministic() {
    proptest!(|(
        freq in frequency(),
        interval in 1u32..5,
        mask in 0u8..128,
        start in 0u32..400,
        len in 0u32..300,
        from in 0u32..730,
        to in 0u32..730
    )| {
        let t = template(freq, interval, mask, start, len);
        let a: Vec<NaiveDate> = recurrence::anchors(&t, day(from), day(to)).collect();
        let b: Vec<NaiveDate> = recurrence::anchors(&t, day(from), day(to)).collect();
        prop_assert_eq!(&a, &b);

        let instances = recurrence::expand(&t, day(from), day(to));
        let starts: Vec<NaiveDate> = instances.iter().map(|i| i.start_date).collect();
        prop_assert_eq!(starts, a);
    });
}

/// Property: anchors stay inside the clamped window and strictly increase
#[test]
fn proptest_anchors_stay_in_window() {
    proptest!(|(
        freq in frequency(),
        interval in 1u32..5,
        mask in 0u8..128,
        start in 0u32..400,
        len in 0u32..300,
        from in 0u32..730,
        to in 0u32..730
    )| {
        let t = template(freq, interval, mask, start, len);
        let lo = t.start_date.max(day(from));
        let hi = t.end_date.min(day(to));
        let anchors: Vec<NaiveDate> = recurrence::anchors(&t, day(from), day(to)).collect();

        if lo > hi {
            prop_assert!(anchors.is_empty());
        }
        for d in &anchors {
            prop_assert!(lo <= *d && *d <= hi, "{} outside [{}, {}]", d, lo, hi);
        }
        for pair in anchors.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        if let Recurrence::Weekly { days, .. } = t.recurrence {
            for d in &anchors {
                prop_assert!(days.contains(d.weekday()));
            }
        }
    });
}

/// Property: mask encoding round-trips for every 7-bit value
#[test]
fn proptest_day_mask_round_trip() {
    proptest!(|(mask in 0u8..128)| {
        prop_assert_eq!(days::encode(days::decode(mask)), mask);
    });
}

fn course(is_virtual: bool, start: u32, len: u32) -> Course {
    Course {
        id: Uuid::new_v4(),
        name: "prop".into(),
        color: 0xFF00_0000,
        location: None,
        is_virtual,
        start_date: day(start),
        end_date: day(start + len),
    }
}

fn patterns(course_id: Uuid, mask: u8) -> Vec<MeetingPattern> {
    days::decode(mask)
        .into_iter()
        .map(|wd| {
            MeetingPattern::new(
                course_id,
                wd,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            )
            .unwrap()
        })
        .collect()
}

/// Property: virtual courses never produce meetings
#[test]
fn proptest_virtual_course_is_empty() {
    proptest!(|(mask in 0u8..128, start in 0u32..400, len in 0u32..300, from in 0u32..730, to in 0u32..730)| {
        let c = course(true, start, len);
        let p = patterns(c.id, mask);
        prop_assert!(meeting::expand(&c, &p, &BTreeSet::new(), day(from), day(to)).is_empty());
    });
}

/// Property: skipped dates never produce meetings, and every meeting falls
/// on one of its pattern's weekdays inside the course
#[test]
fn proptest_meetings_honor_skips() {
    proptest!(|(
        mask in 1u8..128,
        start in 0u32..400,
        len in 0u32..200,
        skip_offsets in proptest::collection::vec(0u32..200, 0..10)
    )| {
        let c = course(false, start, len);
        let p = patterns(c.id, mask);
        let skips: BTreeSet<NaiveDate> = skip_offsets.iter().map(|o| day(start + o)).collect();

        let meetings = meeting::expand(&c, &p, &skips, c.start_date, c.end_date);
        let unskipped = meeting::expand(&c, &p, &BTreeSet::new(), c.start_date, c.end_date);
        let set = DaySet::from_mask(mask);

        for m in &meetings {
            prop_assert!(!skips.contains(&m.date()));
            prop_assert!(set.contains(m.date().weekday()));
            prop_assert!(c.start_date <= m.date() && m.date() <= c.end_date);
        }
        let skipped_hits = unskipped.iter().filter(|m| skips.contains(&m.date())).count();
        prop_assert_eq!(meetings.len() + skipped_hits, unskipped.len());
    });
}
