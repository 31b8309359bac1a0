//! Task recurrence: template rule -> anchor dates -> task instances.
//!
//! Anchors are a pure function of `(template, from, to)`. The planner relies
//! on that to merge regenerated anchors with the ones already stored.

use chrono::{Datelike, Days, Duration, NaiveDate};
use tracing::warn;
use uuid::Uuid;

use crate::days::DaySet;
use crate::models::{Recurrence, TaskInstance, TaskStatus, TaskTemplate};

/// The part of `[from, to]` inside the template's own recurrence window.
pub fn effective_window(template: &TaskTemplate, from: NaiveDate, to: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = template.start_date.max(from);
    let end = template.end_date.min(to);
    (start <= end).then_some((start, end))
}

/// Lazily yields anchor dates in ascending order.
pub fn anchors(template: &TaskTemplate, from: NaiveDate, to: NaiveDate) -> Box<dyn Iterator<Item = NaiveDate>> {
    let Some((start, end)) = effective_window(template, from, to) else {
        return Box::new(std::iter::empty());
    };

    match template.recurrence {
        Recurrence::None => {
            let anchor = template.start_date;
            Box::new((start <= anchor && anchor <= end).then_some(anchor).into_iter())
        }
        Recurrence::Daily { interval } => {
            let step = Days::new(u64::from(interval.get()));
            Box::new(
                std::iter::successors(Some(start), move |d| d.checked_add_days(step))
                    .take_while(move |d| *d <= end),
            )
        }
        Recurrence::Weekly { every_weeks, days } => {
            if days.is_empty() {
                warn!(template = %template.id, "weekly recurrence has no weekdays selected, nothing to generate");
                return Box::new(std::iter::empty());
            }
            Box::new(weekly(start, end, u64::from(every_weeks.get()), days))
        }
        Recurrence::Monthly { interval } => {
            Box::new(monthly(start, end, template.start_date.day(), interval.get()))
        }
    }
}

/// Walks whole weeks from the Monday on or before `start`, `step_weeks` at a time.
fn weekly(start: NaiveDate, end: NaiveDate, step_weeks: u64, days: DaySet) -> impl Iterator<Item = NaiveDate> {
    let monday = start - Days::new(u64::from(start.weekday().num_days_from_monday()));
    let step = Days::new(7 * step_weeks);

    std::iter::successors(Some(monday), move |w| w.checked_add_days(step))
        .take_while(move |w| *w <= end)
        .flat_map(|w| (0..7).filter_map(move |i| w.checked_add_days(Days::new(i))))
        .filter(move |d| start <= *d && *d <= end && days.contains(d.weekday()))
}

/// Same day of month as `day`, clamped to each month's length.
fn monthly(start: NaiveDate, end: NaiveDate, day: u32, interval: u32) -> impl Iterator<Item = NaiveDate> {
    let first_month = start.year() * 12 + start.month0() as i32;
    let first_month = match clamped_day(first_month, day) {
        Some(d) if d < start => first_month + 1,
        _ => first_month,
    };
    let step = interval as i32;

    std::iter::successors(Some(first_month), move |m| m.checked_add(step))
        .map_while(move |m| clamped_day(m, day))
        .take_while(move |d| *d <= end)
}

/// `day` of the month `month_index` (years * 12 + zero-based month), clamped.
fn clamped_day(month_index: i32, day: u32) -> Option<NaiveDate> {
    let year = month_index.div_euclid(12);
    let month = month_index.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(chrono::Months::new(1))?.pred_opt()?;
    NaiveDate::from_ymd_opt(year, month, day.min(last.day()))
}

/// Builds the task instance generated for `anchor`.
///
/// The task bar spans anchor to due date inclusive. A reminder offset counts
/// back from the end of the due day.
///
/// Offsets that would leave the calendar saturate at its ends; templates
/// that passed validation never get there.
pub fn instance_for_anchor(template: &TaskTemplate, anchor: NaiveDate) -> TaskInstance {
    let due = Duration::try_days(template.due_offset_days)
        .and_then(|offset| anchor.checked_add_signed(offset))
        .unwrap_or(if template.due_offset_days < 0 { NaiveDate::MIN } else { NaiveDate::MAX });
    let reminder_at = template.reminder_offset_minutes.and_then(|m| {
        let end_of_day = due.and_hms_opt(23, 59, 0)?;
        end_of_day.checked_sub_signed(Duration::try_minutes(m)?)
    });

    TaskInstance {
        id: Uuid::new_v4(),
        template_id: Some(template.id),
        title: template.title.clone(),
        course_id: template.course_id,
        priority: template.priority,
        start_date: anchor,
        end_date: due,
        due_date: due,
        status: TaskStatus::Todo,
        color: None,
        reminder_at,
    }
}

/// Expands a template into task instances over `[from, to]`.
pub fn expand(template: &TaskTemplate, from: NaiveDate, to: NaiveDate) -> Vec<TaskInstance> {
    anchors(template, from, to)
        .map(|a| instance_for_anchor(template, a))
        .collect()
}
