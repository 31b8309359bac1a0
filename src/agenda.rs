//! Merged, date-ordered view of meetings, tasks and events.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Course, TaskStatus};
use crate::storage::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgendaKind {
    Task,
    Meeting,
    Event,
}

impl AgendaKind {
    pub fn label(self) -> &'static str {
        match self {
            AgendaKind::Task => "Task",
            AgendaKind::Meeting => "Class",
            AgendaKind::Event => "Event",
        }
    }
}

/// One row of the agenda.
#[derive(Debug, Clone, PartialEq)]
pub struct AgendaItem {
    pub kind: AgendaKind,
    pub id: Uuid,
    pub date: NaiveDate,
    /// `None` for all-day items (tasks).
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub title: String,
    pub course: Option<String>,
    pub color: u32,
    /// Location for meetings and events.
    pub location: Option<String>,
    pub status: Option<TaskStatus>,
    pub cancelled: bool,
}

/// Everything happening on `days` days starting at `from`.
///
/// Tasks are listed on their due date. All-day items sort before timed
/// ones on the same day.
pub fn agenda<S: Store>(store: &S, from: NaiveDate, days: u32, default_color: u32) -> Result<Vec<AgendaItem>> {
    let Some(to) = from.checked_add_days(Days::new(u64::from(days.max(1)) - 1)) else {
        return Ok(Vec::new());
    };
    let range_start = from.and_time(NaiveTime::MIN);
    let range_end = to.succ_opt().map_or(NaiveDateTime::MAX, |d| d.and_time(NaiveTime::MIN));

    let courses: HashMap<Uuid, Course> = store.courses()?.into_iter().map(|c| (c.id, c)).collect();
    let course_name = |id: Option<Uuid>| id.and_then(|id| courses.get(&id)).map(|c| c.name.clone());
    let course_color = |id: Option<Uuid>| id.and_then(|id| courses.get(&id)).map(|c| c.color);

    let mut items = Vec::new();

    for m in store.meetings_in_range(range_start, range_end)? {
        let course = courses.get(&m.course_id);
        items.push(AgendaItem {
            kind: AgendaKind::Meeting,
            id: m.id,
            date: m.date(),
            start: Some(m.start.time()),
            end: Some(m.end.time()),
            title: m
                .override_title
                .clone()
                .or_else(|| course.map(|c| c.name.clone()))
                .unwrap_or_else(|| "Class".into()),
            course: course.map(|c| c.name.clone()),
            color: course.map_or(default_color, |c| c.color),
            location: m.override_location.clone().or_else(|| course.and_then(|c| c.location.clone())),
            status: None,
            cancelled: m.cancelled,
        });
    }

    for t in store.tasks_in_range(from, to)? {
        if t.due_date < from || t.due_date > to {
            continue;
        }
        items.push(AgendaItem {
            kind: AgendaKind::Task,
            id: t.id,
            date: t.due_date,
            start: None,
            end: None,
            title: t.title.clone(),
            course: course_name(t.course_id),
            color: t.color.or_else(|| course_color(t.course_id)).unwrap_or(default_color),
            location: None,
            status: Some(t.status),
            cancelled: false,
        });
    }

    for e in store.events_in_range(range_start, range_end)? {
        items.push(AgendaItem {
            kind: AgendaKind::Event,
            id: e.id,
            date: e.start.date(),
            start: Some(e.start.time()),
            end: Some(e.end.time()),
            title: e.title.clone(),
            course: course_name(e.course_id),
            color: e.color,
            location: e.location.clone(),
            status: None,
            cancelled: false,
        });
    }

    items.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.start.cmp(&b.start))
            .then(a.kind.cmp(&b.kind))
            .then(a.title.cmp(&b.title))
    });
    Ok(items)
}
