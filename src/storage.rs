use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PlannerError, Result};
use crate::models::{
    Course, MeetingInstance, MeetingPattern, MeetingSkip, SpecialEvent, TaskInstance, TaskStatus, TaskTemplate,
};

/// Persistence used by the planner.
///
/// Inserts are upserts by id. Range queries return records overlapping the
/// range, meetings and events ordered by start, tasks by due date then
/// priority (highest first).
pub trait Store {
    fn upsert_course(&mut self, course: Course) -> Result<()>;
    fn course(&self, id: Uuid) -> Result<Option<Course>>;
    /// All courses ordered by name.
    fn courses(&self) -> Result<Vec<Course>>;
    /// Removes the course together with its patterns, skips and meetings.
    fn delete_course(&mut self, id: Uuid) -> Result<bool>;

    fn upsert_pattern(&mut self, pattern: MeetingPattern) -> Result<()>;
    fn patterns_for_course(&self, course_id: Uuid) -> Result<Vec<MeetingPattern>>;
    /// Returns `false` if the course already had a skip on that date.
    fn add_skip(&mut self, skip: MeetingSkip) -> Result<bool>;
    fn skips_for_course(&self, course_id: Uuid) -> Result<Vec<MeetingSkip>>;

    fn insert_meeting_instances(&mut self, instances: Vec<MeetingInstance>) -> Result<()>;
    fn meeting_instances_for_course(&self, course_id: Uuid) -> Result<Vec<MeetingInstance>>;
    /// Removes the course's meetings starting at or after `from`, returning them.
    fn delete_future_meeting_instances(&mut self, course_id: Uuid, from: NaiveDateTime) -> Result<Vec<MeetingInstance>>;
    fn delete_meeting_instances_on(&mut self, course_id: Uuid, date: NaiveDate) -> Result<usize>;
    fn meetings_in_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<MeetingInstance>>;

    fn upsert_template(&mut self, template: TaskTemplate) -> Result<()>;
    fn template(&self, id: Uuid) -> Result<Option<TaskTemplate>>;
    fn templates(&self) -> Result<Vec<TaskTemplate>>;
    /// Removes the template; its instances stay as one-off tasks.
    fn delete_template(&mut self, id: Uuid) -> Result<bool>;

    fn insert_task_instances(&mut self, instances: Vec<TaskInstance>) -> Result<()>;
    fn task(&self, id: Uuid) -> Result<Option<TaskInstance>>;
    fn tasks(&self) -> Result<Vec<TaskInstance>>;
    fn task_instances_for_template(&self, template_id: Uuid) -> Result<Vec<TaskInstance>>;
    fn delete_tasks(&mut self, ids: &[Uuid]) -> Result<usize>;
    fn set_task_status(&mut self, id: Uuid, status: TaskStatus) -> Result<bool>;
    fn tasks_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TaskInstance>>;

    fn upsert_event(&mut self, event: SpecialEvent) -> Result<()>;
    fn delete_event(&mut self, id: Uuid) -> Result<bool>;
    fn events_in_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<SpecialEvent>>;

    /// Deletes everything.
    fn clear(&mut self) -> Result<()>;
}

/// In-memory store. Dependent records are kept in collections keyed by
/// their owner's id, so removing an owner is an explicit sweep over them.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Database {
    #[serde(default)]
    courses: BTreeMap<Uuid, Course>,
    /// By course id.
    #[serde(default)]
    patterns: BTreeMap<Uuid, Vec<MeetingPattern>>,
    /// By course id.
    #[serde(default)]
    skips: BTreeMap<Uuid, Vec<MeetingSkip>>,
    /// By course id, then instance id.
    #[serde(default)]
    meetings: BTreeMap<Uuid, BTreeMap<Uuid, MeetingInstance>>,
    #[serde(default)]
    templates: BTreeMap<Uuid, TaskTemplate>,
    #[serde(default)]
    tasks: BTreeMap<Uuid, TaskInstance>,
    #[serde(default)]
    events: BTreeMap<Uuid, SpecialEvent>,
}

/// Finds the single id starting with `prefix`.
fn resolve_in<'a>(ids: impl Iterator<Item = &'a Uuid>, prefix: &str, kind: &'static str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    let mut found = ids.filter(|id| id.to_string().starts_with(&prefix));
    match (found.next(), found.next()) {
        (Some(id), None) => Ok(*id),
        (Some(_), Some(_)) => Err(PlannerError::AmbiguousId { kind, prefix: prefix.clone() }),
        (None, _) => Err(PlannerError::NotFound { kind, id: prefix.clone() }),
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_course(&self, prefix: &str) -> Result<Uuid> {
        resolve_in(self.courses.keys(), prefix, "Course")
    }

    pub fn resolve_template(&self, prefix: &str) -> Result<Uuid> {
        resolve_in(self.templates.keys(), prefix, "Template")
    }

    pub fn resolve_task(&self, prefix: &str) -> Result<Uuid> {
        resolve_in(self.tasks.keys(), prefix, "Task")
    }

    pub fn resolve_event(&self, prefix: &str) -> Result<Uuid> {
        resolve_in(self.events.keys(), prefix, "Event")
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() && self.templates.is_empty() && self.tasks.is_empty() && self.events.is_empty()
    }
}

impl Store for Database {
    fn upsert_course(&mut self, course: Course) -> Result<()> {
        self.courses.insert(course.id, course);
        Ok(())
    }

    fn course(&self, id: Uuid) -> Result<Option<Course>> {
        Ok(self.courses.get(&id).cloned())
    }

    fn courses(&self) -> Result<Vec<Course>> {
        let mut out: Vec<Course> = self.courses.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn delete_course(&mut self, id: Uuid) -> Result<bool> {
        if self.courses.remove(&id).is_none() {
            return Ok(false);
        }
        let patterns = self.patterns.remove(&id).map_or(0, |p| p.len());
        let skips = self.skips.remove(&id).map_or(0, |s| s.len());
        let meetings = self.meetings.remove(&id).map_or(0, |m| m.len());
        debug!(course = %id, patterns, skips, meetings, "cascaded course delete");
        Ok(true)
    }

    fn upsert_pattern(&mut self, pattern: MeetingPattern) -> Result<()> {
        let patterns = self.patterns.entry(pattern.course_id).or_default();
        match patterns.iter_mut().find(|p| p.id == pattern.id) {
            Some(p) => *p = pattern,
            None => patterns.push(pattern),
        }
        Ok(())
    }

    fn patterns_for_course(&self, course_id: Uuid) -> Result<Vec<MeetingPattern>> {
        Ok(self.patterns.get(&course_id).cloned().unwrap_or_default())
    }

    fn add_skip(&mut self, skip: MeetingSkip) -> Result<bool> {
        let skips = self.skips.entry(skip.course_id).or_default();
        if skips.iter().any(|s| s.date == skip.date) {
            return Ok(false);
        }
        skips.push(skip);
        Ok(true)
    }

    fn skips_for_course(&self, course_id: Uuid) -> Result<Vec<MeetingSkip>> {
        Ok(self.skips.get(&course_id).cloned().unwrap_or_default())
    }

    fn insert_meeting_instances(&mut self, instances: Vec<MeetingInstance>) -> Result<()> {
        for m in instances {
            self.meetings.entry(m.course_id).or_default().insert(m.id, m);
        }
        Ok(())
    }

    fn meeting_instances_for_course(&self, course_id: Uuid) -> Result<Vec<MeetingInstance>> {
        let mut out: Vec<MeetingInstance> = self
            .meetings
            .get(&course_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|m| m.start);
        Ok(out)
    }

    fn delete_future_meeting_instances(&mut self, course_id: Uuid, from: NaiveDateTime) -> Result<Vec<MeetingInstance>> {
        let Some(meetings) = self.meetings.get_mut(&course_id) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(meetings).into_iter().partition(|(_, m)| m.start >= from);
        *meetings = kept;
        Ok(removed.into_values().collect())
    }

    fn delete_meeting_instances_on(&mut self, course_id: Uuid, date: NaiveDate) -> Result<usize> {
        let Some(meetings) = self.meetings.get_mut(&course_id) else {
            return Ok(0);
        };
        let before = meetings.len();
        meetings.retain(|_, m| m.date() != date);
        Ok(before - meetings.len())
    }

    fn meetings_in_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<MeetingInstance>> {
        let mut out: Vec<MeetingInstance> = self
            .meetings
            .values()
            .flat_map(|m| m.values())
            .filter(|m| m.start < to && m.end > from)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.start);
        Ok(out)
    }

    fn upsert_template(&mut self, template: TaskTemplate) -> Result<()> {
        self.templates.insert(template.id, template);
        Ok(())
    }

    fn template(&self, id: Uuid) -> Result<Option<TaskTemplate>> {
        Ok(self.templates.get(&id).cloned())
    }

    fn templates(&self) -> Result<Vec<TaskTemplate>> {
        let mut out: Vec<TaskTemplate> = self.templates.values().cloned().collect();
        out.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(out)
    }

    fn delete_template(&mut self, id: Uuid) -> Result<bool> {
        if self.templates.remove(&id).is_none() {
            return Ok(false);
        }
        for t in self.tasks.values_mut() {
            if t.template_id == Some(id) {
                t.template_id = None;
            }
        }
        Ok(true)
    }

    fn insert_task_instances(&mut self, instances: Vec<TaskInstance>) -> Result<()> {
        for t in instances {
            self.tasks.insert(t.id, t);
        }
        Ok(())
    }

    fn task(&self, id: Uuid) -> Result<Option<TaskInstance>> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn tasks(&self) -> Result<Vec<TaskInstance>> {
        Ok(self.tasks.values().cloned().collect())
    }

    fn task_instances_for_template(&self, template_id: Uuid) -> Result<Vec<TaskInstance>> {
        Ok(self
            .tasks
            .values()
            .filter(|t| t.template_id == Some(template_id))
            .cloned()
            .collect())
    }

    fn delete_tasks(&mut self, ids: &[Uuid]) -> Result<usize> {
        Ok(ids.iter().filter(|id| self.tasks.remove(*id).is_some()).count())
    }

    fn set_task_status(&mut self, id: Uuid, status: TaskStatus) -> Result<bool> {
        match self.tasks.get_mut(&id) {
            Some(t) => {
                t.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn tasks_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TaskInstance>> {
        let mut out: Vec<TaskInstance> = self
            .tasks
            .values()
            .filter(|t| !(t.end_date < start || t.start_date > end))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(b.priority.cmp(&a.priority)));
        Ok(out)
    }

    fn upsert_event(&mut self, event: SpecialEvent) -> Result<()> {
        self.events.insert(event.id, event);
        Ok(())
    }

    fn delete_event(&mut self, id: Uuid) -> Result<bool> {
        Ok(self.events.remove(&id).is_some())
    }

    fn events_in_range(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<SpecialEvent>> {
        let mut out: Vec<SpecialEvent> = self
            .events
            .values()
            .filter(|e| e.start < to && e.end > from)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.start);
        Ok(out)
    }

    fn clear(&mut self) -> Result<()> {
        *self = Database::default();
        Ok(())
    }
}

/// Returns the path to the planner database file (`planner.json`).
///
/// The path is determined in the following order:
/// 1. `PLANUST_DB` environment variable.
/// 2. `~/.local/share/planust/planner.json` (on Linux).
/// 3. `./planner.json` (fallback).
pub fn db_path() -> PathBuf {
    std::env::var("PLANUST_DB").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("planust");
        p.push("planner.json");
        p
    })
}

/// Loads the database from the default location.
pub fn load_database() -> Result<Database> {
    load_from(&db_path())
}

/// Saves the database to the default location.
pub fn save_database(db: &Database) -> Result<()> {
    save_to(&db_path(), db)
}

/// Loads a database file. A missing file is an empty database.
pub fn load_from(path: &Path) -> Result<Database> {
    if !path.exists() {
        debug!(path = %path.display(), "no database file yet");
        return Ok(Database::default());
    }
    let mut f = OpenOptions::new().read(true).open(path)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    Ok(serde_json::from_str(&s)?)
}

/// Writes the whole database, overwriting the file.
pub fn save_to(path: &Path, db: &Database) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    let s = serde_json::to_string_pretty(db)?;
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Deletes the database file.
pub fn delete_database() -> Result<()> {
    let path = db_path();
    if path.exists() {
        fs::remove_file(&path)?;
        info!(path = %path.display(), "database deleted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn course(name: &str) -> Course {
        Course {
            id: Uuid::new_v4(),
            name: name.into(),
            color: 0xFF00_0000,
            location: None,
            is_virtual: false,
            start_date: date("2024-01-01"),
            end_date: date("2024-04-30"),
        }
    }

    fn meeting(course_id: Uuid, day: &str) -> MeetingInstance {
        let d = date(day);
        MeetingInstance {
            id: Uuid::new_v4(),
            course_id,
            pattern_id: Uuid::nil(),
            start: d.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            end: d.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            cancelled: false,
            override_title: None,
            override_location: None,
        }
    }

    #[test]
    fn test_delete_course_cascades() {
        let mut db = Database::new();
        let c = course("Math");
        let other = course("Art");
        db.upsert_course(c.clone()).unwrap();
        db.upsert_course(other.clone()).unwrap();
        let mut pattern: MeetingPattern = "mon 09:00-10:00".parse().unwrap();
        pattern.course_id = c.id;
        db.upsert_pattern(pattern).unwrap();
        db.insert_meeting_instances(vec![meeting(c.id, "2024-01-01"), meeting(other.id, "2024-01-01")]).unwrap();

        assert!(db.delete_course(c.id).unwrap());
        assert!(db.patterns_for_course(c.id).unwrap().is_empty());
        assert!(db.meeting_instances_for_course(c.id).unwrap().is_empty());
        assert_eq!(db.meeting_instances_for_course(other.id).unwrap().len(), 1);
        assert!(!db.delete_course(c.id).unwrap());
    }

    #[test]
    fn test_delete_future_meetings_keeps_past() {
        let mut db = Database::new();
        let c = course("Math");
        db.insert_meeting_instances(vec![
            meeting(c.id, "2024-01-01"),
            meeting(c.id, "2024-01-08"),
            meeting(c.id, "2024-01-15"),
        ])
        .unwrap();
        let removed = db
            .delete_future_meeting_instances(c.id, date("2024-01-08").and_hms_opt(0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(removed.len(), 2);
        let left = db.meeting_instances_for_course(c.id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].date(), date("2024-01-01"));
    }

    #[test]
    fn test_skip_dates_are_a_set() {
        let mut db = Database::new();
        let c = course("Math");
        let skip = |reason: &str| MeetingSkip {
            id: Uuid::new_v4(),
            course_id: c.id,
            date: date("2024-02-05"),
            reason: Some(reason.into()),
        };
        assert!(db.add_skip(skip("holiday")).unwrap());
        assert!(!db.add_skip(skip("again")).unwrap());
        assert_eq!(db.skips_for_course(c.id).unwrap().len(), 1);
    }

    #[test]
    fn test_tasks_ordered_by_due_then_priority() {
        let mut db = Database::new();
        let low = TaskInstance::one_off("low".into(), date("2024-01-10"), None, 1);
        let high = TaskInstance::one_off("high".into(), date("2024-01-10"), None, 5);
        let early = TaskInstance::one_off("early".into(), date("2024-01-05"), None, 1);
        let outside = TaskInstance::one_off("outside".into(), date("2024-03-01"), None, 5);
        db.insert_task_instances(vec![low, high, early, outside]).unwrap();

        let titles: Vec<String> = db
            .tasks_in_range(date("2024-01-01"), date("2024-01-31"))
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["early", "high", "low"]);
    }

    #[test]
    fn test_delete_template_detaches_instances() {
        let mut db = Database::new();
        let mut t = TaskInstance::one_off("hw".into(), date("2024-01-10"), None, 1);
        let template_id = Uuid::new_v4();
        t.template_id = Some(template_id);
        db.insert_task_instances(vec![t.clone()]).unwrap();
        db.upsert_template(TaskTemplate {
            id: template_id,
            title: "hw".into(),
            course_id: None,
            priority: 1,
            start_date: date("2024-01-01"),
            end_date: date("2024-02-01"),
            recurrence: crate::models::Recurrence::None,
            due_offset_days: 0,
            reminder_offset_minutes: None,
        })
        .unwrap();

        assert!(db.delete_template(template_id).unwrap());
        assert_eq!(db.task(t.id).unwrap().unwrap().template_id, None);
    }

    #[test]
    fn test_resolve_by_prefix() {
        let mut db = Database::new();
        let c = course("Math");
        db.upsert_course(c.clone()).unwrap();
        let short = &c.id.to_string()[..8];
        assert_eq!(db.resolve_course(short).unwrap(), c.id);
        assert!(matches!(db.resolve_course("zzzz"), Err(PlannerError::NotFound { .. })));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("planner.json");

        let mut db = Database::new();
        let c = course("Math");
        db.upsert_course(c.clone()).unwrap();
        db.insert_meeting_instances(vec![meeting(c.id, "2024-01-01")]).unwrap();
        save_to(&path, &db).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"start_date\": \"2024-01-01\""));
        assert!(raw.contains("\"start\": \"2024-01-01T09:00:00\""));

        let back = load_from(&path).unwrap();
        assert_eq!(back.course(c.id).unwrap(), Some(c.clone()));
        assert_eq!(back.meeting_instances_for_course(c.id).unwrap().len(), 1);

        assert!(load_from(&dir.path().join("missing.json")).unwrap().is_empty());
        fs::write(&path, "not json").unwrap();
        assert!(load_from(&path).is_err());
    }
}
