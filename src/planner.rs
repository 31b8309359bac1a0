//! Keeps generated instances in step with the rules that produce them.
//!
//! Meetings and tasks are regenerated differently. Meeting instances are
//! replaced wholesale from a cutover date. Task instances are merged by
//! anchor date: anchors that already have an instance are never touched, so
//! status changes made by the user survive any number of re-runs.
//!
//! Every method takes the store by exclusive borrow, so two regenerations
//! cannot interleave on the same store.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::error::{PlannerError, Result};
use crate::meeting;
use crate::models::{
    Course, MeetingInstance, MeetingPattern, MeetingSkip, SpecialEvent, TaskInstance, TaskStatus, TaskTemplate,
};
use crate::recurrence;
use crate::storage::Store;

/// Limits applied to every generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// More instances than this in one call fails with `WindowTooLarge`.
    pub max_instances: usize,
    /// Carry `cancelled` and overrides across meeting regeneration,
    /// matched by (pattern, date).
    pub preserve_meeting_overrides: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationSettings {
    fn from(cfg: &GenerationConfig) -> Self {
        GenerationSettings {
            max_instances: cfg.max_instances_per_call,
            preserve_meeting_overrides: cfg.preserve_meeting_overrides,
        }
    }
}

/// Everything needed to create a course in one go.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub color: u32,
    pub location: Option<String>,
    pub is_virtual: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Owner ids are overwritten with the new course's id.
    pub patterns: Vec<MeetingPattern>,
    pub skips: Vec<(NaiveDate, Option<String>)>,
}

/// Collects at most `limit` items, failing if there would be more.
fn bounded<T>(items: impl Iterator<Item = T>, limit: usize) -> Result<Vec<T>> {
    let out: Vec<T> = items.take(limit.saturating_add(1)).collect();
    if out.len() > limit {
        return Err(PlannerError::WindowTooLarge { limit });
    }
    Ok(out)
}

/// `min(base + ahead, template.end_date)`
fn generation_end(template: &TaskTemplate, base: NaiveDate, ahead: Duration) -> NaiveDate {
    base.checked_add_signed(ahead)
        .map_or(template.end_date, |d| d.min(template.end_date))
}

fn validate_task(task: &TaskInstance) -> Result<()> {
    if task.title.trim().is_empty() {
        return Err(PlannerError::InvalidTemplate("title is empty".into()));
    }
    if !(1..=5).contains(&task.priority) {
        return Err(PlannerError::InvalidTemplate(format!("priority {} is outside 1-5", task.priority)));
    }
    Ok(())
}

pub struct Planner<'a, S: Store> {
    store: &'a mut S,
    settings: GenerationSettings,
}

impl<'a, S: Store> Planner<'a, S> {
    pub fn new(store: &'a mut S, settings: GenerationSettings) -> Self {
        Planner { store, settings }
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    // ---- Courses and meetings ----

    /// Creates a course with its patterns and skips.
    ///
    /// Non-virtual courses with at least one pattern get their meetings
    /// generated over the course's whole date range.
    pub fn create_course(&mut self, new: NewCourse) -> Result<Uuid> {
        let course = Course {
            id: Uuid::new_v4(),
            name: new.name,
            color: new.color,
            location: new.location,
            is_virtual: new.is_virtual,
            start_date: new.start_date,
            end_date: new.end_date,
        };
        course.validate()?;

        let patterns: Vec<MeetingPattern> = new
            .patterns
            .into_iter()
            .map(|mut p| {
                p.course_id = course.id;
                p
            })
            .collect();
        for p in &patterns {
            p.validate()?;
        }

        let skip_dates: BTreeSet<NaiveDate> = new.skips.iter().map(|(d, _)| *d).collect();
        let instances = if course.is_virtual || patterns.is_empty() {
            Vec::new()
        } else {
            bounded(
                meeting::occurrences(&course, &patterns, &skip_dates, course.start_date, course.end_date),
                self.settings.max_instances,
            )?
        };

        let id = course.id;
        let has_patterns = !patterns.is_empty();
        self.store.upsert_course(course)?;
        for p in patterns {
            self.store.upsert_pattern(p)?;
        }
        for (date, reason) in new.skips {
            self.store.add_skip(MeetingSkip {
                id: Uuid::new_v4(),
                course_id: id,
                date,
                reason,
            })?;
        }
        let count = instances.len();
        self.store.insert_meeting_instances(instances)?;

        if has_patterns && count == 0 {
            debug!(course = %id, "course created without generating meetings");
        }
        info!(course = %id, meetings = count, "course created");
        Ok(id)
    }

    fn require_course(&self, course_id: Uuid) -> Result<Course> {
        self.store
            .course(course_id)?
            .ok_or_else(|| PlannerError::not_found("Course", course_id))
    }

    /// Replaces the course's meetings from `from` onward with a fresh
    /// expansion of `[from, to]`. Returns the number of meetings inserted.
    ///
    /// Everything at or after `from` 00:00 is deleted first, including
    /// meetings past `to`. An inverted window changes nothing.
    pub fn regenerate_meeting_instances(&mut self, course_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<usize> {
        let course = self.require_course(course_id)?;
        if from > to {
            debug!(course = %course_id, %from, %to, "inverted window, nothing to regenerate");
            return Ok(0);
        }
        let patterns = self.store.patterns_for_course(course_id)?;
        let skips: BTreeSet<NaiveDate> = self
            .store
            .skips_for_course(course_id)?
            .into_iter()
            .map(|s| s.date)
            .collect();

        // Expand before deleting so an oversized window leaves the store untouched.
        let mut fresh = bounded(
            meeting::occurrences(&course, &patterns, &skips, from, to),
            self.settings.max_instances,
        )?;

        let removed = self
            .store
            .delete_future_meeting_instances(course_id, from.and_time(NaiveTime::MIN))?;

        if self.settings.preserve_meeting_overrides {
            carry_overrides(&removed, &mut fresh);
        } else if removed.iter().any(|m| m.cancelled || m.override_title.is_some() || m.override_location.is_some()) {
            warn!(course = %course_id, "regeneration dropped cancelled or overridden meetings");
        }

        let count = fresh.len();
        self.store.insert_meeting_instances(fresh)?;
        info!(course = %course_id, removed = removed.len(), inserted = count, "meetings regenerated");
        Ok(count)
    }

    /// Adds a weekly slot and regenerates the course's meetings from `from`.
    pub fn add_pattern(&mut self, course_id: Uuid, mut pattern: MeetingPattern, from: NaiveDate) -> Result<usize> {
        let course = self.require_course(course_id)?;
        pattern.course_id = course_id;
        pattern.validate()?;
        self.store.upsert_pattern(pattern)?;
        self.regenerate_meeting_instances(course_id, from.max(course.start_date), course.end_date)
    }

    /// Records a skip and drops any meetings of the course on that date.
    ///
    /// Returns `false` if the date was already skipped.
    pub fn add_skip(&mut self, course_id: Uuid, date: NaiveDate, reason: Option<String>) -> Result<bool> {
        self.require_course(course_id)?;
        let added = self.store.add_skip(MeetingSkip {
            id: Uuid::new_v4(),
            course_id,
            date,
            reason,
        })?;
        if added {
            let removed = self.store.delete_meeting_instances_on(course_id, date)?;
            info!(course = %course_id, %date, removed, "meeting skip added");
        }
        Ok(added)
    }

    /// Deletes the course and everything that belongs to it.
    pub fn delete_course(&mut self, course_id: Uuid) -> Result<()> {
        if !self.store.delete_course(course_id)? {
            return Err(PlannerError::not_found("Course", course_id));
        }
        info!(course = %course_id, "course deleted");
        Ok(())
    }

    // ---- Task templates ----

    /// Stores the template and generates its instances over
    /// `[start_date, min(start_date + ahead, end_date)]`.
    pub fn create_template_and_generate(&mut self, template: TaskTemplate, ahead: Duration) -> Result<usize> {
        template.validate()?;
        // An oversized window fails here, before anything is stored.
        let inserted = self.regenerate_from_template(&template, ahead)?;
        self.store.upsert_template(template.clone())?;
        info!(template = %template.id, inserted, rule = %template.recurrence, "template created");
        Ok(inserted)
    }

    /// Inserts instances for anchors in the generation window that do not
    /// have one yet. Existing instances are left exactly as they are.
    pub fn regenerate_from_template(&mut self, template: &TaskTemplate, ahead: Duration) -> Result<usize> {
        let end = generation_end(template, template.start_date, ahead);
        let pending = self.pending_anchors(template, end, template.start_date)?;
        self.insert_missing(template, pending)
    }

    /// Moves every template's generation horizon to `today + ahead`.
    ///
    /// Anchors before `today` are not filled in, so past instances the user
    /// deleted stay deleted.
    pub fn roll_forward(&mut self, today: NaiveDate, ahead: Duration) -> Result<usize> {
        // Every template is bounded before the first insert.
        let mut plan = Vec::new();
        for template in self.store.templates()? {
            let end = generation_end(&template, template.start_date.max(today), ahead);
            let pending = self.pending_anchors(&template, end, today)?;
            plan.push((template, pending));
        }
        let mut total = 0;
        for (template, pending) in plan {
            total += self.insert_missing(&template, pending)?;
        }
        info!(%today, inserted = total, "generation window advanced");
        Ok(total)
    }

    /// Applies a changed rule from `cutover` onward.
    ///
    /// Untouched (TODO) instances anchored at or after the cutover are
    /// replaced by the new rule's anchors. Earlier instances, and later ones
    /// the user already started or finished, are kept.
    pub fn update_template(&mut self, template: TaskTemplate, cutover: NaiveDate, ahead: Duration) -> Result<usize> {
        template.validate()?;
        if self.store.template(template.id)?.is_none() {
            return Err(PlannerError::not_found("Template", template.id));
        }
        let end = generation_end(&template, template.start_date.max(cutover), ahead);
        let pending = self.pending_anchors(&template, end, cutover)?;

        self.store.upsert_template(template.clone())?;

        let stale: Vec<Uuid> = self
            .store
            .task_instances_for_template(template.id)?
            .into_iter()
            .filter(|t| t.start_date >= cutover && t.status == TaskStatus::Todo)
            .map(|t| t.id)
            .collect();
        let removed = self.store.delete_tasks(&stale)?;
        let inserted = self.insert_missing(&template, pending)?;
        info!(template = %template.id, %cutover, removed, inserted, "template rule updated");
        Ok(inserted)
    }

    /// Removes the template. Its instances are kept as one-off tasks.
    pub fn delete_template(&mut self, template_id: Uuid) -> Result<()> {
        if !self.store.delete_template(template_id)? {
            return Err(PlannerError::not_found("Template", template_id));
        }
        info!(template = %template_id, "template deleted");
        Ok(())
    }

    /// Anchors in `[not_before, to]`, bounded by `max_instances`.
    ///
    /// Expansion always starts at the template's start date so weekly steps
    /// keep their phase. Only anchors on or after `not_before` count toward
    /// the bound.
    fn pending_anchors(&self, template: &TaskTemplate, to: NaiveDate, not_before: NaiveDate) -> Result<Vec<NaiveDate>> {
        bounded(
            recurrence::anchors(template, template.start_date, to).filter(|a| *a >= not_before),
            self.settings.max_instances,
        )
    }

    /// Inserts an instance for each anchor that has none yet.
    fn insert_missing(&mut self, template: &TaskTemplate, anchors: Vec<NaiveDate>) -> Result<usize> {
        let existing: HashSet<NaiveDate> = self
            .store
            .task_instances_for_template(template.id)?
            .into_iter()
            .map(|t| t.start_date)
            .collect();

        let new_instances: Vec<TaskInstance> = anchors
            .into_iter()
            .filter(|a| !existing.contains(a))
            .map(|a| recurrence::instance_for_anchor(template, a))
            .collect();

        let count = new_instances.len();
        debug!(template = %template.id, existing = existing.len(), inserted = count, "anchors merged");
        if count > 0 {
            self.store.insert_task_instances(new_instances)?;
        }
        Ok(count)
    }

    // ---- One-off tasks and events ----

    pub fn create_one_off_task(&mut self, task: TaskInstance) -> Result<Uuid> {
        validate_task(&task)?;
        let id = task.id;
        self.store.insert_task_instances(vec![task])?;
        info!(task = %id, "task created");
        Ok(id)
    }

    pub fn set_task_status(&mut self, task_id: Uuid, status: TaskStatus) -> Result<()> {
        if !self.store.set_task_status(task_id, status)? {
            return Err(PlannerError::not_found("Task", task_id));
        }
        debug!(task = %task_id, %status, "task status changed");
        Ok(())
    }

    pub fn delete_task(&mut self, task_id: Uuid) -> Result<()> {
        if self.store.delete_tasks(&[task_id])? == 0 {
            return Err(PlannerError::not_found("Task", task_id));
        }
        Ok(())
    }

    pub fn create_event(&mut self, event: SpecialEvent) -> Result<Uuid> {
        if event.title.trim().is_empty() {
            return Err(PlannerError::Parse("event title is empty".into()));
        }
        if event.start >= event.end {
            return Err(PlannerError::Parse(format!(
                "event ends ({}) before it starts ({})",
                event.end, event.start
            )));
        }
        let id = event.id;
        self.store.upsert_event(event)?;
        Ok(id)
    }

    pub fn delete_event(&mut self, event_id: Uuid) -> Result<()> {
        if !self.store.delete_event(event_id)? {
            return Err(PlannerError::not_found("Event", event_id));
        }
        Ok(())
    }
}

/// Copies cancellation and overrides onto the new meeting with the same
/// (pattern, date).
fn carry_overrides(removed: &[MeetingInstance], fresh: &mut [MeetingInstance]) {
    let old: HashMap<(Uuid, NaiveDate), &MeetingInstance> =
        removed.iter().map(|m| ((m.pattern_id, m.date()), m)).collect();
    for m in fresh.iter_mut() {
        if let Some(prev) = old.get(&(m.pattern_id, m.date())) {
            m.cancelled = prev.cancelled;
            m.override_title = prev.override_title.clone();
            m.override_location = prev.override_location.clone();
        }
    }
}
