use chrono::NaiveDate;

use crate::models::{TaskInstance, TaskStatus};

/// Calculates the urgency score for a task as of `today`.
///
/// The score is based on:
/// - **Due Date**: Closer deadlines yield higher scores. Overdue tasks get a significant boost.
/// - **Priority**: Higher priority (1-5) increases urgency.
///
/// # Returns
/// - `-1.0` if the task is done.
/// - A positive float representing urgency (higher is more urgent).
pub fn compute_urgency(task: &TaskInstance, today: NaiveDate) -> f64 {
    if task.status == TaskStatus::Done {
        return -1.0;
    }
    let days_left = (task.due_date - today).num_days();
    let priority = f64::from(task.priority);
    let base = if days_left <= 0 {
        // overdue or due today -> high urgency
        100.0 + priority * 2.0 + (days_left.abs() as f64 * 2.0)
    } else {
        // closer due date -> higher urgency; higher priority increases urgency
        (1.0 / (days_left as f64)) * 10.0 * (1.0 + priority / 5.0)
    };
    // started tasks float a little above untouched ones
    let base = if task.status == TaskStatus::Doing { base * 1.1 } else { base };
    if base.is_finite() { base } else { 0.0 }
}

/// Which to-do section a task belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Overdue,
    Today,
    Upcoming,
}

impl Section {
    pub fn of(task: &TaskInstance, today: NaiveDate) -> Section {
        if task.due_date < today {
            Section::Overdue
        } else if task.due_date == today {
            Section::Today
        } else {
            Section::Upcoming
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::Overdue => "Overdue",
            Section::Today => "Today",
            Section::Upcoming => "Upcoming",
        }
    }
}

/// Orders tasks by section, then by urgency (highest first).
pub fn sort_tasks(tasks: &mut [TaskInstance], today: NaiveDate) {
    tasks.sort_by(|a, b| {
        Section::of(a, today)
            .cmp(&Section::of(b, today))
            .then(compute_urgency(b, today).total_cmp(&compute_urgency(a, today)))
    });
}
