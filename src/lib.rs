//! # Planust
//!
//! A terminal academic planner: courses with weekly class meetings,
//! recurring and one-off tasks, and special events such as exams.
//!
//! Recurring things are stored as compact rules and expanded into dated
//! instances for a bounded window:
//!
//! - [`meeting`] turns a course's weekly meeting patterns (minus skipped
//!   dates) into meeting instances.
//! - [`recurrence`] turns a task template's rule (none, daily, weekly,
//!   biweekly, monthly) into anchor dates and task instances.
//! - [`planner`] decides what to regenerate and merges the result with what
//!   is already stored, without duplicating anchors or overwriting edits.
//!
//! Data lives in a single JSON file (see [`storage`]); generation limits are
//! read from a TOML config file (see [`config`]).

pub mod agenda;
pub mod commands;
pub mod config;
pub mod days;
pub mod error;
pub mod meeting;
pub mod models;
pub mod planner;
pub mod recurrence;
pub mod storage;
pub mod tui;
pub mod urgency;

pub use config::Config;
pub use days::DaySet;
pub use error::{PlannerError, Result};
pub use models::{
    Course, Frequency, MeetingInstance, MeetingPattern, MeetingSkip, Recurrence, SpecialEvent, TaskInstance,
    TaskStatus, TaskTemplate,
};
pub use planner::{GenerationSettings, NewCourse, Planner};
pub use storage::{Database, Store};
