use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::days::DaySet;
use crate::error::{PlannerError, Result};

/// A course with a date range and weekly meetings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    /// Unique identifier for the course.
    pub id: Uuid,
    /// Display name, e.g. "CS 101".
    pub name: String,
    /// Display color as ARGB.
    pub color: u32,
    /// Default room or building.
    #[serde(default)]
    pub location: Option<String>,
    /// Virtual courses never get meeting instances.
    #[serde(default)]
    pub is_virtual: bool,
    /// First day of the term for this course.
    pub start_date: NaiveDate,
    /// Last day of the term for this course (inclusive).
    pub end_date: NaiveDate,
}

impl Course {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PlannerError::InvalidCourse("name is empty".into()));
        }
        if self.start_date > self.end_date {
            return Err(PlannerError::InvalidCourse(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

/// A weekly meeting slot of a course.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeetingPattern {
    pub id: Uuid,
    pub course_id: Uuid,
    /// Stored as 1 (Monday) ... 7 (Sunday).
    #[serde(with = "weekday_number")]
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl MeetingPattern {
    /// Creates a pattern, rejecting slots that do not end after they start.
    pub fn new(course_id: Uuid, weekday: Weekday, start_time: NaiveTime, end_time: NaiveTime) -> Result<Self> {
        let pattern = MeetingPattern {
            id: Uuid::new_v4(),
            course_id,
            weekday,
            start_time,
            end_time,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_time >= self.end_time {
            return Err(PlannerError::InvalidPattern(format!(
                "{} {}-{} does not end after it starts",
                self.weekday, self.start_time, self.end_time
            )));
        }
        Ok(())
    }
}

/// Parses `MON 10:30-11:45`.
impl FromStr for MeetingPattern {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || PlannerError::Parse(format!("Invalid meeting '{}'. Use e.g. 'MON 10:30-11:45'.", s));
        let (day, times) = s.trim().split_once(char::is_whitespace).ok_or_else(bad)?;
        let (start, end) = times.trim().split_once('-').ok_or_else(bad)?;
        let weekday = day.parse::<Weekday>().map_err(|_| bad())?;
        let start_time = parse_time(start.trim())?;
        let end_time = parse_time(end.trim())?;
        // Owner is assigned when the pattern is attached to a course.
        MeetingPattern::new(Uuid::nil(), weekday, start_time, end_time)
    }
}

/// A holiday or cancellation: no meetings of the course on `date`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeetingSkip {
    pub id: Uuid,
    pub course_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One generated, dated class meeting.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeetingInstance {
    pub id: Uuid,
    pub course_id: Uuid,
    /// The weekly pattern that produced this instance.
    pub pattern_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub override_title: Option<String>,
    #[serde(default)]
    pub override_location: Option<String>,
}

impl MeetingInstance {
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// Task progress.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    /// TODO -> DOING -> DONE -> TODO
    pub fn next(self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::Doing,
            TaskStatus::Doing => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Todo => "Todo",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TaskStatus {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            _ => Err(PlannerError::Parse(format!(
                "Unknown status '{}'. Supported: todo, doing, done.",
                s
            ))),
        }
    }
}

/// The user-facing frequency names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl FromStr for Frequency {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "once" => Ok(Frequency::None),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(PlannerError::Parse(format!(
                "Unknown recurrence '{}'. Supported: none, daily, weekly, biweekly, monthly.",
                s
            ))),
        }
    }
}

/// Week step of a biweekly rule.
pub const BIWEEKLY_WEEKS: NonZeroU32 = match NonZeroU32::new(2) {
    Some(n) => n,
    None => panic!("2 is non-zero"),
};

/// Largest due offset a template may have, in either direction.
pub const MAX_DUE_OFFSET_DAYS: i64 = 3660;

/// Largest reminder offset, in minutes before the end of the due day.
pub const MAX_REMINDER_OFFSET_MINUTES: i64 = 366 * 24 * 60;

/// How a task template repeats.
///
/// Biweekly is `Weekly` with `every_weeks == 2`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "freq", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    /// A single anchor on the template's start date.
    None,
    Daily { interval: NonZeroU32 },
    Weekly { every_weeks: NonZeroU32, days: DaySet },
    /// Same day of month as the template's start date, clamped to short months.
    Monthly { interval: NonZeroU32 },
}

impl Recurrence {
    /// Builds the rule from a frequency, an interval and a weekday set.
    ///
    /// The interval is ignored for `None` and `Biweekly`.
    pub fn from_parts(freq: Frequency, interval: u32, days: DaySet) -> Result<Self> {
        let every = || {
            NonZeroU32::new(interval)
                .ok_or_else(|| PlannerError::InvalidTemplate("interval must be at least 1".into()))
        };
        let rule = match freq {
            Frequency::None => Recurrence::None,
            Frequency::Daily => Recurrence::Daily { interval: every()? },
            Frequency::Weekly => Recurrence::Weekly { every_weeks: every()?, days },
            Frequency::Biweekly => Recurrence::Weekly {
                every_weeks: BIWEEKLY_WEEKS,
                days,
            },
            Frequency::Monthly => Recurrence::Monthly { interval: every()? },
        };
        Ok(rule)
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Recurrence::None => Frequency::None,
            Recurrence::Daily { .. } => Frequency::Daily,
            Recurrence::Weekly { every_weeks, .. } if *every_weeks == BIWEEKLY_WEEKS => Frequency::Biweekly,
            Recurrence::Weekly { .. } => Frequency::Weekly,
            Recurrence::Monthly { .. } => Frequency::Monthly,
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::None => write!(f, "once"),
            Recurrence::Daily { interval } if interval.get() == 1 => write!(f, "daily"),
            Recurrence::Daily { interval } => write!(f, "every {} days", interval),
            Recurrence::Weekly { every_weeks, days } if every_weeks.get() == 1 => {
                write!(f, "weekly on {}", days)
            }
            Recurrence::Weekly { every_weeks, days } => {
                write!(f, "every {} weeks on {}", every_weeks, days)
            }
            Recurrence::Monthly { interval } if interval.get() == 1 => write!(f, "monthly"),
            Recurrence::Monthly { interval } => write!(f, "every {} months", interval),
        }
    }
}

/// A repeating assignment, e.g. weekly homework.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub title: String,
    /// `None` for general tasks.
    #[serde(default)]
    pub course_id: Option<Uuid>,
    /// 1 (lowest) to 5 (highest).
    pub priority: u8,
    /// Anchors are only generated within [start_date, end_date].
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub recurrence: Recurrence,
    /// due = anchor + due_offset_days
    pub due_offset_days: i64,
    /// Minutes before the end of the due day.
    #[serde(default)]
    pub reminder_offset_minutes: Option<i64>,
}

impl TaskTemplate {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(PlannerError::InvalidTemplate("title is empty".into()));
        }
        if !(1..=5).contains(&self.priority) {
            return Err(PlannerError::InvalidTemplate(format!(
                "priority {} is outside 1-5",
                self.priority
            )));
        }
        if self.start_date > self.end_date {
            return Err(PlannerError::InvalidTemplate(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if !(-MAX_DUE_OFFSET_DAYS..=MAX_DUE_OFFSET_DAYS).contains(&self.due_offset_days) {
            return Err(PlannerError::InvalidTemplate(format!(
                "due offset of {} days is outside +/-{}",
                self.due_offset_days, MAX_DUE_OFFSET_DAYS
            )));
        }
        if let Some(m) = self.reminder_offset_minutes {
            if !(-MAX_REMINDER_OFFSET_MINUTES..=MAX_REMINDER_OFFSET_MINUTES).contains(&m) {
                return Err(PlannerError::InvalidTemplate(format!(
                    "reminder offset of {} minutes is outside +/-{}",
                    m, MAX_REMINDER_OFFSET_MINUTES
                )));
            }
        }
        Ok(())
    }
}

/// A concrete task, generated from a template or created directly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskInstance {
    pub id: Uuid,
    /// `None` for one-off tasks.
    #[serde(default)]
    pub template_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub course_id: Option<Uuid>,
    pub priority: u8,
    /// Anchor date for generated tasks.
    pub start_date: NaiveDate,
    /// Inclusive end of the task bar.
    pub end_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: TaskStatus,
    /// Overrides the course color when set.
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub reminder_at: Option<NaiveDateTime>,
}

impl TaskInstance {
    /// A task not tied to any template, spanning only its due date.
    pub fn one_off(title: String, due_date: NaiveDate, course_id: Option<Uuid>, priority: u8) -> Self {
        TaskInstance {
            id: Uuid::new_v4(),
            template_id: None,
            title,
            course_id,
            priority,
            start_date: due_date,
            end_date: due_date,
            due_date,
            status: TaskStatus::Todo,
            color: None,
            reminder_at: None,
        }
    }
}

/// Quizzes, exams and other one-time events.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpecialEvent {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub course_id: Option<Uuid>,
    pub color: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| PlannerError::Parse(format!("Invalid time '{}': {}. Use HH:MM.", s, e)))
}

/// Parses `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| PlannerError::Parse(format!("Invalid date '{}': {}. Use YYYY-MM-DD.", s, e)))
}

/// Parses `YYYY-MM-DD HH:MM` or `YYYY-MM-DDTHH:MM`.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|e| {
            PlannerError::Parse(format!("Invalid date-time '{}': {}. Use 'YYYY-MM-DD HH:MM'.", s, e))
        })
}

/// Parses `#RRGGBB` (or `#AARRGGBB`) into ARGB. Alpha defaults to opaque.
pub fn parse_color(s: &str) -> Result<u32> {
    let hex = s.trim().trim_start_matches('#');
    let value = u32::from_str_radix(hex, 16)
        .map_err(|_| PlannerError::Parse(format!("Invalid color '{}'. Use #RRGGBB.", s)))?;
    match hex.len() {
        6 => Ok(0xFF00_0000 | value),
        8 => Ok(value),
        _ => Err(PlannerError::Parse(format!("Invalid color '{}'. Use #RRGGBB.", s))),
    }
}

/// Formats ARGB as `#RRGGBB`.
pub fn format_color(argb: u32) -> String {
    format!("#{:06X}", argb & 0x00FF_FFFF)
}

/// Serializes a weekday as 1 (Monday) ... 7 (Sunday).
mod weekday_number {
    use chrono::Weekday;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::days::WEEK;

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(day.number_from_monday())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let n = u32::deserialize(deserializer)?;
        match n {
            1..=7 => Ok(WEEK[(n - 1) as usize]),
            _ => Err(D::Error::custom(format!("weekday {} is outside 1-7", n))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_parse() {
        let p: MeetingPattern = "MON 10:30-11:45".parse().unwrap();
        assert_eq!(p.weekday, Weekday::Mon);
        assert_eq!(p.start_time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(p.end_time, NaiveTime::from_hms_opt(11, 45, 0).unwrap());
    }

    #[test]
    fn test_pattern_rejects_inverted_times() {
        assert!(matches!(
            "tue 12:00-11:00".parse::<MeetingPattern>(),
            Err(PlannerError::InvalidPattern(_))
        ));
        assert!("tue 12:00-12:00".parse::<MeetingPattern>().is_err());
        assert!("tue".parse::<MeetingPattern>().is_err());
    }

    #[test]
    fn test_pattern_weekday_serialized_as_number() {
        let p: MeetingPattern = "sun 09:00-10:00".parse().unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["weekday"], 7);
        let back: MeetingPattern = serde_json::from_value(json).unwrap();
        assert_eq!(back.weekday, Weekday::Sun);
    }

    #[test]
    fn test_template_offsets_are_bounded() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut t = TaskTemplate {
            id: Uuid::new_v4(),
            title: "Essay".into(),
            course_id: None,
            priority: 3,
            start_date: start,
            end_date: start,
            recurrence: Recurrence::None,
            due_offset_days: -MAX_DUE_OFFSET_DAYS,
            reminder_offset_minutes: Some(MAX_REMINDER_OFFSET_MINUTES),
        };
        assert!(t.validate().is_ok());

        t.due_offset_days = 1_000_000_000;
        assert!(matches!(t.validate(), Err(PlannerError::InvalidTemplate(_))));
        t.due_offset_days = i64::MIN;
        assert!(matches!(t.validate(), Err(PlannerError::InvalidTemplate(_))));

        t.due_offset_days = 0;
        t.reminder_offset_minutes = Some(i64::MAX);
        assert!(matches!(t.validate(), Err(PlannerError::InvalidTemplate(_))));
    }

    #[test]
    fn test_recurrence_from_parts() {
        let days: DaySet = "mon".parse().unwrap();
        let biweekly = Recurrence::from_parts(Frequency::Biweekly, 5, days).unwrap();
        assert_eq!(biweekly.frequency(), Frequency::Biweekly);
        match biweekly {
            Recurrence::Weekly { every_weeks, .. } => assert_eq!(every_weeks.get(), 2),
            other => panic!("unexpected rule {:?}", other),
        }
        assert!(Recurrence::from_parts(Frequency::Daily, 0, DaySet::EMPTY).is_err());
        assert_eq!(
            Recurrence::from_parts(Frequency::None, 0, DaySet::EMPTY).unwrap(),
            Recurrence::None
        );
    }

    #[test]
    fn test_recurrence_persisted_with_freq_tag() {
        let rule = Recurrence::from_parts(Frequency::Weekly, 1, "mon,wed".parse().unwrap()).unwrap();
        let json = serde_json::to_value(rule).unwrap();
        assert_eq!(json["freq"], "WEEKLY");
        assert_eq!(json["days"], 0b101);
        assert_eq!(serde_json::to_value(Recurrence::None).unwrap()["freq"], "NONE");
    }

    #[test]
    fn test_colors() {
        assert_eq!(parse_color("#4F81BD").unwrap(), 0xFF4F_81BD);
        assert_eq!(format_color(0xFF4F_81BD), "#4F81BD");
        assert!(parse_color("blue").is_err());
    }

    #[test]
    fn test_status_cycle() {
        assert_eq!(TaskStatus::Todo.next(), TaskStatus::Doing);
        assert_eq!(TaskStatus::Done.next(), TaskStatus::Todo);
        assert_eq!("DONE".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
    }
}
