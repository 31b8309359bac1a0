use std::io::{self, Write};

use chrono::{Local, NaiveDate};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use tracing::warn;
use uuid::Uuid;

use crate::agenda::{agenda, AgendaKind};
use crate::config::{config_path, Config};
use crate::days::DaySet;
use crate::error::{PlannerError, Result};
use crate::models::{
    format_color, parse_color, parse_date, parse_datetime, Frequency, MeetingPattern, Recurrence, SpecialEvent,
    TaskInstance, TaskStatus, TaskTemplate,
};
use crate::planner::{GenerationSettings, NewCourse, Planner};
use crate::storage::{delete_database, load_database, save_database, Database, Store};
use crate::urgency::{compute_urgency, sort_tasks, Section};

/// Arguments for `course add`.
#[derive(Debug, Clone, Default)]
pub struct CourseArgs {
    pub name: String,
    pub start: String,
    pub end: String,
    pub color: Option<String>,
    pub location: Option<String>,
    pub is_virtual: bool,
    /// e.g. `MON 10:30-11:45`
    pub meetings: Vec<String>,
    /// `YYYY-MM-DD` dates with no class.
    pub skips: Vec<String>,
}

/// Arguments for `template add`.
#[derive(Debug, Clone)]
pub struct TemplateArgs {
    pub title: String,
    pub start: String,
    pub end: String,
    pub freq: String,
    pub interval: u32,
    pub days: Option<String>,
    pub due_offset: i64,
    pub priority: u8,
    pub course: Option<String>,
    pub reminder_minutes: Option<i64>,
}

/// Changes for `template edit`; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TemplateEdit {
    pub title: Option<String>,
    pub end: Option<String>,
    pub freq: Option<String>,
    pub interval: Option<u32>,
    pub days: Option<String>,
    pub due_offset: Option<i64>,
    pub priority: Option<u8>,
    /// Defaults to today.
    pub from: Option<String>,
}

/// Arguments for `event add`.
#[derive(Debug, Clone, Default)]
pub struct EventArgs {
    pub title: String,
    pub start: String,
    pub end: String,
    pub course: Option<String>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!("ignoring unreadable config at {}: {}", config_path().display(), e);
        Config::default()
    })
}

/// Loads the database and config, runs `f`, and saves if `f` succeeded.
fn with_db<F>(f: F) -> Result<String>
where
    F: FnOnce(&mut Database, &Config) -> Result<String>,
{
    let cfg = load_config();
    let mut db = load_database()?;
    let msg = f(&mut db, &cfg)?;
    save_database(&db)?;
    Ok(msg)
}

fn report(result: Result<String>, silent: bool) {
    match result {
        Ok(msg) => {
            if !silent { println!("{}", msg); }
        }
        Err(e) => {
            if !silent { eprintln!("{}", e); }
        }
    }
}

fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn table_color(argb: u32) -> Color {
    Color::Rgb {
        r: ((argb >> 16) & 0xFF) as u8,
        g: ((argb >> 8) & 0xFF) as u8,
        b: (argb & 0xFF) as u8,
    }
}

fn default_color(cfg: &Config) -> u32 {
    parse_color(&cfg.display.default_course_color).unwrap_or(0xFF4F_81BD)
}

fn resolve_course_opt(db: &Database, prefix: &Option<String>) -> Result<Option<Uuid>> {
    prefix.as_deref().map(|p| db.resolve_course(p)).transpose()
}

fn parse_days(days: &Option<String>) -> Result<DaySet> {
    days.as_deref().map_or(Ok(DaySet::EMPTY), str::parse)
}

fn days_left_label(days_left: i64) -> String {
    if days_left < 0 {
        format!("{}d overdue", days_left.abs())
    } else if days_left == 0 {
        "Today".to_string()
    } else {
        format!("{}d", days_left)
    }
}

// ---- Courses ----

/// Creates a course and, unless it is virtual, generates its meetings.
pub fn cmd_course_add(args: CourseArgs, silent: bool) {
    report(
        with_db(|db, cfg| {
            let patterns = args
                .meetings
                .iter()
                .map(|m| m.parse::<MeetingPattern>())
                .collect::<Result<Vec<_>>>()?;
            let skips = args
                .skips
                .iter()
                .map(|d| parse_date(d).map(|d| (d, None)))
                .collect::<Result<Vec<_>>>()?;
            let color = match &args.color {
                Some(c) => parse_color(c)?,
                None => default_color(cfg),
            };
            let new = NewCourse {
                name: args.name.clone(),
                color,
                location: args.location.clone(),
                is_virtual: args.is_virtual,
                start_date: parse_date(&args.start)?,
                end_date: parse_date(&args.end)?,
                patterns,
                skips,
            };
            let mut planner = Planner::new(db, GenerationSettings::from(&cfg.generation));
            let id = planner.create_course(new)?;
            let meetings = planner.store().meeting_instances_for_course(id)?.len();
            Ok(format!("Course added (id = {}, {} meetings generated)", short(id), meetings))
        }),
        silent,
    );
}

/// Lists courses with their weekly meetings.
pub fn cmd_course_list() {
    let db = match load_database() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load database: {}", e);
            return;
        }
    };
    let courses = db.courses().unwrap_or_default();
    if courses.is_empty() {
        println!("No courses found.");
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Color").add_attribute(Attribute::Bold),
            Cell::new("Dates").add_attribute(Attribute::Bold),
            Cell::new("Meetings").add_attribute(Attribute::Bold),
            Cell::new("Location").add_attribute(Attribute::Bold),
            Cell::new("Skips").add_attribute(Attribute::Bold),
            Cell::new("Generated").add_attribute(Attribute::Bold),
        ]);
    for c in courses {
        let patterns = db.patterns_for_course(c.id).unwrap_or_default();
        let meetings = if c.is_virtual {
            "virtual".to_string()
        } else {
            patterns
                .iter()
                .map(|p| format!("{} {}-{}", p.weekday, p.start_time.format("%H:%M"), p.end_time.format("%H:%M")))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let skips = db.skips_for_course(c.id).unwrap_or_default().len();
        let generated = db.meeting_instances_for_course(c.id).unwrap_or_default().len();
        table.add_row(vec![
            Cell::new(short(c.id)),
            Cell::new(&c.name).fg(table_color(c.color)),
            Cell::new(format_color(c.color)),
            Cell::new(format!("{} .. {}", c.start_date, c.end_date)),
            Cell::new(meetings),
            Cell::new(c.location.clone().unwrap_or_default()),
            Cell::new(skips),
            Cell::new(generated),
        ]);
    }
    println!("{table}");
}

/// Removes a course with its patterns, skips and meetings.
pub fn cmd_course_remove(id: String, silent: bool) {
    report(
        with_db(|db, cfg| {
            let course_id = db.resolve_course(&id)?;
            Planner::new(db, GenerationSettings::from(&cfg.generation)).delete_course(course_id)?;
            Ok(format!("Course {} removed.", short(course_id)))
        }),
        silent,
    );
}

/// Cancels all meetings of a course on one date.
pub fn cmd_course_skip(id: String, date: String, reason: Option<String>, silent: bool) {
    report(
        with_db(|db, cfg| {
            let course_id = db.resolve_course(&id)?;
            let date = parse_date(&date)?;
            let added = Planner::new(db, GenerationSettings::from(&cfg.generation)).add_skip(course_id, date, reason)?;
            Ok(if added {
                format!("No class on {}.", date)
            } else {
                format!("{} was already skipped.", date)
            })
        }),
        silent,
    );
}

/// Adds a weekly meeting and regenerates meetings from `from` (default today).
pub fn cmd_course_meet(id: String, meeting: String, from: Option<String>, silent: bool) {
    report(
        with_db(|db, cfg| {
            let course_id = db.resolve_course(&id)?;
            let pattern: MeetingPattern = meeting.parse()?;
            let from = from.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);
            let n = Planner::new(db, GenerationSettings::from(&cfg.generation)).add_pattern(course_id, pattern, from)?;
            Ok(format!("Meeting added; {} meetings regenerated from {}.", n, from))
        }),
        silent,
    );
}

/// Regenerates a course's meetings over `[from, to]`, defaulting to the whole course.
pub fn cmd_course_regen(id: String, from: Option<String>, to: Option<String>, silent: bool) {
    report(
        with_db(|db, cfg| {
            let course_id = db.resolve_course(&id)?;
            let course = db
                .course(course_id)?
                .ok_or_else(|| PlannerError::not_found("Course", course_id))?;
            let from = from.as_deref().map(parse_date).transpose()?.unwrap_or(course.start_date);
            let to = to.as_deref().map(parse_date).transpose()?.unwrap_or(course.end_date);
            let n = Planner::new(db, GenerationSettings::from(&cfg.generation))
                .regenerate_meeting_instances(course_id, from, to)?;
            Ok(format!("{} meetings regenerated for {}.", n, course.name))
        }),
        silent,
    );
}

// ---- Templates ----

/// Adds a recurring task template and generates its first instances.
pub fn cmd_template_add(args: TemplateArgs, silent: bool) {
    report(
        with_db(|db, cfg| {
            let freq: Frequency = args.freq.parse()?;
            let days = parse_days(&args.days)?;
            let template = TaskTemplate {
                id: Uuid::new_v4(),
                title: args.title.clone(),
                course_id: resolve_course_opt(db, &args.course)?,
                priority: args.priority,
                start_date: parse_date(&args.start)?,
                end_date: parse_date(&args.end)?,
                recurrence: Recurrence::from_parts(freq, args.interval, days)?,
                due_offset_days: args.due_offset,
                reminder_offset_minutes: args.reminder_minutes,
            };
            let id = template.id;
            let n = Planner::new(db, GenerationSettings::from(&cfg.generation))
                .create_template_and_generate(template, cfg.generation.ahead())?;
            Ok(format!("Template added (id = {}, {} tasks generated)", short(id), n))
        }),
        silent,
    );
}

/// Lists all templates.
pub fn cmd_template_list() {
    let db = match load_database() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load database: {}", e);
            return;
        }
    };
    let templates = db.templates().unwrap_or_default();
    if templates.is_empty() {
        println!("No templates found.");
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Title", "Course", "Rule", "Window", "Due", "Prio", "Tasks"]);
    for t in templates {
        let course = t
            .course_id
            .and_then(|id| db.course(id).ok().flatten())
            .map(|c| c.name)
            .unwrap_or_else(|| "-".into());
        let generated = db.task_instances_for_template(t.id).unwrap_or_default().len();
        table.add_row(vec![
            short(t.id),
            t.title.clone(),
            course,
            t.recurrence.to_string(),
            format!("{} .. {}", t.start_date, t.end_date),
            format!("+{}d", t.due_offset_days),
            t.priority.to_string(),
            generated.to_string(),
        ]);
    }
    println!("{table}");
}

/// Removes a template; its tasks are kept as one-off tasks.
pub fn cmd_template_remove(id: String, silent: bool) {
    report(
        with_db(|db, cfg| {
            let template_id = db.resolve_template(&id)?;
            Planner::new(db, GenerationSettings::from(&cfg.generation)).delete_template(template_id)?;
            Ok(format!("Template {} removed.", short(template_id)))
        }),
        silent,
    );
}

/// Fills in missing instances for a template. Safe to run repeatedly.
pub fn cmd_template_regen(id: String, silent: bool) {
    report(
        with_db(|db, cfg| {
            let template_id = db.resolve_template(&id)?;
            let template = db
                .template(template_id)?
                .ok_or_else(|| PlannerError::not_found("Template", template_id))?;
            let n = Planner::new(db, GenerationSettings::from(&cfg.generation))
                .regenerate_from_template(&template, cfg.generation.ahead())?;
            Ok(format!("{} new tasks generated for '{}'.", n, template.title))
        }),
        silent,
    );
}

/// Changes a template's rule from a cutover date onward.
pub fn cmd_template_edit(id: String, edit: TemplateEdit, silent: bool) {
    report(
        with_db(|db, cfg| {
            let template_id = db.resolve_template(&id)?;
            let mut t = db
                .template(template_id)?
                .ok_or_else(|| PlannerError::not_found("Template", template_id))?;
            if let Some(title) = edit.title { t.title = title; }
            if let Some(end) = edit.end.as_deref() { t.end_date = parse_date(end)?; }
            if let Some(offset) = edit.due_offset { t.due_offset_days = offset; }
            if let Some(p) = edit.priority { t.priority = p; }
            if edit.freq.is_some() || edit.interval.is_some() || edit.days.is_some() {
                let freq = match edit.freq.as_deref() {
                    Some(f) => f.parse()?,
                    None => t.recurrence.frequency(),
                };
                let (cur_interval, cur_days) = match t.recurrence {
                    Recurrence::None => (1, DaySet::EMPTY),
                    Recurrence::Daily { interval } | Recurrence::Monthly { interval } => (interval.get(), DaySet::EMPTY),
                    Recurrence::Weekly { every_weeks, days } => (every_weeks.get(), days),
                };
                let days = match &edit.days {
                    Some(_) => parse_days(&edit.days)?,
                    None => cur_days,
                };
                t.recurrence = Recurrence::from_parts(freq, edit.interval.unwrap_or(cur_interval), days)?;
            }
            let cutover = edit.from.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);
            let n = Planner::new(db, GenerationSettings::from(&cfg.generation))
                .update_template(t, cutover, cfg.generation.ahead())?;
            Ok(format!("Template {} updated from {} ({} tasks generated).", short(template_id), cutover, n))
        }),
        silent,
    );
}

/// Advances every template's generation window to today (or `today`).
pub fn cmd_roll(today_override: Option<String>, silent: bool) {
    report(
        with_db(|db, cfg| {
            let day = today_override.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);
            let n = Planner::new(db, GenerationSettings::from(&cfg.generation)).roll_forward(day, cfg.generation.ahead())?;
            Ok(format!("{} new tasks generated up to {} weeks past {}.", n, cfg.generation.ahead_weeks, day))
        }),
        silent,
    );
}

// ---- Tasks ----

/// Adds a one-off task.
pub fn cmd_task_add(title: String, due: String, course: Option<String>, priority: u8, silent: bool) {
    report(
        with_db(|db, cfg| {
            let due = parse_date(&due)?;
            let course_id = resolve_course_opt(db, &course)?;
            let task = TaskInstance::one_off(title, due, course_id, priority);
            let id = Planner::new(db, GenerationSettings::from(&cfg.generation)).create_one_off_task(task)?;
            Ok(format!("Task added (id = {})", short(id)))
        }),
        silent,
    );
}

/// Sets a task's status.
pub fn cmd_task_status(id: String, status: TaskStatus, silent: bool) {
    report(
        with_db(|db, cfg| {
            let task_id = db.resolve_task(&id)?;
            Planner::new(db, GenerationSettings::from(&cfg.generation)).set_task_status(task_id, status)?;
            Ok(format!("Task {} marked as {}.", short(task_id), status))
        }),
        silent,
    );
}

/// Removes a task.
pub fn cmd_task_remove(id: String, silent: bool) {
    report(
        with_db(|db, cfg| {
            let task_id = db.resolve_task(&id)?;
            Planner::new(db, GenerationSettings::from(&cfg.generation)).delete_task(task_id)?;
            Ok(format!("Task {} removed.", short(task_id)))
        }),
        silent,
    );
}

/// Lists tasks grouped as overdue, today and upcoming, most urgent first.
///
/// By default, hides done tasks unless `all` is true.
pub fn cmd_todo(all: bool) {
    let db = match load_database() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load database: {}", e);
            return;
        }
    };
    let mut tasks = db.tasks().unwrap_or_default();
    if !all {
        tasks.retain(|t| t.status != TaskStatus::Done);
    }
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let today = today();
    sort_tasks(&mut tasks, today);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Section").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Course").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Time Left").add_attribute(Attribute::Bold),
            Cell::new("Prio").add_attribute(Attribute::Bold),
            Cell::new("Urg").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let urgency = compute_urgency(&t, today);
        let days_left = (t.due_date - today).num_days();
        let course = t.course_id.and_then(|id| db.course(id).ok().flatten());

        let urgency_color = if t.status == TaskStatus::Done {
            Color::Grey
        } else if urgency > 50.0 {
            Color::Red
        } else if urgency > 20.0 {
            Color::Yellow
        } else {
            Color::Green
        };
        let status_color = match t.status {
            TaskStatus::Done => Color::Green,
            TaskStatus::Doing => Color::Cyan,
            TaskStatus::Todo => Color::Yellow,
        };
        let title_color = t
            .color
            .or_else(|| course.as_ref().map(|c| c.color))
            .map_or(Color::Reset, table_color);

        table.add_row(vec![
            Cell::new(short(t.id)),
            Cell::new(Section::of(&t, today).label()),
            Cell::new(&t.title).fg(title_color),
            Cell::new(course.map(|c| c.name).unwrap_or_default()),
            Cell::new(t.due_date),
            Cell::new(days_left_label(days_left))
                .fg(if days_left < 0 && t.status != TaskStatus::Done { Color::Red } else { Color::Reset }),
            Cell::new(t.priority),
            Cell::new(format!("{:.1}", urgency)).fg(urgency_color),
            Cell::new(t.status).fg(status_color),
        ]);
    }

    println!("{table}");
}

// ---- Agenda and events ----

/// Prints everything happening over `days` days from `from` (default today).
pub fn cmd_agenda(from: Option<String>, days: Option<u32>) {
    let cfg = load_config();
    let from = match from.as_deref().map(parse_date).transpose() {
        Ok(d) => d.unwrap_or_else(today),
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    let db = match load_database() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load database: {}", e);
            return;
        }
    };
    let days = days.unwrap_or(cfg.display.agenda_days);
    let items = match agenda(&db, from, days, default_color(&cfg)) {
        Ok(items) => items,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    if items.is_empty() {
        println!("Nothing scheduled.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Course").add_attribute(Attribute::Bold),
            Cell::new("Where / Status").add_attribute(Attribute::Bold),
        ]);
    for item in items {
        let time = match (item.start, item.end) {
            (Some(s), Some(e)) => format!("{}-{}", s.format("%H:%M"), e.format("%H:%M")),
            _ => "all day".to_string(),
        };
        let detail = match item.kind {
            AgendaKind::Task => item.status.map(|s| s.to_string()).unwrap_or_default(),
            _ if item.cancelled => "cancelled".to_string(),
            _ => item.location.clone().unwrap_or_default(),
        };
        let mut title = Cell::new(&item.title).fg(table_color(item.color));
        if item.cancelled {
            title = title.add_attribute(Attribute::CrossedOut);
        }
        table.add_row(vec![
            Cell::new(item.date.format("%a %Y-%m-%d")),
            Cell::new(time),
            Cell::new(item.kind.label()),
            title,
            Cell::new(item.course.unwrap_or_default()),
            Cell::new(detail),
        ]);
    }
    println!("{table}");
}

/// Adds a special event such as an exam.
pub fn cmd_event_add(args: EventArgs, silent: bool) {
    report(
        with_db(|db, cfg| {
            let course_id = resolve_course_opt(db, &args.course)?;
            let color = match (&args.color, course_id) {
                (Some(c), _) => parse_color(c)?,
                (None, Some(id)) => db.course(id)?.map_or(default_color(cfg), |c| c.color),
                (None, None) => default_color(cfg),
            };
            let event = SpecialEvent {
                id: Uuid::new_v4(),
                title: args.title.clone(),
                course_id,
                color,
                start: parse_datetime(&args.start)?,
                end: parse_datetime(&args.end)?,
                location: args.location.clone(),
                notes: args.notes.clone(),
            };
            let id = Planner::new(db, GenerationSettings::from(&cfg.generation)).create_event(event)?;
            Ok(format!("Event added (id = {})", short(id)))
        }),
        silent,
    );
}

pub fn cmd_event_remove(id: String, silent: bool) {
    report(
        with_db(|db, cfg| {
            let event_id = db.resolve_event(&id)?;
            Planner::new(db, GenerationSettings::from(&cfg.generation)).delete_event(event_id)?;
            Ok(format!("Event {} removed.", short(event_id)))
        }),
        silent,
    );
}

// ---- Config and maintenance ----

/// Prints the effective configuration.
pub fn cmd_config_show() {
    let cfg = load_config();
    match cfg.to_toml() {
        Ok(s) => {
            println!("# {}", config_path().display());
            println!("{}", s);
        }
        Err(e) => eprintln!("{}", e),
    }
}

/// Writes a config file with default values.
pub fn cmd_config_init(force: bool) {
    let path = config_path();
    if path.exists() && !force {
        eprintln!("Config already exists at {} (use --force to overwrite).", path.display());
        return;
    }
    match Config::default().save() {
        Ok(p) => println!("Config written to {}", p.display()),
        Err(e) => eprintln!("Failed to write config: {}", e),
    }
}

/// Resets the database by deleting all courses, tasks and events.
pub fn cmd_reset(force: bool) {
    if !force {
        print!("Are you sure you want to delete all courses, tasks and events? This cannot be undone. [y/N] ");
        let mut input = String::new();
        if io::stdout().flush().is_err() || io::stdin().read_line(&mut input).is_err() {
            println!("Aborted.");
            return;
        }
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return;
        }
    }

    let result = match load_database() {
        Ok(mut db) => db.clear().and_then(|_| save_database(&db)),
        Err(e) => {
            warn!(error = %e, "database unreadable, deleting the file instead");
            delete_database()
        }
    };
    if let Err(e) = result {
        eprintln!("Failed to reset database: {}", e);
    } else {
        println!("Database reset successfully.");
    }
}
