use chrono::NaiveDate;
use planust::commands::*;
use planust::models::TaskStatus;
use planust::storage::{load_database, Database, Store};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

// Use a mutex to ensure tests run serially since they modify environment variables
static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn with_test_db<F>(test_name: &str, f: F)
where
    F: FnOnce(PathBuf),
{
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut db_path = env::temp_dir();
    db_path.push(format!("planust_test_{}.json", test_name));
    let mut config_path = env::temp_dir();
    config_path.push(format!("planust_test_{}.toml", test_name));

    env::set_var("PLANUST_DB", db_path.to_str().unwrap());
    env::set_var("PLANUST_CONFIG", config_path.to_str().unwrap());

    // Clean up before test
    for p in [&db_path, &config_path] {
        if p.exists() {
            fs::remove_file(p).unwrap();
        }
    }

    f(db_path.clone());

    // Clean up after test
    for p in [&db_path, &config_path] {
        if p.exists() {
            fs::remove_file(p).unwrap();
        }
    }
    env::remove_var("PLANUST_DB");
    env::remove_var("PLANUST_CONFIG");
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn db() -> Database {
    load_database().unwrap()
}

fn add_cs101(meetings: &[&str], skips: &[&str]) {
    cmd_course_add(
        CourseArgs {
            name: "CS 101".into(),
            start: "2024-01-08".into(),
            end: "2024-01-21".into(),
            meetings: meetings.iter().map(|s| s.to_string()).collect(),
            skips: skips.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        },
        true,
    );
}

fn weekly_homework(course: Option<String>) -> TemplateArgs {
    TemplateArgs {
        title: "Problem set".into(),
        start: "2024-01-08".into(),
        end: "2024-03-01".into(),
        freq: "weekly".into(),
        interval: 1,
        days: Some("mon".into()),
        due_offset: 2,
        priority: 3,
        course,
        reminder_minutes: None,
    }
}

#[test]
fn test_course_add_generates_meetings() {
    with_test_db("course_add", |_path| {
        add_cs101(&["MON 10:30-11:45", "WED 10:30-11:45"], &["2024-01-15"]);

        let db = db();
        let courses = db.courses().unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "CS 101");
        // Default color from config
        assert_eq!(courses[0].color, 0xFF4F_81BD);

        let meetings = db.meeting_instances_for_course(courses[0].id).unwrap();
        let dates: Vec<NaiveDate> = meetings.iter().map(|m| m.date()).collect();
        assert_eq!(dates.len(), 3);
        assert!(!dates.contains(&date("2024-01-15")));
        assert_eq!(db.skips_for_course(courses[0].id).unwrap().len(), 1);
    });
}

#[test]
fn test_course_add_rejects_bad_meeting() {
    with_test_db("course_bad", |_path| {
        add_cs101(&["MON 11:45-10:30"], &[]);
        assert!(db().courses().unwrap().is_empty());
    });
}

#[test]
fn test_virtual_course_has_no_meetings() {
    with_test_db("course_virtual", |_path| {
        cmd_course_add(
            CourseArgs {
                name: "Online Ethics".into(),
                start: "2024-01-08".into(),
                end: "2024-05-03".into(),
                is_virtual: true,
                meetings: vec!["TUE 09:00-10:00".into()],
                ..Default::default()
            },
            true,
        );
        let db = db();
        let course = &db.courses().unwrap()[0];
        assert!(db.meeting_instances_for_course(course.id).unwrap().is_empty());
        assert_eq!(db.patterns_for_course(course.id).unwrap().len(), 1);
    });
}

#[test]
fn test_course_skip_removes_meeting() {
    with_test_db("course_skip", |_path| {
        add_cs101(&["MON 10:30-11:45"], &[]);
        let id = db().courses().unwrap()[0].id;
        assert_eq!(db().meeting_instances_for_course(id).unwrap().len(), 2);

        cmd_course_skip(id.to_string()[..8].to_string(), "2024-01-15".into(), Some("Holiday".into()), true);

        let db = db();
        let meetings = db.meeting_instances_for_course(id).unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].date(), date("2024-01-08"));

        // Regenerating keeps honoring the skip
        cmd_course_regen(id.to_string(), None, None, true);
        assert_eq!(load_database().unwrap().meeting_instances_for_course(id).unwrap().len(), 1);
    });
}

#[test]
fn test_course_meet_adds_slot() {
    with_test_db("course_meet", |_path| {
        add_cs101(&["MON 10:30-11:45"], &[]);
        let id = db().courses().unwrap()[0].id;

        cmd_course_meet(id.to_string(), "FRI 09:00-10:00".into(), Some("2024-01-08".into()), true);

        let db = db();
        assert_eq!(db.patterns_for_course(id).unwrap().len(), 2);
        assert_eq!(db.meeting_instances_for_course(id).unwrap().len(), 4);
    });
}

#[test]
fn test_course_remove_cascades() {
    with_test_db("course_remove", |_path| {
        add_cs101(&["MON 10:30-11:45"], &["2024-01-15"]);
        let id = db().courses().unwrap()[0].id;

        cmd_course_remove(id.to_string(), true);

        let db = db();
        assert!(db.courses().unwrap().is_empty());
        assert!(db.meeting_instances_for_course(id).unwrap().is_empty());
        assert!(db.skips_for_course(id).unwrap().is_empty());
    });
}

#[test]
fn test_template_add_generates_ahead() {
    with_test_db("template_add", |_path| {
        cmd_template_add(weekly_homework(None), true);

        let db = db();
        let templates = db.templates().unwrap();
        assert_eq!(templates.len(), 1);

        // 8 weeks ahead, clamped to end date: Mondays Jan 8 .. Feb 26
        let tasks = db.task_instances_for_template(templates[0].id).unwrap();
        assert_eq!(tasks.len(), 8);
        assert!(tasks.iter().all(|t| t.due_date - t.start_date == chrono::Duration::days(2)));
    });
}

#[test]
fn test_template_add_with_course_prefix() {
    with_test_db("template_course", |_path| {
        add_cs101(&[], &[]);
        let course_id = db().courses().unwrap()[0].id;

        cmd_template_add(weekly_homework(Some(course_id.to_string()[..6].to_string())), true);

        let db = db();
        assert!(db.tasks().unwrap().iter().all(|t| t.course_id == Some(course_id)));
    });
}

#[test]
fn test_template_add_rejects_zero_interval() {
    with_test_db("template_zero", |_path| {
        let mut args = weekly_homework(None);
        args.interval = 0;
        cmd_template_add(args, true);

        let db = db();
        assert!(db.templates().unwrap().is_empty());
        assert!(db.tasks().unwrap().is_empty());
    });
}

#[test]
fn test_template_add_rejects_huge_due_offset() {
    with_test_db("template_offset", |_path| {
        let mut args = weekly_homework(None);
        args.due_offset = 1_000_000_000;
        cmd_template_add(args, true);

        let db = db();
        assert!(db.templates().unwrap().is_empty());
        assert!(db.tasks().unwrap().is_empty());
    });
}

#[test]
fn test_template_regen_keeps_status() {
    with_test_db("template_regen", |_path| {
        cmd_template_add(weekly_homework(None), true);
        let db1 = db();
        let template_id = db1.templates().unwrap()[0].id;
        let first = db1
            .tasks()
            .unwrap()
            .into_iter()
            .find(|t| t.start_date == date("2024-01-08"))
            .unwrap();

        cmd_task_status(first.id.to_string(), TaskStatus::Done, true);
        cmd_template_regen(template_id.to_string(), true);
        cmd_template_regen(template_id.to_string(), true);

        let db2 = db();
        let tasks = db2.task_instances_for_template(template_id).unwrap();
        assert_eq!(tasks.len(), 8);
        let again = tasks.iter().find(|t| t.start_date == date("2024-01-08")).unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.status, TaskStatus::Done);
    });
}

#[test]
fn test_template_edit_switches_days_from_cutover() {
    with_test_db("template_edit", |_path| {
        cmd_template_add(weekly_homework(None), true);
        let template_id = db().templates().unwrap()[0].id;

        cmd_template_edit(
            template_id.to_string(),
            TemplateEdit {
                days: Some("wed".into()),
                from: Some("2024-02-01".into()),
                ..Default::default()
            },
            true,
        );

        let db = db();
        let tasks = db.task_instances_for_template(template_id).unwrap();
        // Mondays before the cutover are untouched
        assert!(tasks.iter().any(|t| t.start_date == date("2024-01-29")));
        // Mondays after it are gone, Wednesdays took their place
        assert!(!tasks.iter().any(|t| t.start_date == date("2024-02-05")));
        assert!(tasks.iter().any(|t| t.start_date == date("2024-02-07")));
    });
}

#[test]
fn test_template_remove_detaches_tasks() {
    with_test_db("template_remove", |_path| {
        cmd_template_add(weekly_homework(None), true);
        let template_id = db().templates().unwrap()[0].id;

        cmd_template_remove(template_id.to_string(), true);

        let db = db();
        assert!(db.templates().unwrap().is_empty());
        let tasks = db.tasks().unwrap();
        assert_eq!(tasks.len(), 8);
        assert!(tasks.iter().all(|t| t.template_id.is_none()));
    });
}

#[test]
fn test_roll_forward_extends_window() {
    with_test_db("roll", |_path| {
        let mut args = weekly_homework(None);
        args.end = "2024-05-03".into();
        cmd_template_add(args, true);
        assert_eq!(db().tasks().unwrap().len(), 9);

        cmd_roll(Some("2024-03-04".into()), true);
        let after_first = db().tasks().unwrap().len();
        // Mondays through Apr 29 (today + 8 weeks): 17 in total
        assert_eq!(after_first, 17);

        cmd_roll(Some("2024-03-04".into()), true);
        assert_eq!(db().tasks().unwrap().len(), after_first);
    });
}

#[test]
fn test_task_add_status_remove() {
    with_test_db("task_crud", |_path| {
        cmd_task_add("Buy textbook".into(), "2024-01-10".into(), None, 4, true);
        let tasks = db().tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy textbook");
        assert_eq!(tasks[0].template_id, None);
        let id = tasks[0].id;

        cmd_task_status(id.to_string(), TaskStatus::Doing, true);
        assert_eq!(db().task(id).unwrap().unwrap().status, TaskStatus::Doing);

        cmd_task_remove(id.to_string(), true);
        assert!(db().tasks().unwrap().is_empty());
    });
}

#[test]
fn test_task_add_rejects_bad_priority() {
    with_test_db("task_prio", |_path| {
        cmd_task_add("Too urgent".into(), "2024-01-10".into(), None, 9, true);
        assert!(db().tasks().unwrap().is_empty());
    });
}

#[test]
fn test_event_add_and_remove() {
    with_test_db("event", |_path| {
        add_cs101(&[], &[]);
        let course_id = db().courses().unwrap()[0].id;
        cmd_event_add(
            EventArgs {
                title: "Midterm".into(),
                start: "2024-01-16 18:00".into(),
                end: "2024-01-16 20:00".into(),
                course: Some(course_id.to_string()),
                ..Default::default()
            },
            true,
        );

        let db1 = db();
        let events = db1
            .events_in_range(
                date("2024-01-16").and_hms_opt(0, 0, 0).unwrap(),
                date("2024-01-17").and_hms_opt(0, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].course_id, Some(course_id));

        cmd_event_remove(events[0].id.to_string(), true);
        let remaining = db()
            .events_in_range(
                date("2024-01-01").and_hms_opt(0, 0, 0).unwrap(),
                date("2024-12-31").and_hms_opt(0, 0, 0).unwrap(),
            )
            .unwrap();
        assert!(remaining.is_empty());
    });
}

#[test]
fn test_event_rejects_inverted_times() {
    with_test_db("event_inverted", |_path| {
        cmd_event_add(
            EventArgs {
                title: "Backwards".into(),
                start: "2024-01-16 20:00".into(),
                end: "2024-01-16 18:00".into(),
                ..Default::default()
            },
            true,
        );
        assert!(db().is_empty());
    });
}

#[test]
fn test_config_init_writes_file() {
    with_test_db("config_init", |_path| {
        let path = PathBuf::from(env::var("PLANUST_CONFIG").unwrap());
        assert!(!path.exists());
        cmd_config_init(false);
        assert!(path.exists());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("ahead_weeks = 8"));
    });
}

#[test]
fn test_config_controls_horizon() {
    with_test_db("config_horizon", |_path| {
        let path = PathBuf::from(env::var("PLANUST_CONFIG").unwrap());
        fs::write(&path, "[generation]\nahead_weeks = 2\n").unwrap();

        cmd_template_add(weekly_homework(None), true);
        // Jan 8, 15, 22
        assert_eq!(db().tasks().unwrap().len(), 3);
    });
}

#[test]
fn test_reset() {
    with_test_db("reset", |path| {
        cmd_task_add("Something".into(), "2024-01-10".into(), None, 3, true);
        assert!(path.exists());

        cmd_reset(true);

        assert!(path.exists());
        assert!(db().is_empty());
    });
}

#[test]
fn test_reset_removes_unreadable_database() {
    with_test_db("reset_corrupt", |path| {
        fs::write(&path, "not json").unwrap();

        cmd_reset(true);

        assert!(!path.exists());
        assert!(db().is_empty());
    });
}
