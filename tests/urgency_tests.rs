use planust::urgency::{compute_urgency, sort_tasks, Section};
use planust::models::{TaskInstance, TaskStatus};
use chrono::{Local, Duration, NaiveDate};

fn task(title: &str, due: NaiveDate, priority: u8) -> TaskInstance {
    TaskInstance::one_off(title.into(), due, None, priority)
}

#[test]
fn test_urgency_calculation() {
    let today = Local::now().date_naive();
    let t = task("Test", today + Duration::days(1), 3);

    let urgency = compute_urgency(&t, today);
    // Urgency should be positive
    assert!(urgency > 0.0);
}

#[test]
fn test_urgency_overdue() {
    let today = Local::now().date_naive();
    let t = task("Test", today - Duration::days(1), 3);

    let urgency = compute_urgency(&t, today);
    // Should be very high because it's overdue (base 100 + ...)
    assert!(urgency > 100.0);
}

#[test]
fn test_urgency_done_is_negative() {
    let today = Local::now().date_naive();
    let mut t = task("Test", today, 5);
    t.status = TaskStatus::Done;
    assert_eq!(compute_urgency(&t, today), -1.0);
}

#[test]
fn test_priority_raises_urgency() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let low = task("Low", today + Duration::days(3), 1);
    let high = task("High", today + Duration::days(3), 5);
    assert!(compute_urgency(&high, today) > compute_urgency(&low, today));
}

#[test]
fn test_doing_floats_above_todo() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let todo = task("A", today + Duration::days(2), 3);
    let mut doing = todo.clone();
    doing.status = TaskStatus::Doing;
    assert!(compute_urgency(&doing, today) > compute_urgency(&todo, today));
}

#[test]
fn test_sort_groups_by_section() {
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut tasks = vec![
        task("later", today + Duration::days(5), 5),
        task("today", today, 1),
        task("soon", today + Duration::days(1), 1),
        task("late", today - Duration::days(2), 1),
    ];
    sort_tasks(&mut tasks, today);

    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["late", "today", "soon", "later"]);
    assert_eq!(Section::of(&tasks[0], today), Section::Overdue);
    assert_eq!(Section::of(&tasks[1], today), Section::Today);
    assert_eq!(Section::of(&tasks[3], today), Section::Upcoming);
}
