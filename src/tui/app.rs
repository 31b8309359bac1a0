use std::collections::HashMap;

use chrono::{Datelike, Duration, Local, NaiveDate};
use ratatui::widgets::TableState;
use tracing::warn;
use uuid::Uuid;

use crate::agenda::{agenda, AgendaItem};
use crate::commands::{cmd_task_add, cmd_task_remove, cmd_task_status};
use crate::config::Config;
use crate::models::{parse_color, parse_date, TaskInstance, TaskStatus};
use crate::storage::{load_database, Store};
use crate::urgency::sort_tasks;

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Adding,
}

#[derive(PartialEq)]
pub enum ViewMode {
    Agenda,
    Todo,
}

/// State for the two-step "Add Task" prompt.
#[derive(Default)]
pub struct AddState {
    pub title: String,
    pub step: usize, // 0: Title, 1: Due
}

pub struct App {
    pub tasks: Vec<TaskInstance>,
    pub items: Vec<AgendaItem>,
    pub course_names: HashMap<Uuid, String>,
    pub state: TableState,
    pub agenda_state: TableState,
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub add_state: AddState,
    pub show_done: bool,
    /// Monday of the week shown in the agenda.
    pub week_start: NaiveDate,
    pub default_color: u32,
    pub message: Option<String>,
}

fn monday_of(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

fn wrap_next(state: &mut TableState, len: usize) {
    if len == 0 { return; }
    let i = match state.selected() {
        Some(i) if i + 1 < len => i + 1,
        _ => 0,
    };
    state.select(Some(i));
}

fn wrap_previous(state: &mut TableState, len: usize) {
    if len == 0 { return; }
    let i = match state.selected() {
        Some(0) | None => len - 1,
        Some(i) => i - 1,
    };
    state.select(Some(i));
}

fn clamp_selection(state: &mut TableState, len: usize) {
    if len == 0 {
        state.select(None);
    } else if let Some(i) = state.selected() {
        if i >= len {
            state.select(Some(len - 1));
        }
    } else {
        state.select(Some(0));
    }
}

impl App {
    /// Creates a new App instance and loads initial data.
    pub fn new() -> App {
        let cfg = Config::load().unwrap_or_else(|e| {
            warn!("using default config: {}", e);
            Config::default()
        });
        let mut app = App {
            tasks: Vec::new(),
            items: Vec::new(),
            course_names: HashMap::new(),
            state: TableState::default(),
            agenda_state: TableState::default(),
            view_mode: ViewMode::Agenda,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            add_state: AddState::default(),
            show_done: false,
            week_start: monday_of(Local::now().date_naive()),
            default_color: parse_color(&cfg.display.default_course_color).unwrap_or(0xFF4F_81BD),
            message: None,
        };
        app.reload();
        app
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Reloads everything from storage and refreshes both views.
    pub fn reload(&mut self) {
        let db = match load_database() {
            Ok(db) => db,
            Err(e) => {
                self.message = Some(format!("Failed to load database: {}", e));
                return;
            }
        };

        self.course_names = db
            .courses()
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut tasks = db.tasks().unwrap_or_default();
        if !self.show_done {
            tasks.retain(|t| t.status != TaskStatus::Done);
        }
        sort_tasks(&mut tasks, App::today());
        self.tasks = tasks;
        clamp_selection(&mut self.state, self.tasks.len());

        self.items = match agenda(&db, self.week_start, 7, self.default_color) {
            Ok(items) => items,
            Err(e) => {
                self.message = Some(e.to_string());
                Vec::new()
            }
        };
        clamp_selection(&mut self.agenda_state, self.items.len());
    }

    /// Selects the next row in the current view.
    pub fn next(&mut self) {
        match self.view_mode {
            ViewMode::Todo => wrap_next(&mut self.state, self.tasks.len()),
            ViewMode::Agenda => wrap_next(&mut self.agenda_state, self.items.len()),
        }
    }

    /// Selects the previous row in the current view.
    pub fn previous(&mut self) {
        match self.view_mode {
            ViewMode::Todo => wrap_previous(&mut self.state, self.tasks.len()),
            ViewMode::Agenda => wrap_previous(&mut self.agenda_state, self.items.len()),
        }
    }

    pub fn next_week(&mut self) {
        self.week_start += Duration::days(7);
        self.agenda_state.select(None);
        self.reload();
    }

    pub fn previous_week(&mut self) {
        self.week_start -= Duration::days(7);
        self.agenda_state.select(None);
        self.reload();
    }

    pub fn this_week(&mut self) {
        self.week_start = monday_of(App::today());
        self.reload();
    }

    fn selected_task(&self) -> Option<&TaskInstance> {
        if self.view_mode != ViewMode::Todo {
            return None;
        }
        self.state.selected().and_then(|i| self.tasks.get(i))
    }

    /// Moves the selected task to its next status (Todo, Doing, Done).
    pub fn cycle_selected(&mut self) {
        if let Some((id, title, status)) = self.selected_task().map(|t| (t.id, t.title.clone(), t.status.next())) {
            cmd_task_status(id.to_string(), status, true);
            self.message = Some(format!("'{}' is now {}", title, status));
            self.reload();
        }
    }

    /// Deletes the selected task.
    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_task().map(|t| t.id) {
            cmd_task_remove(id.to_string(), true);
            self.reload();
        }
    }

    /// Toggles the visibility of done tasks.
    pub fn toggle_done(&mut self) {
        self.show_done = !self.show_done;
        self.reload();
    }

    /// Toggles between Agenda and To-do views.
    pub fn toggle_view(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Agenda => ViewMode::Todo,
            ViewMode::Todo => ViewMode::Agenda,
        };
    }

    /// Opens the "Add Task" prompt.
    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.add_state = AddState::default();
        self.input_buffer.clear();
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
    }

    /// Handles Enter in the add prompt. An empty due date means today.
    pub fn handle_input(&mut self) {
        let input = self.input_buffer.trim().to_string();
        self.input_buffer.clear();
        match self.add_state.step {
            0 => {
                if input.is_empty() {
                    self.cancel_input();
                    return;
                }
                self.add_state.title = input;
                self.add_state.step = 1;
            }
            _ => {
                let due = if input.is_empty() { Ok(App::today()) } else { parse_date(&input) };
                match due {
                    Ok(due) => {
                        let title = std::mem::take(&mut self.add_state.title);
                        cmd_task_add(title.clone(), due.to_string(), None, 3, true);
                        self.message = Some(format!("Added '{}' due {}", title, due));
                        self.input_mode = InputMode::Normal;
                        self.reload();
                    }
                    Err(e) => self.message = Some(e.to_string()),
                }
            }
        }
    }

    pub fn course_name(&self, id: Option<Uuid>) -> String {
        id.and_then(|id| self.course_names.get(&id)).cloned().unwrap_or_default()
    }
}

impl Default for App {
    fn default() -> Self {
        App::new()
    }
}
