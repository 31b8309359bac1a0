//! # Planust
//!
//! A terminal academic planner. Courses carry weekly class meetings, task
//! templates carry recurrence rules, and both are expanded into dated
//! instances that show up in an agenda and a to-do list.
//!
//! ## Usage
//!
//! ### Interactive Mode (TUI)
//!
//! ```bash
//! planust
//! # or explicitly
//! planust ui
//! ```
//!
//! **Agenda View**
//! *   `h` / `l`: Previous / next week
//! *   `t`: Jump to today
//! *   `v`: Switch to To-do view
//!
//! **To-do View**
//! *   `Space`: Cycle status (Todo, Doing, Done)
//! *   `c`: Show/Hide done tasks
//! *   `d`: Delete selected task
//! *   `a`: Add a one-off task
//! *   `v`: Switch to Agenda view
//!
//! ### Command Line Interface (CLI)
//!
//! ```bash
//! # A course meeting Mon/Wed, with no class on a holiday
//! planust course add "CS 101" --start 2024-01-08 --end 2024-05-03 \
//!     --meet "MON 10:30-11:45" --meet "WED 10:30-11:45" --skip 2024-01-15
//!
//! # Weekly homework due two days after each Monday
//! planust template add "Problem set" --start 2024-01-08 --end 2024-05-03 \
//!     --freq weekly --days mon --due-offset 2 --course cs
//!
//! planust agenda --days 14
//! planust todo
//! planust roll
//! ```
//!
//! ## Data Storage
//!
//! Everything is saved in one JSON file in your local data directory
//! (`~/.local/share/planust/planner.json` on Linux). Override it with the
//! `PLANUST_DB` environment variable. Settings are read from
//! `~/.config/planust/config.toml` or `PLANUST_CONFIG`.
//!
//! Set `RUST_LOG=planust=debug` to see what generation is doing.

use std::io;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use planust::commands::*;
use planust::models::TaskStatus;
use planust::tui::run_tui;

#[derive(Parser)]
#[command(name = "planust")]
#[command(about = "Terminal academic planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage courses and their class meetings
    Course {
        #[command(subcommand)]
        command: CourseCommands,
    },
    /// Manage recurring task templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Manage individual tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// List open tasks grouped as overdue, today and upcoming
    Todo {
        /// Include done tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Show meetings, tasks and events day by day
    Agenda {
        /// First day (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        from: Option<String>,
        /// Number of days to show
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Manage special events (exams, deadlines with a time)
    Event {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Generate upcoming tasks for every template
    Roll {
        /// Pretend today is this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Reset the database (delete everything)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
    /// Open interactive TUI
    Ui,
}

#[derive(Subcommand)]
enum CourseCommands {
    /// Add a course and generate its meetings
    Add {
        /// Course name
        name: String,
        /// First day of classes (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// Last day of classes (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
        /// Weekly meeting, e.g. "MON 10:30-11:45" (repeatable)
        #[arg(short, long = "meet")]
        meet: Vec<String>,
        /// Date with no class (repeatable)
        #[arg(long = "skip")]
        skip: Vec<String>,
        /// Color as #RRGGBB
        #[arg(short, long)]
        color: Option<String>,
        /// Room or building
        #[arg(short, long)]
        location: Option<String>,
        /// Online course without scheduled meetings
        #[arg(long = "virtual")]
        is_virtual: bool,
    },
    /// List courses
    List,
    /// Remove a course with all its meetings
    Remove {
        id: String,
    },
    /// Cancel class on a date
    Skip {
        id: String,
        /// Date (YYYY-MM-DD)
        date: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Add a weekly meeting to a course
    Meet {
        id: String,
        /// e.g. "FRI 09:00-10:00"
        meeting: String,
        /// Regenerate from this date, defaults to today
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Regenerate a course's meetings
    Regen {
        id: String,
        #[arg(short, long)]
        from: Option<String>,
        #[arg(short, long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Add a template and generate its first tasks
    Add {
        /// Task title
        title: String,
        /// First anchor date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// Last anchor date (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
        /// none, daily, weekly, biweekly or monthly
        #[arg(short, long, default_value = "weekly")]
        freq: String,
        /// Repeat every N days/weeks/months
        #[arg(short, long, default_value_t = 1)]
        interval: u32,
        /// Weekdays for weekly rules, e.g. "mon,wed"
        #[arg(short, long)]
        days: Option<String>,
        /// Days from anchor to due date
        #[arg(long, default_value_t = 0)]
        due_offset: i64,
        /// Priority 1-5
        #[arg(short, long, default_value_t = 3)]
        priority: u8,
        /// Course id (prefix)
        #[arg(short, long)]
        course: Option<String>,
        /// Remind this many minutes before the end of the due day
        #[arg(short, long)]
        remind: Option<i64>,
    },
    /// List templates
    List,
    /// Remove a template (its tasks are kept)
    Remove {
        id: String,
    },
    /// Generate any missing tasks
    Regen {
        id: String,
    },
    /// Change a template from a date onward
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        end: Option<String>,
        #[arg(short, long)]
        freq: Option<String>,
        #[arg(short, long)]
        interval: Option<u32>,
        #[arg(short, long)]
        days: Option<String>,
        #[arg(long)]
        due_offset: Option<i64>,
        #[arg(short, long)]
        priority: Option<u8>,
        /// Cutover date, defaults to today
        #[arg(long)]
        from: Option<String>,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a one-off task
    Add {
        title: String,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: String,
        #[arg(short, long)]
        course: Option<String>,
        #[arg(short, long, default_value_t = 3)]
        priority: u8,
    },
    /// Set a task's status (todo, doing, done)
    Status {
        id: String,
        status: String,
    },
    /// Mark a task as done
    Done {
        id: String,
    },
    /// Remove a task
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// Add an event
    Add {
        title: String,
        /// Start, "YYYY-MM-DD HH:MM"
        #[arg(short, long)]
        start: String,
        /// End, "YYYY-MM-DD HH:MM"
        #[arg(short, long)]
        end: String,
        #[arg(short, long)]
        course: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Remove an event
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a config file with default values
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Course { command }) => match command {
            CourseCommands::Add { name, start, end, meet, skip, color, location, is_virtual } => cmd_course_add(
                CourseArgs { name, start, end, color, location, is_virtual, meetings: meet, skips: skip },
                false,
            ),
            CourseCommands::List => cmd_course_list(),
            CourseCommands::Remove { id } => cmd_course_remove(id, false),
            CourseCommands::Skip { id, date, reason } => cmd_course_skip(id, date, reason, false),
            CourseCommands::Meet { id, meeting, from } => cmd_course_meet(id, meeting, from, false),
            CourseCommands::Regen { id, from, to } => cmd_course_regen(id, from, to, false),
        },
        Some(Commands::Template { command }) => match command {
            TemplateCommands::Add { title, start, end, freq, interval, days, due_offset, priority, course, remind } => {
                cmd_template_add(
                    TemplateArgs {
                        title,
                        start,
                        end,
                        freq,
                        interval,
                        days,
                        due_offset,
                        priority,
                        course,
                        reminder_minutes: remind,
                    },
                    false,
                )
            }
            TemplateCommands::List => cmd_template_list(),
            TemplateCommands::Remove { id } => cmd_template_remove(id, false),
            TemplateCommands::Regen { id } => cmd_template_regen(id, false),
            TemplateCommands::Edit { id, title, end, freq, interval, days, due_offset, priority, from } => {
                cmd_template_edit(id, TemplateEdit { title, end, freq, interval, days, due_offset, priority, from }, false)
            }
        },
        Some(Commands::Task { command }) => match command {
            TaskCommands::Add { title, due, course, priority } => cmd_task_add(title, due, course, priority, false),
            TaskCommands::Status { id, status } => match status.parse::<TaskStatus>() {
                Ok(status) => cmd_task_status(id, status, false),
                Err(e) => eprintln!("{}", e),
            },
            TaskCommands::Done { id } => cmd_task_status(id, TaskStatus::Done, false),
            TaskCommands::Remove { id } => cmd_task_remove(id, false),
        },
        Some(Commands::Todo { all }) => cmd_todo(all),
        Some(Commands::Agenda { from, days }) => cmd_agenda(from, days),
        Some(Commands::Event { command }) => match command {
            EventCommands::Add { title, start, end, course, color, location, notes } => {
                cmd_event_add(EventArgs { title, start, end, course, color, location, notes }, false)
            }
            EventCommands::Remove { id } => cmd_event_remove(id, false),
        },
        Some(Commands::Roll { today }) => cmd_roll(today, false),
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => cmd_config_show(),
            ConfigCommands::Init { force } => cmd_config_init(force),
        },
        Some(Commands::Reset { force }) => cmd_reset(force),
        Some(Commands::Completions { shell }) => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => {
                    eprintln!("Unsupported shell: {}", shell);
                    return;
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "planust", &mut io::stdout());
        }
        Some(Commands::Ui) | None => {
            if let Err(e) = run_tui() {
                eprintln!("Error running TUI: {}", e);
            }
        }
    }
}
