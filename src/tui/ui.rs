use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};
use chrono::Duration;
use crate::agenda::AgendaKind;
use crate::models::TaskStatus;
use crate::urgency::{compute_urgency, Section};
use super::app::{App, InputMode, ViewMode};

fn rgb(argb: u32) -> Color {
    Color::Rgb(((argb >> 16) & 0xFF) as u8, ((argb >> 8) & 0xFF) as u8, (argb & 0xFF) as u8)
}

fn header(cols: Vec<&'static str>) -> Row<'static> {
    Row::new(cols)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .bottom_margin(1)
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Table
            Constraint::Length(3)  // Help
        ].as_ref())
        .split(f.area());

    match app.view_mode {
        ViewMode::Agenda => render_agenda(f, app, chunks[0]),
        ViewMode::Todo => render_todo(f, app, chunks[0]),
    }

    let help_text = match (&app.message, &app.input_mode) {
        (Some(msg), InputMode::Normal) => msg.as_str(),
        (None, InputMode::Normal) => match app.view_mode {
            ViewMode::Agenda => "q: Quit | h/l: Prev/Next Week | t: This Week | a: Add Task | r: Reload | v: To-do",
            ViewMode::Todo => "q: Quit | a: Add | Space: Cycle Status | c: Toggle Done | d: Del | r: Reload | v: Agenda",
        },
        (_, InputMode::Adding) => "Enter: Next Step | Esc: Cancel",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[1]);

    if app.input_mode == InputMode::Adding {
        let area = centered_rect(60, 3, f.area());
        f.render_widget(Clear, area);

        let title = match app.add_state.step {
            0 => "Add Task: Enter Title".to_string(),
            _ => format!("Add '{}': Due Date (YYYY-MM-DD, empty = today)", app.add_state.title),
        };

        let input = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(input, area);
    }
}

fn render_agenda(f: &mut Frame, app: &mut App, area: Rect) {
    let today = App::today();
    let rows: Vec<Row> = app
        .items
        .iter()
        .map(|item| {
            let time = match (item.start, item.end) {
                (Some(s), Some(e)) => format!("{}-{}", s.format("%H:%M"), e.format("%H:%M")),
                _ => "all day".to_string(),
            };
            let detail = match item.kind {
                AgendaKind::Task => item.status.map(|s| s.to_string()).unwrap_or_default(),
                _ if item.cancelled => "cancelled".to_string(),
                _ => item.location.clone().unwrap_or_default(),
            };
            let mut style = Style::default().fg(rgb(item.color));
            if item.cancelled || item.status == Some(TaskStatus::Done) {
                style = style.add_modifier(Modifier::CROSSED_OUT | Modifier::DIM);
            }
            let date_style = if item.date == today {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(item.date.format("%a %m-%d").to_string()).style(date_style),
                Cell::from(time),
                Cell::from(item.kind.label()),
                Cell::from(item.title.clone()).style(style),
                Cell::from(item.course.clone().unwrap_or_default()),
                Cell::from(detail),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Min(20),
        Constraint::Length(16),
        Constraint::Length(16),
    ];

    let week_end = app.week_start + Duration::days(6);
    let table = Table::new(rows, widths)
        .header(header(vec!["Date", "Time", "Kind", "Title", "Course", "Where / Status"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Planust - Agenda {} .. {}", app.week_start, week_end)),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.agenda_state);
}

fn render_todo(f: &mut Frame, app: &mut App, area: Rect) {
    let today = App::today();

    let rows: Vec<Row> = app
        .tasks
        .iter()
        .map(|t| {
            let urgency = compute_urgency(t, today);
            let days_left = (t.due_date - today).num_days();
            let time_left_str = if days_left < 0 {
                format!("{}d overdue", days_left.abs())
            } else if days_left == 0 {
                "Today".to_string()
            } else {
                format!("{}d", days_left)
            };

            let style = if t.status == TaskStatus::Done {
                Style::default().fg(Color::DarkGray)
            } else if urgency > 50.0 {
                Style::default().fg(Color::Red)
            } else if urgency > 20.0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Green)
            };

            Row::new(vec![
                Cell::from(Section::of(t, today).label()),
                Cell::from(t.title.clone()),
                Cell::from(app.course_name(t.course_id)),
                Cell::from(t.due_date.to_string()),
                Cell::from(time_left_str),
                Cell::from(t.priority.to_string()),
                Cell::from(format!("{:.1}", urgency)),
                Cell::from(t.status.to_string()),
            ]).style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(9),
        Constraint::Min(20),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(4),
        Constraint::Length(6),
        Constraint::Length(6),
    ];

    let title = if app.show_done { "Planust - To-do (all)" } else { "Planust - To-do" };
    let table = Table::new(rows, widths)
        .header(header(vec!["Section", "Title", "Course", "Due", "Time Left", "Prio", "Urg", "Status"]))
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let margin = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(margin),
            Constraint::Length(height),
            Constraint::Length(margin),
        ].as_ref())
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(popup_layout[1])[1]
}
