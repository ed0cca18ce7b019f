use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use super::app::{App, Column, DisplayRow, InputMode, ViewMode};
use crate::clock::is_in_progress;
use crate::models::{format_hhmm, Event};

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Columns
            Constraint::Length(3)  // Help
        ].as_ref())
        .split(f.area());

    match app.view_mode {
        ViewMode::Timeline => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(35), Constraint::Percentage(65)].as_ref())
                .split(chunks[0]);

            let past_rows: Vec<Row> = app.past_rows.iter().map(past_row).collect();
            let past = Table::new(past_rows, [Constraint::Length(12), Constraint::Min(10)])
                .block(focused_block("Past", app.column == Column::Past))
                .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
                .highlight_symbol(">> ");
            f.render_stateful_widget(past, columns[0], &mut app.past_state);

            let now = app.now;
            let upcoming_rows: Vec<Row> = app
                .upcoming_rows
                .iter()
                .map(|r| upcoming_row(r, now))
                .collect();
            let widths = [
                Constraint::Length(24),
                Constraint::Length(13),
                Constraint::Min(20),
            ];
            let title = format!("Now & Upcoming ({} per template)", app.lookahead());
            let upcoming = Table::new(upcoming_rows, widths)
                .block(focused_block(&title, app.column == Column::Upcoming))
                .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
                .highlight_symbol(">> ");
            f.render_stateful_widget(upcoming, columns[1], &mut app.upcoming_state);
        }
        ViewMode::Templates => {
            let rows: Vec<Row> = app
                .templates()
                .iter()
                .map(|t| {
                    let shown = if t.show_on_timeline { "shown" } else { "hidden" };
                    Row::new(vec![
                        Cell::from(t.title.clone()).style(Style::default().fg(color_of(t.color.as_deref()))),
                        Cell::from(format!("every {} {}", t.repeat_interval, t.repeat_type)),
                        Cell::from(time_span(t.time, t.end_time)),
                        Cell::from(t.start_date.map(|d| d.to_string()).unwrap_or_else(|| "now".into())),
                        Cell::from(shown),
                    ])
                    .style(if t.show_on_timeline { Style::default() } else { Style::default().fg(Color::DarkGray) })
                })
                .collect();

            let widths = [
                Constraint::Min(20),
                Constraint::Length(16),
                Constraint::Length(13),
                Constraint::Length(12),
                Constraint::Length(8),
            ];

            let table = Table::new(rows, widths)
                .header(Row::new(vec!["Title", "Repeats", "Time", "Starts", "Timeline"])
                    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                    .bottom_margin(1))
                .block(Block::default().borders(Borders::ALL).title("Timeliner - Templates"))
                .row_highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
                .highlight_symbol(">> ");

            f.render_stateful_widget(table, chunks[0], &mut app.template_state);
        }
    }

    let help_text = match (&app.status, &app.input_mode) {
        (Some(status), InputMode::Normal) => status.clone(),
        (None, InputMode::Normal) => match app.view_mode {
            ViewMode::Timeline => "q: Quit | j/k: Move | Tab: Column | a: Add | e: Edit | d: Del | +/-: Lookahead | r: Refresh | t: Templates".to_string(),
            ViewMode::Templates => "q: Quit | a: Add | e: Edit | Space: Show/Hide | d: Del | +/-: Lookahead | t: Timeline".to_string(),
        },
        (_, InputMode::Editing) => "Enter: Save | Esc: Cancel".to_string(),
        (_, InputMode::Adding) => "Enter: Next Step | Esc: Cancel".to_string(),
    };
    let help_style = if app.status.is_some() && app.input_mode == InputMode::Normal {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    };

    let help = Paragraph::new(help_text)
        .style(help_style)
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(help, chunks[1]);

    if app.input_mode != InputMode::Normal {
        let area = centered_rect(60, 3, f.area());
        f.render_widget(Clear, area);

        let title = match app.input_mode {
            InputMode::Adding => {
                let what = match app.view_mode {
                    ViewMode::Timeline => "Add Event",
                    ViewMode::Templates => "Add Template",
                };
                format!("{}: {}", what, app.current_prompt())
            }
            _ => "Edit Title".to_string(),
        };

        let input = Paragraph::new(app.input_buffer.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(input, area);
    }
}

fn focused_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title.to_string())
}

fn header_row(row: &DisplayRow) -> Option<Row<'static>> {
    match row {
        DisplayRow::Year(y) => Some(
            Row::new(vec![Cell::from(y.to_string())])
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        ),
        DisplayRow::Month(m) => {
            let name = (*m as usize).checked_sub(1).and_then(|i| MONTHS.get(i)).copied().unwrap_or("?");
            Some(Row::new(vec![Cell::from(format!("  {name}"))]).style(Style::default().fg(Color::Cyan)))
        }
        _ => None,
    }
}

fn past_row(row: &DisplayRow) -> Row<'static> {
    if let Some(header) = header_row(row) {
        return header;
    }
    match row {
        DisplayRow::Event(e) => Row::new(vec![
            Cell::from(e.date.format("%d %b").to_string()),
            Cell::from(e.title.clone()),
        ])
        .style(Style::default().fg(Color::DarkGray)),
        _ => Row::new(Vec::<Cell>::new()),
    }
}

fn upcoming_row(row: &DisplayRow, now: chrono::NaiveDateTime) -> Row<'static> {
    if let Some(header) = header_row(row) {
        return header;
    }
    match row {
        DisplayRow::Marker(at) => Row::new(vec![
            Cell::from(at.format("%a %d %b").to_string()),
            Cell::from(at.format("%H:%M").to_string()),
            Cell::from("──────── now ────────"),
        ])
        .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        DisplayRow::Event(e) => {
            let running = is_in_progress(e, now);
            let title = if e.is_generated() { format!("{} ↻", e.title) } else { e.title.clone() };
            let style = if running {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(date_span(e)),
                Cell::from(time_span(e.time, e.end_time)),
                Cell::from(title).style(Style::default().fg(color_of(e.color.as_deref()))),
            ])
            .style(style)
        }
        _ => Row::new(Vec::<Cell>::new()),
    }
}

fn date_span(e: &Event) -> String {
    match e.end_date {
        Some(end) if end != e.date => format!("{} → {}", e.date.format("%a %d %b"), end.format("%d %b")),
        _ => e.date.format("%a %d %b").to_string(),
    }
}

fn time_span(start: Option<chrono::NaiveTime>, end: Option<chrono::NaiveTime>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("{}-{}", format_hhmm(s), format_hhmm(e)),
        (Some(s), None) => format_hhmm(s),
        (None, Some(e)) => format!("-{}", format_hhmm(e)),
        (None, None) => "all day".to_string(),
    }
}

fn color_of(color: Option<&str>) -> Color {
    let Some(color) = color else { return Color::Reset };
    if let Some(hex) = color.strip_prefix('#') {
        return u32::from_str_radix(hex, 16)
            .ok()
            .filter(|_| hex.len() == 6)
            .map(Color::from_u32)
            .unwrap_or(Color::Reset);
    }
    match color.to_lowercase().as_str() {
        "blue" => Color::Blue,
        "green" => Color::Green,
        "purple" => Color::Magenta,
        "orange" => Color::LightRed,
        "red" => Color::Red,
        "pink" => Color::LightMagenta,
        "yellow" => Color::Yellow,
        _ => Color::Reset,
    }
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let pad = r.height.saturating_sub(height) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(pad),
            Constraint::Length(height),
            Constraint::Length(pad),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_from_names_and_hex() {
        assert_eq!(color_of(Some("Blue")), Color::Blue);
        assert_eq!(color_of(Some("#ff0000")), Color::Rgb(255, 0, 0));
        assert_eq!(color_of(Some("#ff00")), Color::Reset);
        assert_eq!(color_of(None), Color::Reset);
    }

    #[test]
    fn popup_fits_small_terminals() {
        let area = centered_rect(60, 3, Rect::new(0, 0, 40, 2));
        assert!(area.height <= 3);
    }
}
