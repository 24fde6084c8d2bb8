//! Recent commits: the audit view of what was marked and when.

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Rect},
  style::{Color, Modifier, Style},
  widgets::{Block, Borders, Cell, Row, Table},
};

use crate::{app::App, ui::format_percentage};

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(format!(" Recent commits ({}) ", app.recent.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let header = Row::new(["committed", "date", "subject", "kind", "audience", "present", "%"])
    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

  let rows = app.recent.iter().map(|c| {
    Row::new([
      Cell::from(c.committed_at.with_timezone(&Local).format("%m-%d %H:%M").to_string()),
      Cell::from(c.date.format("%Y-%m-%d").to_string()),
      Cell::from(c.subject.clone()),
      Cell::from(c.kind.as_str()),
      Cell::from(c.audience.to_string()),
      Cell::from(format!("{}/{}", c.present, c.total)),
      Cell::from(format_percentage(c.percentage)),
    ])
  });

  let widths = [
    Constraint::Length(12),
    Constraint::Length(11),
    Constraint::Min(16),
    Constraint::Length(9),
    Constraint::Length(14),
    Constraint::Length(8),
    Constraint::Length(5),
  ];

  f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}
