//! TUI rendering; orchestrates all panes.

pub mod marking;
pub mod recent;
pub mod report;
pub mod sessions;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};
use rollcall_core::{
  record::AttendanceStatus,
  threshold::{RiskTier, percentage},
};

use crate::app::{App, Screen};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let area = f.area();

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  match app.screen {
    Screen::Sessions => sessions::draw(f, rows[1], app),
    Screen::Marking => marking::draw(f, rows[1], app),
    Screen::Report => report::draw(f, rows[1], app),
    Screen::Recent => recent::draw(f, rows[1], app),
  }
  draw_status(f, rows[2], app);
}

// ─── Shared styling ───────────────────────────────────────────────────────────

pub fn status_style(status: AttendanceStatus) -> Style {
  match status {
    AttendanceStatus::Present => Style::default().fg(Color::Green),
    AttendanceStatus::Absent => Style::default().fg(Color::Red),
  }
}

pub fn risk_style(risk: Option<RiskTier>) -> Style {
  match risk {
    Some(RiskTier::Safe) => Style::default().fg(Color::Green),
    Some(RiskTier::Low) => Style::default().fg(Color::Yellow),
    Some(RiskTier::Critical) => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    None => Style::default().fg(Color::DarkGray),
  }
}

/// `"87%"`, or `"—"` when there is nothing to divide by.
pub fn format_percentage(pct: Option<u8>) -> String {
  pct.map_or_else(|| "—".to_string(), |p| format!("{p}%"))
}

/// Live percentage for an in-progress sheet.
pub fn sheet_percentage(present: usize, total: usize) -> String {
  let clamp = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
  format_percentage(percentage(clamp(present), clamp(total)))
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let today = Local::now().format("%Y-%m-%d").to_string();

  let left = Span::styled(
    format!(" rollcall  {}", app.workflow.date().format("%a %d %b %Y")),
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(
    format!("today {today} "),
    Style::default().fg(Color::Gray),
  );

  let left_width = left.content.chars().count() as u16;
  let right_width = right.content.chars().count() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match app.screen {
    Screen::Marking if app.filter_active => (
      "SEARCH",
      "Type to filter  Esc cancel  Enter keep",
    ),
    Screen::Sessions => (
      "SESSIONS",
      "↑↓/jk select  ←→/hl day  H/L week  t today  Enter mark  c commits  q quit",
    ),
    Screen::Marking => (
      "MARKING",
      "space toggle  P/A all  s submit  r reload  v report  / filter  Esc back",
    ),
    Screen::Report => ("REPORT", "r refresh  Esc back  q quit"),
    Screen::Recent => ("COMMITS", "r refresh  Esc back  q quit"),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::Gray),
  );

  f.render_widget(
    Paragraph::new(Line::from(vec![mode_span, hint_span]))
      .style(Style::default().bg(Color::Black)),
    area,
  );
}
