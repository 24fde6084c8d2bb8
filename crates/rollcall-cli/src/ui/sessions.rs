//! Sessions screen: month strip with markers on the left, the selected day's
//! sessions on the right.

use chrono::{Datelike, Days, NaiveDate};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use rollcall_core::workflow::Phase;

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Length(24), Constraint::Min(0)])
    .split(area);

  draw_calendar(f, cols[0], app);
  draw_sessions(f, cols[1], app);
}

// ─── Calendar ─────────────────────────────────────────────────────────────────

fn draw_calendar(f: &mut Frame, area: Rect, app: &App) {
  let selected = app.workflow.date();
  let block = Block::default()
    .title(format!(" {} ", selected.format("%B %Y")))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let mut lines = vec![Line::from(Span::styled(
    "Mo Tu We Th Fr Sa Su",
    Style::default().fg(Color::DarkGray),
  ))];

  let first = selected.with_day(1).unwrap_or(selected);
  let mut column = first.weekday().num_days_from_monday() as usize;
  let mut spans = vec![Span::raw("   ".repeat(column))];

  let mut day = Some(first);
  while let Some(d) = day.filter(|d| d.month() == selected.month()) {
    let mut style = Style::default();
    if app.workflow.markers().contains(&d) {
      style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
    }
    if d == selected {
      style = style.bg(Color::Blue).fg(Color::White);
    }
    spans.push(Span::styled(format!("{:>2}", d.day()), style));
    spans.push(Span::raw(" "));
    column += 1;
    if column == 7 {
      lines.push(Line::from(std::mem::take(&mut spans)));
      column = 0;
    }
    day = d.checked_add_days(Days::new(1));
  }
  if !spans.is_empty() {
    lines.push(Line::from(spans));
  }

  f.render_widget(Paragraph::new(lines).block(block), area);
}

// ─── Session list ─────────────────────────────────────────────────────────────

fn draw_sessions(f: &mut Frame, area: Rect, app: &App) {
  let sessions = app.workflow.sessions();
  let block = Block::default()
    .title(format!(" Sessions ({}) ", sessions.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  if app.workflow.phase() == Phase::DateSelected {
    let text = if app.workflow.last_error().is_some() {
      "Could not load sessions. Pick the date again to retry."
    } else {
      "Loading…"
    };
    let para = Paragraph::new(text)
      .style(Style::default().fg(Color::DarkGray))
      .block(block);
    f.render_widget(para, area);
    return;
  }

  if sessions.is_empty() {
    let para = Paragraph::new(no_sessions_text(app.workflow.date()))
      .style(Style::default().fg(Color::DarkGray))
      .block(block);
    f.render_widget(para, area);
    return;
  }

  let items: Vec<ListItem> = sessions
    .iter()
    .map(|s| {
      let mut spans = vec![
        Span::styled(
          format!("{}  ", s.start_time.format("%H:%M")),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(format!("{:<24}", s.subject), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("{:<10}", s.kind.as_str())),
        Span::styled(s.audience.to_string(), Style::default().fg(Color::Yellow)),
      ];
      if let Some(room) = &s.room {
        spans.push(Span::styled(format!("  {room}"), Style::default().fg(Color::DarkGray)));
      }
      ListItem::new(Line::from(spans))
    })
    .collect();

  let mut state = ListState::default();
  state.select(Some(app.session_cursor));

  f.render_stateful_widget(
    List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      ),
    area,
    &mut state,
  );
}

fn no_sessions_text(date: NaiveDate) -> String {
  format!("No sessions scheduled on {}.", date.format("%A %d %B"))
}
