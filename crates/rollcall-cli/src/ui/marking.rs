//! Marking screen: the resolved roster with each student's status.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use rollcall_core::workflow::Phase;

use crate::{
  app::App,
  ui::{sheet_percentage, status_style},
};

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let title = app
    .workflow
    .selected_session()
    .map(|s| format!(" {} · {} · {} ", s.subject, s.kind, s.audience))
    .unwrap_or_else(|| " Marking ".to_string());

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let Some(sheet) = app.workflow.sheet() else {
    let text = if app.resolving() { "Resolving roster…" } else { "No session selected." };
    let para = Paragraph::new(text)
      .style(Style::default().fg(Color::DarkGray))
      .block(block);
    f.render_widget(para, area);
    return;
  };

  let inner = block.inner(area);
  f.render_widget(block, area);

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // tally
      Constraint::Min(0),    // roster
      Constraint::Length(1), // filter
    ])
    .split(inner);

  // ── Tally ──
  let total = sheet.roster().len();
  let present = sheet.present_count();
  let (phase_label, phase_style) = phase_badge(app.workflow.phase());
  let mut tally = vec![
    Span::styled(format!(" {phase_label} "), phase_style),
    Span::raw(format!(
      "  present {present}  absent {}  {}",
      total - present,
      sheet_percentage(present, total)
    )),
  ];
  if sheet.was_prefilled() {
    tally.push(Span::styled("  (prefilled)", Style::default().fg(Color::DarkGray)));
  }
  if let Some(receipt) = app.workflow.receipt() {
    tally.push(Span::styled(
      format!("  rev {}", &receipt.revision[..receipt.revision.len().min(8)]),
      Style::default().fg(Color::DarkGray),
    ));
  }
  f.render_widget(Paragraph::new(Line::from(tally)), rows[0]);

  // ── Roster ──
  let filtered = app.filtered_roster();
  let items: Vec<ListItem> = filtered
    .iter()
    .map(|student| {
      let status = sheet.status_of(student.student_id).unwrap_or_default();
      let mark = if status.is_present() { "[P]" } else { "[A]" };
      ListItem::new(Line::from(vec![
        Span::styled(format!("{mark} "), status_style(status).add_modifier(Modifier::BOLD)),
        Span::styled(format!("{:<10}", student.roll_number), Style::default().fg(Color::Cyan)),
        Span::raw(student.display_name.clone()),
      ]))
    })
    .collect();

  let mut state = ListState::default();
  state.select((!filtered.is_empty()).then_some(app.roster_cursor));
  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    rows[1],
    &mut state,
  );

  // ── Filter ──
  if app.filter_active || !app.filter.is_empty() {
    let text = if app.filter_active {
      format!("/{}_  ({}/{})", app.filter, filtered.len(), total)
    } else {
      format!("/{}  ({}/{})", app.filter, filtered.len(), total)
    };
    f.render_widget(
      Paragraph::new(text).style(Style::default().fg(Color::Yellow)),
      rows[2],
    );
  }
}

fn phase_badge(phase: Phase) -> (&'static str, Style) {
  let base = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
  match phase {
    Phase::RosterResolved => ("LOADED", base.bg(Color::Gray)),
    Phase::Editing => ("EDITED", base.bg(Color::Yellow)),
    Phase::Submitting => ("SAVING", base.bg(Color::Cyan)),
    Phase::Committed => ("SAVED", base.bg(Color::Green)),
    Phase::Failed => ("FAILED", base.bg(Color::Red)),
    _ => ("…", base.bg(Color::DarkGray)),
  }
}
