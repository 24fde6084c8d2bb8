//! Report screen: subject summaries, overall outlook and the attendance
//! heatmap for one student.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};
use rollcall_core::{
  aggregate::AttendanceReport,
  heatmap::{DayState, Heatmap},
  threshold::Outlook,
};

use crate::{
  app::App,
  ui::{format_percentage, risk_style},
};

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(view) = &app.student_view else {
    return;
  };

  let block = Block::default()
    .title(format!(
      " {} · {} · {} ",
      view.student.display_name, view.student.roll_number, view.student.section
    ))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let Some(report) = &view.report else {
    f.render_widget(
      Paragraph::new("Loading…").style(Style::default().fg(Color::DarkGray)),
      inner,
    );
    return;
  };

  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(40), Constraint::Length(30)])
    .split(inner);

  f.render_widget(Paragraph::new(summary_lines(report)), cols[0]);
  if let Some(heatmap) = &view.heatmap {
    f.render_widget(Paragraph::new(heatmap_lines(heatmap)), cols[1]);
  }
}

// ─── Summaries ────────────────────────────────────────────────────────────────

fn outlook_text(outlook: &Outlook) -> String {
  if outlook.required_to_recover > 0 {
    format!("attend next {}", outlook.required_to_recover)
  } else {
    format!("can miss {}", outlook.safe_miss_count)
  }
}

fn summary_lines(report: &AttendanceReport) -> Vec<Line<'static>> {
  let header = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
  let mut lines = vec![
    Line::from(Span::styled(
      format!("target {:.0}%", report.threshold.ratio() * 100.0),
      Style::default().fg(Color::DarkGray),
    )),
    Line::from(""),
    Line::from(Span::styled(
      format!("{:<20}{:<10}{:>9}{:>6}  {}", "subject", "kind", "attended", "%", "outlook"),
      header,
    )),
  ];

  for s in &report.subjects {
    let style = risk_style(s.outlook.risk);
    lines.push(Line::from(vec![
      Span::raw(format!("{:<20}{:<10}", s.subject, s.kind.as_str())),
      Span::raw(format!("{:>9}", format!("{}/{}", s.present_count, s.total_sessions))),
      Span::styled(format!("{:>6}", format_percentage(s.percentage)), style),
      Span::styled(format!("  {}", outlook_text(&s.outlook)), Style::default().fg(Color::Gray)),
    ]));
  }

  let overall = &report.overall;
  lines.push(Line::from(""));
  lines.push(Line::from(vec![
    Span::styled(format!("{:<30}", "overall"), header),
    Span::raw(format!("{:>9}", format!("{}/{}", overall.total_present, overall.total_sessions))),
    Span::styled(
      format!("{:>6}", format_percentage(overall.overall_percentage)),
      risk_style(overall.outlook.risk),
    ),
    Span::styled(
      format!("  {}", outlook_text(&overall.outlook)),
      Style::default().fg(Color::Gray),
    ),
  ]));

  let critical: Vec<_> = report.critical_subjects().map(|s| s.subject.clone()).collect();
  if !critical.is_empty() {
    lines.push(Line::from(Span::styled(
      format!("below target: {}", critical.join(", ")),
      Style::default().fg(Color::Red),
    )));
  }
  if !report.anomalies.is_empty() {
    lines.push(Line::from(Span::styled(
      format!("{} record(s) excluded as inconsistent", report.anomalies.len()),
      Style::default().fg(Color::Yellow),
    )));
  }
  lines
}

// ─── Heatmap ──────────────────────────────────────────────────────────────────

fn cell_style(state: DayState) -> (&'static str, Style) {
  match state {
    DayState::Present => ("██", Style::default().fg(Color::Green)),
    DayState::Absent => ("██", Style::default().fg(Color::Red)),
    DayState::NoRecord => ("░░", Style::default().fg(Color::Gray)),
    DayState::NonTeachingDay => ("  ", Style::default()),
  }
}

fn heatmap_lines(heatmap: &Heatmap) -> Vec<Line<'static>> {
  let mut lines = vec![
    Line::from(Span::styled(
      format!("{} → {}", heatmap.start.format("%d %b"), heatmap.end.format("%d %b")),
      Style::default().fg(Color::DarkGray),
    )),
    Line::from(Span::styled("Mo Tu We Th Fr Sa Su", Style::default().fg(Color::DarkGray))),
  ];

  for week in heatmap.weeks() {
    let spans: Vec<Span> = week
      .iter()
      .flat_map(|cell| {
        let (glyph, style) = cell.map_or(("  ", Style::default()), |c| cell_style(c.state));
        [Span::styled(glyph, style), Span::raw(" ")]
      })
      .collect();
    lines.push(Line::from(spans));
  }

  let counts = heatmap.counts();
  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(
    format!(
      "present {}  absent {}  none {}",
      counts.present, counts.absent, counts.no_record
    ),
    Style::default().fg(Color::Gray),
  )));
  lines
}
