//! Application state and event dispatcher.
//!
//! All network I/O runs on spawned tasks. Each task posts a [`Loaded`]
//! message back to the event loop, which feeds it into the
//! [`MarkingWorkflow`]; responses the workflow no longer expects (the
//! operator moved on) are dropped there.

use std::{future::Future, sync::Arc};

use chrono::{Days, Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use rollcall_core::{
  WorkflowError,
  aggregate::AttendanceReport,
  heatmap::Heatmap,
  record::{AttendanceRecord, AttendanceStatus, CommitReceipt, CommitSummary},
  roster::Student,
  session::{CalendarMonth, ClassSession},
  workflow::{
    CommitRequest, DateChange, MarkersRequest, MarkingWorkflow, Phase, RosterRequest, Ticket,
  },
};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::client::ApiClient;

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  /// Calendar strip plus the sessions on the selected date.
  Sessions,
  /// Roster of the selected session with per-student statuses.
  Marking,
  /// Per-subject summaries and heatmap for one student.
  Report,
  /// The commit audit log.
  Recent,
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// Outcome of a background fetch, delivered to the event loop.
pub enum Loaded {
  Sessions(Ticket, anyhow::Result<Vec<ClassSession>>),
  Markers(MarkersRequest, anyhow::Result<CalendarMonth>),
  Roster(Ticket, anyhow::Result<(Vec<Student>, Vec<AttendanceRecord>)>),
  Commit(Ticket, anyhow::Result<CommitReceipt>),
  Report(Uuid, anyhow::Result<(AttendanceReport, Heatmap)>),
  Recent(anyhow::Result<Vec<CommitSummary>>),
}

/// A student's report as shown on the report screen.
pub struct StudentView {
  pub student: Student,
  pub report:  Option<AttendanceReport>,
  pub heatmap: Option<Heatmap>,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Current screen / keyboard focus.
  pub screen: Screen,

  /// Date, session and sheet state.
  pub workflow: MarkingWorkflow,

  /// Cursor within `workflow.sessions()`.
  pub session_cursor: usize,

  /// Cursor within the *filtered* roster.
  pub roster_cursor: usize,

  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// The student on the report screen.
  pub student_view: Option<StudentView>,

  /// Screen to return to from the report.
  pub report_return: Screen,

  /// Latest audit log page.
  pub recent: Vec<CommitSummary>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Target ratio sent with report requests; server default when `None`.
  pub target: Option<f64>,

  /// Rows requested for the audit view.
  pub recent_limit: usize,

  /// Shared HTTP client.
  pub client: Arc<ApiClient>,

  tx: UnboundedSender<Loaded>,
}

impl App {
  pub fn new(client: ApiClient, workflow: MarkingWorkflow, tx: UnboundedSender<Loaded>) -> Self {
    Self {
      screen: Screen::Sessions,
      workflow,
      session_cursor: 0,
      roster_cursor: 0,
      filter: String::new(),
      filter_active: false,
      student_view: None,
      report_return: Screen::Marking,
      recent: Vec::new(),
      status_msg: String::new(),
      target: None,
      recent_limit: 20,
      client: Arc::new(client),
      tx,
    }
  }

  // ── Background fetches ────────────────────────────────────────────────────

  fn spawn<F>(&self, fut: F)
  where
    F: Future<Output = Loaded> + Send + 'static,
  {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      // The receiver only goes away on shutdown.
      let _ = tx.send(fut.await);
    });
  }

  /// Move to `date` and fetch its sessions (and month markers if needed).
  pub fn go_to_date(&mut self, date: NaiveDate) {
    match self.workflow.select_date(date) {
      Ok(change) => {
        self.session_cursor = 0;
        self.screen = Screen::Sessions;
        self.status_msg = "Loading sessions…".into();
        self.fetch_date(change);
      }
      Err(e) => self.status_msg = e.to_string(),
    }
  }

  fn fetch_date(&self, change: DateChange) {
    let DateChange { sessions, markers } = change;
    let client = Arc::clone(&self.client);
    self.spawn(async move {
      Loaded::Sessions(sessions.ticket, client.sessions_on(sessions.date).await)
    });
    if let Some(req) = markers {
      let client = Arc::clone(&self.client);
      self.spawn(async move { Loaded::Markers(req, client.calendar(req.year, req.month).await) });
    }
  }

  fn fetch_roster(&mut self, req: RosterRequest) {
    self.roster_cursor = 0;
    self.filter.clear();
    self.filter_active = false;
    self.screen = Screen::Marking;
    self.status_msg = format!("Resolving roster for {}…", req.session.subject);
    let client = Arc::clone(&self.client);
    self.spawn(async move {
      Loaded::Roster(req.ticket, client.resolve_session(req.session.session_id).await)
    });
  }

  fn fetch_commit(&mut self, req: CommitRequest) {
    self.status_msg = format!("Committing {} records…", req.entries.len());
    let client = Arc::clone(&self.client);
    self.spawn(async move {
      Loaded::Commit(req.ticket, client.commit(req.session_id, &req.entries).await)
    });
  }

  fn fetch_report(&mut self, student: Student) {
    let client = Arc::clone(&self.client);
    let (id, target) = (student.student_id, self.target);
    self.report_return = self.screen;
    self.student_view = Some(StudentView { student, report: None, heatmap: None });
    self.screen = Screen::Report;
    self.spawn(async move {
      let result = tokio::try_join!(client.report(id, target), client.heatmap(id, None));
      Loaded::Report(id, result)
    });
  }

  fn fetch_recent(&self) {
    let client = Arc::clone(&self.client);
    let limit = self.recent_limit;
    self.spawn(async move { Loaded::Recent(client.recent_commits(limit).await) });
  }

  // ── Applying results ──────────────────────────────────────────────────────

  /// Feed a finished fetch into the workflow.
  pub fn handle_loaded(&mut self, msg: Loaded) {
    let outcome = match msg {
      Loaded::Sessions(ticket, Ok(sessions)) => {
        self.workflow.sessions_loaded(ticket, sessions).map(|deep| {
          self.session_cursor = 0;
          self.status_msg = format!("{} sessions", self.workflow.sessions().len());
          if let Some(req) = deep {
            self.fetch_roster(req);
          }
        })
      }
      Loaded::Sessions(ticket, Err(e)) => self.workflow.sessions_failed(ticket, e.to_string()),
      Loaded::Markers(req, result) => {
        match result {
          Ok(month) => {
            self.workflow.markers_loaded(req, &month.sessions);
          }
          Err(e) => {
            tracing::warn!(error = %e, "calendar markers unavailable");
            self.workflow.markers_failed(req);
          }
        }
        Ok(())
      }
      Loaded::Roster(ticket, Ok((roster, existing))) => {
        self.workflow.roster_resolved(ticket, roster, existing).map(|()| {
          self.status_msg = match self.workflow.sheet() {
            Some(sheet) if sheet.was_prefilled() => "Loaded previous commit".into(),
            _ => String::new(),
          };
        })
      }
      Loaded::Roster(ticket, Err(e)) => {
        self.workflow.resolution_failed(ticket, e.to_string()).map(|()| {
          self.screen = Screen::Sessions;
        })
      }
      Loaded::Commit(ticket, Ok(receipt)) => {
        self.workflow.commit_succeeded(ticket, receipt).map(|()| {
          self.fetch_recent();
        })
      }
      Loaded::Commit(ticket, Err(e)) => self.workflow.commit_failed(ticket, e.to_string()),
      Loaded::Report(id, result) => {
        match (&mut self.student_view, result) {
          (Some(view), Ok((report, heatmap))) if view.student.student_id == id => {
            view.report = Some(report);
            view.heatmap = Some(heatmap);
          }
          (Some(view), Err(e)) if view.student.student_id == id => {
            self.status_msg = format!("Error: {e}");
          }
          _ => tracing::debug!(%id, "dropping report for a student no longer shown"),
        }
        Ok(())
      }
      Loaded::Recent(Ok(commits)) => {
        self.recent = commits;
        Ok(())
      }
      Loaded::Recent(Err(e)) => {
        self.status_msg = format!("Error: {e}");
        Ok(())
      }
    };

    match outcome {
      Ok(()) => {}
      Err(WorkflowError::Stale(ticket)) => {
        tracing::debug!(?ticket, "discarded stale response");
      }
      Err(e) => self.status_msg = e.to_string(),
    }
    if let Some(err) = self.workflow.last_error() {
      self.status_msg = format!("Error: {err}");
    }
  }

  // ── Filtered roster ───────────────────────────────────────────────────────

  /// Roster students that match the current filter query.
  pub fn filtered_roster(&self) -> Vec<&Student> {
    let Some(sheet) = self.workflow.sheet() else {
      return Vec::new();
    };
    if self.filter.is_empty() {
      return sheet.roster().iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    sheet
      .roster()
      .iter()
      .filter(|s| {
        matcher.fuzzy_match(&s.display_name, &self.filter).is_some()
          || matcher.fuzzy_match(&s.roll_number, &self.filter).is_some()
      })
      .collect()
  }

  /// The student under the roster cursor in the filtered view, if any.
  pub fn cursor_student(&self) -> Option<&Student> {
    self.filtered_roster().get(self.roster_cursor).copied()
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return false;
    }

    if self.filter_active {
      self.handle_filter_key(key);
      return true;
    }

    match self.screen {
      Screen::Sessions => self.handle_sessions_key(key),
      Screen::Marking => self.handle_marking_key(key),
      Screen::Report => self.handle_report_key(key),
      Screen::Recent => self.handle_recent_key(key),
    }
  }

  fn handle_filter_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
      }
      KeyCode::Enter => self.filter_active = false,
      KeyCode::Backspace => {
        self.filter.pop();
      }
      KeyCode::Char(c) => self.filter.push(c),
      _ => {}
    }
    self.roster_cursor = 0;
  }

  fn handle_sessions_key(&mut self, key: KeyEvent) -> bool {
    let date = self.workflow.date();
    match key.code {
      KeyCode::Char('q') => return false,

      KeyCode::Down | KeyCode::Char('j') => {
        if self.session_cursor + 1 < self.workflow.sessions().len() {
          self.session_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.session_cursor = self.session_cursor.saturating_sub(1);
      }

      // Day navigation
      KeyCode::Left | KeyCode::Char('h') => {
        if let Some(prev) = date.checked_sub_days(Days::new(1)) {
          self.go_to_date(prev);
        }
      }
      KeyCode::Right | KeyCode::Char('l') => {
        if let Some(next) = date.checked_add_days(Days::new(1)) {
          self.go_to_date(next);
        }
      }
      KeyCode::Char('H') => {
        if let Some(prev) = date.checked_sub_days(Days::new(7)) {
          self.go_to_date(prev);
        }
      }
      KeyCode::Char('L') => {
        if let Some(next) = date.checked_add_days(Days::new(7)) {
          self.go_to_date(next);
        }
      }
      KeyCode::Char('t') => self.go_to_date(Local::now().date_naive()),

      KeyCode::Enter => {
        let id = self.workflow.sessions().get(self.session_cursor).map(|s| s.session_id);
        if let Some(id) = id {
          match self.workflow.select_session(id) {
            Ok(req) => self.fetch_roster(req),
            Err(e) => self.status_msg = e.to_string(),
          }
        }
      }

      KeyCode::Char('c') => self.open_recent(),
      _ => {}
    }
    true
  }

  fn handle_marking_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,

      KeyCode::Esc => match self.workflow.back() {
        Ok(()) => {
          self.screen = Screen::Sessions;
          self.status_msg.clear();
        }
        Err(e) => self.status_msg = e.to_string(),
      },

      KeyCode::Down | KeyCode::Char('j') => {
        if self.roster_cursor + 1 < self.filtered_roster().len() {
          self.roster_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.roster_cursor = self.roster_cursor.saturating_sub(1);
      }

      KeyCode::Char(' ') => {
        if let Some(id) = self.cursor_student().map(|s| s.student_id)
          && let Err(e) = self.workflow.toggle(id)
        {
          self.status_msg = e.to_string();
        }
      }
      KeyCode::Char('P') => self.bulk(AttendanceStatus::Present),
      KeyCode::Char('A') => self.bulk(AttendanceStatus::Absent),

      KeyCode::Char('s') => match self.workflow.begin_commit() {
        Ok(req) => self.fetch_commit(req),
        Err(e) => self.status_msg = e.to_string(),
      },
      KeyCode::Char('r') => match self.workflow.reload() {
        Ok(req) => self.fetch_roster(req),
        Err(e) => self.status_msg = e.to_string(),
      },

      KeyCode::Char('v') => {
        if let Some(student) = self.cursor_student().cloned() {
          self.fetch_report(student);
        }
      }
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.roster_cursor = 0;
      }
      KeyCode::Char('c') => self.open_recent(),
      _ => {}
    }
    true
  }

  fn handle_report_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,
      KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => {
        self.student_view = None;
        self.screen = self.report_return;
      }
      KeyCode::Char('r') => {
        if let Some(student) = self.student_view.take().map(|v| v.student) {
          self.screen = self.report_return;
          self.fetch_report(student);
        }
      }
      _ => {}
    }
    true
  }

  fn handle_recent_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,
      KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => {
        self.screen = if self.workflow.sheet().is_some() {
          Screen::Marking
        } else {
          Screen::Sessions
        };
      }
      KeyCode::Char('r') => self.fetch_recent(),
      _ => {}
    }
    true
  }

  fn bulk(&mut self, status: AttendanceStatus) {
    match self.workflow.apply_bulk(status) {
      Ok(()) => self.status_msg = format!("Marked everyone {status}"),
      Err(e) => self.status_msg = e.to_string(),
    }
  }

  fn open_recent(&mut self) {
    self.screen = Screen::Recent;
    self.fetch_recent();
  }

  /// Whether the marking screen should show a spinner instead of the roster.
  pub fn resolving(&self) -> bool { self.workflow.phase() == Phase::SessionSelected }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveTime;
  use rollcall_core::session::{Audience, SessionKind};
  use tokio::sync::mpsc;

  use super::*;
  use crate::client::ApiConfig;

  fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 9, 12).unwrap() }

  fn key(code: KeyCode) -> KeyEvent { KeyEvent::new(code, KeyModifiers::NONE) }

  fn app() -> (App, mpsc::UnboundedReceiver<Loaded>) {
    let client = ApiClient::new(ApiConfig {
      // Nothing listens here; spawned fetches fail fast.
      base_url: "http://127.0.0.1:9".into(),
      username: String::new(),
      password: String::new(),
    })
    .unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    (App::new(client, MarkingWorkflow::new(day()), tx), rx)
  }

  fn session() -> ClassSession {
    ClassSession {
      session_id: Uuid::new_v4(),
      date:       day(),
      subject:    "Chemistry".into(),
      audience:   Audience::SectionScoped("A".into()),
      kind:       SessionKind::Tutorial,
      start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
      room:       None,
    }
  }

  fn student(name: &str, roll: &str) -> Student {
    Student {
      student_id:   Uuid::new_v4(),
      display_name: name.into(),
      roll_number:  roll.into(),
      section:      "A".into(),
    }
  }

  /// Drive the app to the marking screen with a resolved roster.
  fn resolved(app: &mut App, roster: Vec<Student>) -> ClassSession {
    let change = app.workflow.select_date(day()).unwrap();
    let chem = session();
    app.handle_loaded(Loaded::Sessions(change.sessions.ticket, Ok(vec![chem.clone()])));
    let req = app.workflow.select_session(chem.session_id).unwrap();
    app.screen = Screen::Marking;
    app.handle_loaded(Loaded::Roster(req.ticket, Ok((roster, Vec::new()))));
    chem
  }

  #[tokio::test]
  async fn stale_roster_response_is_dropped() {
    let (mut app, _rx) = app();
    let change = app.workflow.select_date(day()).unwrap();
    let chem = session();
    app.handle_loaded(Loaded::Sessions(change.sessions.ticket, Ok(vec![chem.clone()])));

    let first = app.workflow.select_session(chem.session_id).unwrap();
    let second = app.workflow.reload().unwrap();
    app.handle_loaded(Loaded::Roster(first.ticket, Ok((vec![student("Old", "1")], vec![]))));
    assert!(app.workflow.sheet().is_none());

    app.handle_loaded(Loaded::Roster(second.ticket, Ok((vec![student("New", "1")], vec![]))));
    let sheet = app.workflow.sheet().unwrap();
    assert_eq!(sheet.roster()[0].display_name, "New");
  }

  #[tokio::test]
  async fn failed_markers_are_fetched_again_on_next_date_change() {
    let (mut app, _rx) = app();
    let change = app.workflow.select_date(day()).unwrap();
    let req = change.markers.unwrap();
    app.handle_loaded(Loaded::Markers(req, Err(anyhow::anyhow!("connection refused"))));

    let next = app.workflow.select_date(day().succ_opt().unwrap()).unwrap();
    assert_eq!(next.markers, Some(req));
  }

  #[tokio::test]
  async fn space_toggles_and_bulk_overwrites() {
    let (mut app, _rx) = app();
    resolved(&mut app, vec![student("Ada", "1"), student("Bo", "2")]);

    app.handle_key(key(KeyCode::Char(' ')));
    let first = app.cursor_student().unwrap().student_id;
    assert_eq!(app.workflow.sheet().unwrap().status_of(first), Some(AttendanceStatus::Absent));

    app.handle_key(key(KeyCode::Char('A')));
    assert_eq!(app.workflow.sheet().unwrap().present_count(), 0);
    app.handle_key(key(KeyCode::Char('P')));
    assert_eq!(app.workflow.sheet().unwrap().present_count(), 2);
    assert_eq!(app.workflow.phase(), Phase::Editing);
  }

  #[tokio::test]
  async fn filter_narrows_roster() {
    let (mut app, _rx) = app();
    resolved(&mut app, vec![student("Ada Lovelace", "CS-1"), student("Bo Diddley", "CS-2")]);

    app.handle_key(key(KeyCode::Char('/')));
    for c in "ada".chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
    let names: Vec<_> = app.filtered_roster().iter().map(|s| s.display_name.clone()).collect();
    assert_eq!(names, vec!["Ada Lovelace"]);
  }

  #[tokio::test]
  async fn failed_commit_keeps_edits_for_retry() {
    let (mut app, _rx) = app();
    resolved(&mut app, vec![student("Ada", "1")]);
    app.handle_key(key(KeyCode::Char(' ')));

    let req = app.workflow.begin_commit().unwrap();
    app.handle_loaded(Loaded::Commit(req.ticket, Err(anyhow::anyhow!("PUT → 422: nope"))));
    assert_eq!(app.workflow.phase(), Phase::Failed);
    assert!(app.status_msg.contains("nope"));
    assert_eq!(app.workflow.sheet().unwrap().present_count(), 0);

    // retry is allowed from Failed
    assert!(app.workflow.begin_commit().is_ok());
  }

  #[tokio::test]
  async fn failed_resolution_returns_to_sessions() {
    let (mut app, _rx) = app();
    let change = app.workflow.select_date(day()).unwrap();
    let chem = session();
    app.handle_loaded(Loaded::Sessions(change.sessions.ticket, Ok(vec![chem.clone()])));
    let req = app.workflow.select_session(chem.session_id).unwrap();
    app.screen = Screen::Marking;

    app.handle_loaded(Loaded::Roster(req.ticket, Err(anyhow::anyhow!("roster down"))));
    assert_eq!(app.screen, Screen::Sessions);
    assert_eq!(app.workflow.phase(), Phase::SessionsLoaded);
    assert!(app.status_msg.contains("roster down"));
  }
}
