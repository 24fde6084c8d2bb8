//! The session-marking workflow as an explicit state machine.
//!
//! ```text
//! DateSelected → SessionsLoaded → SessionSelected → RosterResolved
//!                                                      ↓
//!                          Committed | Failed ← Submitting ← Editing
//! ```
//!
//! The machine performs no I/O. Every step that needs the outside world hands
//! back a request value carrying a [`Ticket`]; the driver performs the fetch
//! or commit and feeds the outcome back with the same ticket. Only the most
//! recently issued ticket is accepted, so a response that arrives after the
//! operator has navigated elsewhere is discarded instead of being applied to
//! the wrong session.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  WorkflowError,
  record::{AttendanceRecord, AttendanceStatus, CommitReceipt, RecordEntry},
  roster::Student,
  session::{ClassSession, month_of},
};

type Result<T, E = WorkflowError> = std::result::Result<T, E>;

// ─── Tickets and requests ────────────────────────────────────────────────────

/// Identifies one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket(u64);

/// Fetch the sessions scheduled on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionsRequest {
  pub ticket: Ticket,
  pub date:   NaiveDate,
}

/// Fetch every session in a month, for calendar markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkersRequest {
  pub year:  i32,
  pub month: u32,
}

/// What the driver must fetch after a date change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateChange {
  pub sessions: SessionsRequest,
  /// `None` when the markers for the month are already loaded.
  pub markers:  Option<MarkersRequest>,
}

/// Resolve the roster for `session.audience` and load the records already
/// committed for `session.session_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRequest {
  pub ticket:  Ticket,
  pub session: ClassSession,
}

/// Replace every record of `session_id` with `entries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
  pub ticket:     Ticket,
  pub session_id: Uuid,
  pub entries:    Vec<RecordEntry>,
}

// ─── Phase ───────────────────────────────────────────────────────────────────

/// The externally visible state of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  DateSelected,
  SessionsLoaded,
  SessionSelected,
  RosterResolved,
  Editing,
  Submitting,
  Committed,
  Failed,
}

// ─── Sheet ───────────────────────────────────────────────────────────────────

/// Default status for every roster student: `present`, unless a prior commit
/// for the session recorded something else. Records for students no longer
/// on the roster are ignored and will be dropped by the next commit.
pub fn initial_statuses(
  roster: &[Student],
  existing: &[AttendanceRecord],
) -> BTreeMap<Uuid, AttendanceStatus> {
  let prior: BTreeMap<Uuid, AttendanceStatus> = existing
    .iter()
    .map(|r| (r.student_id, r.status))
    .collect();
  roster
    .iter()
    .map(|s| {
      let status = prior.get(&s.student_id).copied().unwrap_or_default();
      (s.student_id, status)
    })
    .collect()
}

/// The in-progress status map for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingSheet {
  session:   ClassSession,
  roster:    Vec<Student>,
  statuses:  BTreeMap<Uuid, AttendanceStatus>,
  prefilled: bool,
}

impl MarkingSheet {
  pub fn new(
    session: ClassSession,
    roster: Vec<Student>,
    existing: &[AttendanceRecord],
  ) -> Self {
    let statuses = initial_statuses(&roster, existing);
    let prefilled = existing
      .iter()
      .any(|r| statuses.contains_key(&r.student_id));
    Self { session, roster, statuses, prefilled }
  }

  pub fn session(&self) -> &ClassSession { &self.session }

  pub fn roster(&self) -> &[Student] { &self.roster }

  /// Whether any status came from a prior commit rather than the default.
  pub fn was_prefilled(&self) -> bool { self.prefilled }

  pub fn status_of(&self, student_id: Uuid) -> Option<AttendanceStatus> {
    self.statuses.get(&student_id).copied()
  }

  pub fn present_count(&self) -> usize {
    self.statuses.values().filter(|s| s.is_present()).count()
  }

  /// The complete commit payload, in roster order.
  pub fn entries(&self) -> Vec<RecordEntry> {
    self
      .roster
      .iter()
      .filter_map(|s| {
        self.status_of(s.student_id).map(|status| RecordEntry {
          student_id: s.student_id,
          status,
        })
      })
      .collect()
  }

  fn slot(&mut self, student_id: Uuid) -> Result<&mut AttendanceStatus> {
    self
      .statuses
      .get_mut(&student_id)
      .ok_or(WorkflowError::UnknownStudent(student_id))
  }

  fn apply_bulk(&mut self, status: AttendanceStatus) {
    for slot in self.statuses.values_mut() {
      *slot = status;
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Stage {
  Resolved,
  Editing,
  Submitting,
  Committed(CommitReceipt),
  Failed(String),
}

#[derive(Debug, Clone)]
enum State {
  DateSelected,
  SessionsLoaded,
  SessionSelected(ClassSession),
  Marking { sheet: MarkingSheet, stage: Stage },
}

/// Operator-driven marking flow for one date at a time.
#[derive(Debug, Clone)]
pub struct MarkingWorkflow {
  date:       NaiveDate,
  sessions:   Vec<ClassSession>,
  markers:    BTreeSet<NaiveDate>,
  marker_key: Option<(i32, u32)>,
  state:      State,
  generation: u64,
  pending:    Option<Ticket>,
  deep_link:  Option<Uuid>,
  last_error: Option<String>,
}

impl MarkingWorkflow {
  /// A workflow parked on `date` with nothing loaded yet. Call
  /// [`select_date`](Self::select_date) to issue the first fetch.
  pub fn new(date: NaiveDate) -> Self {
    Self {
      date,
      sessions: Vec::new(),
      markers: BTreeSet::new(),
      marker_key: None,
      state: State::DateSelected,
      generation: 0,
      pending: None,
      deep_link: None,
      last_error: None,
    }
  }

  /// Pre-select `session_id` as soon as a session list containing it
  /// arrives.
  pub fn with_deep_link(mut self, session_id: Uuid) -> Self {
    self.deep_link = Some(session_id);
    self
  }

  // ── Accessors ─────────────────────────────────────────────────────────────

  pub fn phase(&self) -> Phase {
    match &self.state {
      State::DateSelected => Phase::DateSelected,
      State::SessionsLoaded => Phase::SessionsLoaded,
      State::SessionSelected(_) => Phase::SessionSelected,
      State::Marking { stage, .. } => match stage {
        Stage::Resolved => Phase::RosterResolved,
        Stage::Editing => Phase::Editing,
        Stage::Submitting => Phase::Submitting,
        Stage::Committed(_) => Phase::Committed,
        Stage::Failed(_) => Phase::Failed,
      },
    }
  }

  pub fn date(&self) -> NaiveDate { self.date }

  /// Sessions on the selected date, ordered by start time.
  pub fn sessions(&self) -> &[ClassSession] { &self.sessions }

  /// Dates in the selected month that have at least one session.
  pub fn markers(&self) -> &BTreeSet<NaiveDate> { &self.markers }

  /// The session being resolved or marked, if any.
  pub fn selected_session(&self) -> Option<&ClassSession> {
    match &self.state {
      State::SessionSelected(session) => Some(session),
      State::Marking { sheet, .. } => Some(sheet.session()),
      _ => None,
    }
  }

  pub fn sheet(&self) -> Option<&MarkingSheet> {
    match &self.state {
      State::Marking { sheet, .. } => Some(sheet),
      _ => None,
    }
  }

  pub fn receipt(&self) -> Option<&CommitReceipt> {
    match &self.state {
      State::Marking { stage: Stage::Committed(receipt), .. } => Some(receipt),
      _ => None,
    }
  }

  /// The most recent failure, kept until the next successful step.
  pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

  // ── Tickets ───────────────────────────────────────────────────────────────

  fn issue(&mut self) -> Ticket {
    self.generation += 1;
    let ticket = Ticket(self.generation);
    self.pending = Some(ticket);
    ticket
  }

  fn accept(&mut self, ticket: Ticket) -> Result<()> {
    if self.pending == Some(ticket) {
      self.pending = None;
      Ok(())
    } else {
      Err(WorkflowError::Stale(ticket))
    }
  }

  fn invalid(&self, action: &'static str) -> WorkflowError {
    WorkflowError::InvalidTransition { phase: self.phase(), action }
  }

  fn is_submitting(&self) -> bool {
    matches!(self.state, State::Marking { stage: Stage::Submitting, .. })
  }

  // ── Date selection ────────────────────────────────────────────────────────

  /// Move to `date`, discarding any session or roster in progress.
  pub fn select_date(&mut self, date: NaiveDate) -> Result<DateChange> {
    if self.is_submitting() {
      return Err(self.invalid("change date"));
    }
    self.date = date;
    self.sessions.clear();
    self.state = State::DateSelected;
    self.last_error = None;

    let key = month_of(date);
    let markers = if self.marker_key == Some(key) {
      None
    } else {
      self.markers.clear();
      self.marker_key = Some(key);
      Some(MarkersRequest { year: key.0, month: key.1 })
    };

    let ticket = self.issue();
    Ok(DateChange { sessions: SessionsRequest { ticket, date }, markers })
  }

  /// Apply a session list. Returns a roster request when a deep link
  /// pre-selected one of the sessions.
  pub fn sessions_loaded(
    &mut self,
    ticket: Ticket,
    mut sessions: Vec<ClassSession>,
  ) -> Result<Option<RosterRequest>> {
    if !matches!(self.state, State::DateSelected) {
      return Err(WorkflowError::Stale(ticket));
    }
    self.accept(ticket)?;

    sessions.retain(|s| s.date == self.date);
    sessions.sort_by(|a, b| {
      a.start_time
        .cmp(&b.start_time)
        .then_with(|| a.subject.cmp(&b.subject))
    });
    self.sessions = sessions;
    self.state = State::SessionsLoaded;
    self.last_error = None;

    match self.deep_link {
      Some(id) if self.sessions.iter().any(|s| s.session_id == id) => {
        self.deep_link = None;
        self.select_session(id).map(Some)
      }
      _ => Ok(None),
    }
  }

  /// The session list could not be fetched; stay on the date.
  pub fn sessions_failed(&mut self, ticket: Ticket, reason: String) -> Result<()> {
    if !matches!(self.state, State::DateSelected) {
      return Err(WorkflowError::Stale(ticket));
    }
    self.accept(ticket)?;
    self.last_error = Some(reason);
    Ok(())
  }

  /// Apply calendar markers. Markers for any month other than the selected
  /// date's are ignored; returns whether they were applied.
  pub fn markers_loaded(
    &mut self,
    request: MarkersRequest,
    sessions: &[ClassSession],
  ) -> bool {
    if self.marker_key != Some((request.year, request.month)) {
      return false;
    }
    self.markers = sessions
      .iter()
      .map(|s| s.date)
      .filter(|d| month_of(*d) == (request.year, request.month))
      .collect();
    true
  }

  /// Calendar markers could not be fetched. Forgets the month so the next
  /// [`select_date`](Self::select_date) in it asks again; returns whether the
  /// failure was for the current month.
  pub fn markers_failed(&mut self, request: MarkersRequest) -> bool {
    if self.marker_key != Some((request.year, request.month)) {
      return false;
    }
    self.marker_key = None;
    true
  }

  // ── Session selection ─────────────────────────────────────────────────────

  /// Select a session from the loaded list. Selecting the session that is
  /// already being marked re-resolves it and discards unsaved edits.
  pub fn select_session(&mut self, session_id: Uuid) -> Result<RosterRequest> {
    match self.state {
      State::DateSelected => return Err(self.invalid("select a session")),
      State::Marking { stage: Stage::Submitting, .. } => {
        return Err(self.invalid("select a session"));
      }
      _ => {}
    }
    let session = self
      .sessions
      .iter()
      .find(|s| s.session_id == session_id)
      .cloned()
      .ok_or(WorkflowError::SessionNotFound(session_id))?;

    self.state = State::SessionSelected(session.clone());
    let ticket = self.issue();
    Ok(RosterRequest { ticket, session })
  }

  /// Re-resolve the current session from persisted records, discarding
  /// unsaved edits.
  pub fn reload(&mut self) -> Result<RosterRequest> {
    let session_id = self
      .selected_session()
      .map(|s| s.session_id)
      .ok_or_else(|| self.invalid("reload"))?;
    self.select_session(session_id)
  }

  /// Leave the current session for the session list. Any in-flight roster
  /// fetch becomes stale.
  pub fn back(&mut self) -> Result<()> {
    match self.state {
      State::SessionSelected(_) => {}
      State::Marking { stage: Stage::Submitting, .. } => {
        return Err(self.invalid("leave the session"));
      }
      State::Marking { .. } => {}
      _ => return Err(self.invalid("leave the session")),
    }
    self.state = State::SessionsLoaded;
    self.pending = None;
    Ok(())
  }

  /// Build the sheet from the resolved roster and any prior records.
  pub fn roster_resolved(
    &mut self,
    ticket: Ticket,
    roster: Vec<Student>,
    existing: Vec<AttendanceRecord>,
  ) -> Result<()> {
    let State::SessionSelected(session) = &self.state else {
      return Err(WorkflowError::Stale(ticket));
    };
    let session = session.clone();
    self.accept(ticket)?;

    let existing: Vec<_> = existing
      .into_iter()
      .filter(|r| r.session_id == session.session_id)
      .collect();
    let sheet = MarkingSheet::new(session, roster, &existing);
    self.state = State::Marking { sheet, stage: Stage::Resolved };
    self.last_error = None;
    Ok(())
  }

  /// The roster or prior records could not be loaded; return to the
  /// session list with the error recorded.
  pub fn resolution_failed(&mut self, ticket: Ticket, reason: String) -> Result<()> {
    if !matches!(self.state, State::SessionSelected(_)) {
      return Err(WorkflowError::Stale(ticket));
    }
    self.accept(ticket)?;
    self.state = State::SessionsLoaded;
    self.last_error = Some(reason);
    Ok(())
  }

  // ── Editing ───────────────────────────────────────────────────────────────

  fn editable_sheet(&mut self, action: &'static str) -> Result<&mut MarkingSheet> {
    let phase = self.phase();
    match &mut self.state {
      State::Marking { sheet, stage } if !matches!(stage, Stage::Submitting) => {
        *stage = Stage::Editing;
        Ok(sheet)
      }
      _ => Err(WorkflowError::InvalidTransition { phase, action }),
    }
  }

  /// Flip one student's status; returns the new status.
  pub fn toggle(&mut self, student_id: Uuid) -> Result<AttendanceStatus> {
    self.set_with(student_id, "toggle a student", AttendanceStatus::toggled)
  }

  pub fn set_status(
    &mut self,
    student_id: Uuid,
    status: AttendanceStatus,
  ) -> Result<AttendanceStatus> {
    self.set_with(student_id, "set a status", |_| status)
  }

  fn set_with(
    &mut self,
    student_id: Uuid,
    action: &'static str,
    f: impl FnOnce(AttendanceStatus) -> AttendanceStatus,
  ) -> Result<AttendanceStatus> {
    // Validate before entering Editing so a rejected call changes nothing.
    let on_roster = self
      .sheet()
      .map(|sheet| sheet.status_of(student_id).is_some());
    if on_roster == Some(false) {
      return Err(WorkflowError::UnknownStudent(student_id));
    }
    let slot = self.editable_sheet(action)?.slot(student_id)?;
    *slot = f(*slot);
    Ok(*slot)
  }

  /// Overwrite every status on the sheet with `status`.
  pub fn apply_bulk(&mut self, status: AttendanceStatus) -> Result<()> {
    self.editable_sheet("apply a bulk status")?.apply_bulk(status);
    Ok(())
  }

  // ── Commit ────────────────────────────────────────────────────────────────

  /// Freeze the sheet and produce the full-replace payload.
  pub fn begin_commit(&mut self) -> Result<CommitRequest> {
    let phase = self.phase();
    let (session_id, entries) = match &mut self.state {
      State::Marking { sheet, stage } if !matches!(stage, Stage::Submitting) => {
        *stage = Stage::Submitting;
        (sheet.session.session_id, sheet.entries())
      }
      _ => {
        return Err(WorkflowError::InvalidTransition { phase, action: "commit" });
      }
    };
    let ticket = self.issue();
    Ok(CommitRequest { ticket, session_id, entries })
  }

  pub fn commit_succeeded(
    &mut self,
    ticket: Ticket,
    receipt: CommitReceipt,
  ) -> Result<()> {
    if !self.is_submitting() {
      return Err(WorkflowError::Stale(ticket));
    }
    self.accept(ticket)?;
    if let State::Marking { stage, .. } = &mut self.state {
      *stage = Stage::Committed(receipt);
    }
    self.last_error = None;
    Ok(())
  }

  /// The store rejected the commit. Edits stay on the sheet for a retry.
  pub fn commit_failed(&mut self, ticket: Ticket, reason: String) -> Result<()> {
    if !self.is_submitting() {
      return Err(WorkflowError::Stale(ticket));
    }
    self.accept(ticket)?;
    if let State::Marking { stage, .. } = &mut self.state {
      *stage = Stage::Failed(reason.clone());
    }
    self.last_error = Some(reason);
    Ok(())
  }
}
