//! The `AttendanceStore` trait: the engine's view of its external
//! collaborators.
//!
//! One trait covers the session registry, the roster lookup and record
//! persistence. Storage backends (e.g. `rollcall-store-sqlite`) implement it;
//! the API layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  record::{AttendanceRecord, CommitReceipt, CommitSummary, RecordEntry, StudentRecord},
  roster::Student,
  session::{Audience, ClassSession},
};

// ─── Error classification ────────────────────────────────────────────────────

/// Broad cause of a store failure, used to decide how it is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// A referenced session or student does not exist.
  NotFound,
  /// The request was well-formed but violates an invariant (a student
  /// outside the session's section, a duplicate entry).
  Rejected,
  /// The backend itself failed.
  Backend,
}

/// Errors returned by an [`AttendanceStore`].
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> FailureKind;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an attendance store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: StoreError;

  // ── Session registry ──────────────────────────────────────────────────

  /// All sessions scheduled on `date`.
  fn sessions_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<ClassSession>, Self::Error>> + Send + '_;

  /// All sessions in a calendar month, for calendar markers.
  fn sessions_in_month(
    &self,
    year: i32,
    month: u32,
  ) -> impl Future<Output = Result<Vec<ClassSession>, Self::Error>> + Send + '_;

  /// Retrieve a session by id. Returns `None` if not found.
  fn get_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Option<ClassSession>, Self::Error>> + Send + '_;

  // ── Roster ────────────────────────────────────────────────────────────

  /// Students belonging to `audience`; the full roster for
  /// [`Audience::AllSections`].
  fn roster<'a>(
    &'a self,
    audience: &'a Audience,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + 'a;

  /// Retrieve a student by id. Returns `None` if not found.
  fn get_student(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// Records already committed for a session.
  fn existing_records(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Atomically replace every record of `session_id` with `entries`.
  ///
  /// Either all of `entries` become the session's records, or nothing
  /// changes. Fails if the session is unknown, a student is unknown or
  /// outside the session's audience, or a student appears twice.
  fn commit_records(
    &self,
    session_id: Uuid,
    entries: Vec<RecordEntry>,
  ) -> impl Future<Output = Result<CommitReceipt, Self::Error>> + Send + '_;

  /// Every record for a student, joined with its session where resolvable.
  fn records_for_student(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudentRecord>, Self::Error>> + Send + '_;

  /// The most recent commits, newest first.
  fn recent_commits(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<CommitSummary>, Self::Error>> + Send + '_;
}
