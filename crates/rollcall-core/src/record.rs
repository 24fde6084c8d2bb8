//! Attendance records, the atomic fact of the engine, and the shapes they
//! take on the way in (commit payloads) and on the way out (joined reads and
//! the commit audit view).

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  session::{Audience, SessionKind},
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Whether a student attended a session. Asserted by an operator.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  #[default]
  Present,
  Absent,
}

impl AttendanceStatus {
  pub fn is_present(self) -> bool { matches!(self, Self::Present) }

  /// The opposite status.
  pub fn toggled(self) -> Self {
    match self {
      Self::Present => Self::Absent,
      Self::Absent => Self::Present,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Present => "present",
      Self::Absent => "absent",
    }
  }
}

impl fmt::Display for AttendanceStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AttendanceStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "present" => Ok(Self::Present),
      "absent" => Ok(Self::Absent),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One student's status for one session. Unique on
/// `(session_id, student_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub session_id: Uuid,
  pub student_id: Uuid,
  pub status:     AttendanceStatus,
}

/// One element of a commit payload. A commit carries the complete
/// roster-to-status mapping for a session, never a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
  pub student_id: Uuid,
  pub status:     AttendanceStatus,
}

// ─── Joined reads ────────────────────────────────────────────────────────────

/// The parts of a session the aggregation engine groups by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
  pub date:     NaiveDate,
  pub subject:  String,
  pub audience: Audience,
  pub kind:     SessionKind,
}

/// An attendance record joined with its session.
///
/// `session` is `None` when the referenced session could not be resolved;
/// such records are data-integrity anomalies and are excluded from
/// aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
  pub session_id: Uuid,
  pub student_id: Uuid,
  pub status:     AttendanceStatus,
  pub session:    Option<SessionInfo>,
}

// ─── Commits ─────────────────────────────────────────────────────────────────

/// Returned by a successful full-replace commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
  pub commit_id:    Uuid,
  pub session_id:   Uuid,
  pub committed_at: DateTime<Utc>,
  pub present:      u32,
  pub absent:       u32,
  /// Content digest of the committed entries. Two commits of the same
  /// status map for the same session share a revision.
  pub revision:     String,
}

impl CommitReceipt {
  pub fn total(&self) -> u32 { self.present + self.absent }
}

/// One row of the operator-facing recent-commits view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
  pub commit_id:    Uuid,
  pub session_id:   Uuid,
  pub date:         NaiveDate,
  pub subject:      String,
  pub audience:     Audience,
  pub kind:         SessionKind,
  pub present:      u32,
  pub absent:       u32,
  pub total:        u32,
  pub percentage:   Option<u8>,
  pub committed_at: DateTime<Utc>,
  pub revision:     String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toggle_is_an_involution() {
    for status in [AttendanceStatus::Present, AttendanceStatus::Absent] {
      assert_ne!(status.toggled(), status);
      assert_eq!(status.toggled().toggled(), status);
    }
  }

  #[test]
  fn status_parses_its_own_wire_form() {
    assert_eq!("absent".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Absent);
    assert!(matches!(
      "late".parse::<AttendanceStatus>(),
      Err(Error::UnknownStatus(s)) if s == "late"
    ));
  }
}
