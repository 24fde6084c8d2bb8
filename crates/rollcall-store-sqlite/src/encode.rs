//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`,
//! start times as `HH:MM`. UUIDs are stored as hyphenated lowercase strings.
//! An [`Audience`] maps onto the nullable `section` column: `NULL` means the
//! session is open to all sections.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rollcall_core::{
  record::{
    AttendanceRecord, AttendanceStatus, CommitSummary, SessionInfo, StudentRecord,
  },
  roster::Student,
  session::{Audience, ClassSession, SessionKind},
  threshold::percentage,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate / NaiveTime ───────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
/// Rows written before seconds were kept.
const SHORT_TIME_FORMAT: &str = "%H:%M";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format(TIME_FORMAT).to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FORMAT)
    .or_else(|_| NaiveTime::parse_from_str(s, SHORT_TIME_FORMAT))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Audience ────────────────────────────────────────────────────────────────

pub fn encode_audience(a: &Audience) -> Option<String> {
  a.section().map(str::to_owned)
}

pub fn decode_audience(section: Option<String>) -> Audience {
  match section {
    Some(section) => Audience::SectionScoped(section),
    None => Audience::AllSections,
  }
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_status(s: AttendanceStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<AttendanceStatus> { Ok(s.parse()?) }

pub fn encode_kind(k: SessionKind) -> &'static str { k.as_str() }

pub fn decode_kind(s: &str) -> Result<SessionKind> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns selected for every [`RawSession`], in order.
pub const SESSION_COLUMNS: &str =
  "session_id, date, subject, section, kind, start_time, room";

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub session_id: String,
  pub date:       String,
  pub subject:    String,
  pub section:    Option<String>,
  pub kind:       String,
  pub start_time: String,
  pub room:       Option<String>,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id: row.get(0)?,
      date:       row.get(1)?,
      subject:    row.get(2)?,
      section:    row.get(3)?,
      kind:       row.get(4)?,
      start_time: row.get(5)?,
      room:       row.get(6)?,
    })
  }

  pub fn into_session(self) -> Result<ClassSession> {
    Ok(ClassSession {
      session_id: decode_uuid(&self.session_id)?,
      date:       decode_date(&self.date)?,
      subject:    self.subject,
      audience:   decode_audience(self.section),
      kind:       decode_kind(&self.kind)?,
      start_time: decode_time(&self.start_time)?,
      room:       self.room,
    })
  }
}

/// Columns selected for every [`RawStudent`], in order.
pub const STUDENT_COLUMNS: &str = "student_id, display_name, roll_number, section";

/// Raw strings read directly from a `students` row.
pub struct RawStudent {
  pub student_id:   String,
  pub display_name: String,
  pub roll_number:  String,
  pub section:      String,
}

impl RawStudent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:   row.get(0)?,
      display_name: row.get(1)?,
      roll_number:  row.get(2)?,
      section:      row.get(3)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:   decode_uuid(&self.student_id)?,
      display_name: self.display_name,
      roll_number:  self.roll_number,
      section:      self.section,
    })
  }
}

/// Raw strings read directly from an `attendance` row.
pub struct RawRecord {
  pub session_id: String,
  pub student_id: String,
  pub status:     String,
}

impl RawRecord {
  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      session_id: decode_uuid(&self.session_id)?,
      student_id: decode_uuid(&self.student_id)?,
      status:     decode_status(&self.status)?,
    })
  }
}

/// An `attendance` row left-joined with its session.
pub struct RawStudentRecord {
  // attendance columns
  pub session_id: String,
  pub student_id: String,
  pub status:     String,
  // sessions join; all `None` when the session is missing
  pub date:       Option<String>,
  pub subject:    Option<String>,
  pub section:    Option<String>,
  pub kind:       Option<String>,
  pub resolved:   bool,
}

impl RawStudentRecord {
  pub fn into_record(self) -> Result<StudentRecord> {
    let session_id = decode_uuid(&self.session_id)?;
    let session = if self.resolved {
      match decode_info(self.date, self.subject, self.section, self.kind) {
        Ok(info) => Some(info),
        Err(e) => {
          // Leave it to aggregation to exclude and report the record.
          tracing::warn!(%session_id, error = %e, "undecodable session row");
          None
        }
      }
    } else {
      None
    };

    Ok(StudentRecord {
      session_id,
      student_id: decode_uuid(&self.student_id)?,
      status: decode_status(&self.status)?,
      session,
    })
  }
}

fn decode_info(
  date: Option<String>,
  subject: Option<String>,
  section: Option<String>,
  kind: Option<String>,
) -> Result<SessionInfo> {
  let missing = |col: &str| Error::DateParse(format!("session column {col} is NULL"));
  Ok(SessionInfo {
    date:     decode_date(&date.ok_or_else(|| missing("date"))?)?,
    subject:  subject.ok_or_else(|| missing("subject"))?,
    audience: decode_audience(section),
    kind:     decode_kind(&kind.ok_or_else(|| missing("kind"))?)?,
  })
}

/// A `commits` row joined with its session.
pub struct RawCommit {
  pub commit_id:    String,
  pub session_id:   String,
  pub committed_at: String,
  pub present:      u32,
  pub absent:       u32,
  pub revision:     String,
  pub date:         String,
  pub subject:      String,
  pub section:      Option<String>,
  pub kind:         String,
}

impl RawCommit {
  pub fn into_summary(self) -> Result<CommitSummary> {
    let total = self.present + self.absent;
    Ok(CommitSummary {
      commit_id: decode_uuid(&self.commit_id)?,
      session_id: decode_uuid(&self.session_id)?,
      date: decode_date(&self.date)?,
      subject: self.subject,
      audience: decode_audience(self.section),
      kind: decode_kind(&self.kind)?,
      present: self.present,
      absent: self.absent,
      total,
      percentage: percentage(self.present, total),
      committed_at: decode_dt(&self.committed_at)?,
      revision: self.revision,
    })
  }
}
