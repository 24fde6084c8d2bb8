//! Class sessions: scheduled teaching instances owned by the scheduling
//! collaborator.
//!
//! A session is created before any attendance can be recorded for it and is
//! immutable from this engine's perspective.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The teaching format of a session.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
  Lecture,
  Lab,
  Tutorial,
}

impl SessionKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Lecture => "lecture",
      Self::Lab => "lab",
      Self::Tutorial => "tutorial",
    }
  }
}

impl fmt::Display for SessionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SessionKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "lecture" => Ok(Self::Lecture),
      "lab" => Ok(Self::Lab),
      "tutorial" => Ok(Self::Tutorial),
      other => Err(Error::UnknownSessionKind(other.to_owned())),
    }
  }
}

// ─── Audience ────────────────────────────────────────────────────────────────

/// Which students a session is taught to.
///
/// A session either targets one section, or is open to every section (in
/// which case the full roster is expected to attend).
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(tag = "scope", content = "section", rename_all = "snake_case")]
pub enum Audience {
  SectionScoped(String),
  AllSections,
}

impl Audience {
  /// The section this audience is scoped to, if any.
  pub fn section(&self) -> Option<&str> {
    match self {
      Self::SectionScoped(section) => Some(section),
      Self::AllSections => None,
    }
  }

  /// Whether a student from `section` belongs to this audience.
  pub fn admits(&self, section: &str) -> bool {
    match self {
      Self::SectionScoped(own) => own == section,
      Self::AllSections => true,
    }
  }
}

impl fmt::Display for Audience {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SectionScoped(section) => f.write_str(section),
      Self::AllSections => f.write_str("all sections"),
    }
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One scheduled occurrence of a subject, on a date, for an audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
  pub session_id: Uuid,
  pub date:       NaiveDate,
  pub subject:    String,
  pub audience:   Audience,
  pub kind:       SessionKind,
  /// Display metadata only; never used in threshold math.
  pub start_time: NaiveTime,
  pub room:       Option<String>,
}

// ─── Calendar helpers ────────────────────────────────────────────────────────

/// The half-open date range `[first, first_of_next)` covering a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
  let invalid = || Error::InvalidMonth { year, month };
  let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
  let next = if month == 12 {
    NaiveDate::from_ymd_opt(year + 1, 1, 1)
  } else {
    NaiveDate::from_ymd_opt(year, month + 1, 1)
  }
  .ok_or_else(invalid)?;
  Ok((first, next))
}

/// `(year, month)` of a date, the key used for calendar markers.
pub fn month_of(date: NaiveDate) -> (i32, u32) { (date.year(), date.month()) }

/// Sessions of one calendar month plus the distinct dates that carry at least
/// one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMonth {
  pub year:         i32,
  pub month:        u32,
  /// Sorted ascending, no duplicates.
  pub marked_dates: Vec<NaiveDate>,
  pub sessions:     Vec<ClassSession>,
}

impl CalendarMonth {
  pub fn new(year: i32, month: u32, sessions: Vec<ClassSession>) -> Self {
    let mut marked_dates: Vec<_> = sessions
      .iter()
      .map(|s| s.date)
      .filter(|d| month_of(*d) == (year, month))
      .collect();
    marked_dates.sort_unstable();
    marked_dates.dedup();
    Self { year, month, marked_dates, sessions }
  }
}
