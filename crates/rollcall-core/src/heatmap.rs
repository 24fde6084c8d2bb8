//! History projection: lays a student's dated statuses over a fixed trailing
//! calendar window, one cell per day.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  record::{AttendanceStatus, StudentRecord},
};

/// Window length used when the caller does not ask for one.
pub const DEFAULT_WINDOW_DAYS: u32 = 28;

// ─── Cells ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
  Present,
  Absent,
  /// A teaching day with no session recorded for the student.
  NoRecord,
  /// A day the calendar marks as non-teaching, with nothing recorded.
  NonTeachingDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCell {
  pub date:     NaiveDate,
  pub state:    DayState,
  /// How many records were collapsed into this cell.
  pub sessions: u32,
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How several sessions on the same day collapse into a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameDayPolicy {
  /// The day is absent if any session that day was missed.
  #[default]
  AnyAbsent,
  /// The day is present if any session that day was attended.
  AnyPresent,
}

impl SameDayPolicy {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::AnyAbsent => "any_absent",
      Self::AnyPresent => "any_present",
    }
  }

  fn collapse(self, statuses: &[AttendanceStatus]) -> DayState {
    let present = match self {
      Self::AnyAbsent => statuses.iter().all(|s| s.is_present()),
      Self::AnyPresent => statuses.iter().any(|s| s.is_present()),
    };
    if present { DayState::Present } else { DayState::Absent }
  }
}

impl fmt::Display for SameDayPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SameDayPolicy {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "any_absent" => Ok(Self::AnyAbsent),
      "any_present" => Ok(Self::AnyPresent),
      other => Err(Error::UnknownPolicy(other.to_owned())),
    }
  }
}

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HeatmapOptions {
  /// Last day of the window, inclusive.
  pub end:          NaiveDate,
  pub days:         u32,
  pub policy:       SameDayPolicy,
  pub non_teaching: Vec<Weekday>,
}

impl HeatmapOptions {
  /// The default 28-day window ending on `end`, weekends off.
  pub fn trailing(end: NaiveDate) -> Self {
    Self {
      end,
      days: DEFAULT_WINDOW_DAYS,
      policy: SameDayPolicy::default(),
      non_teaching: vec![Weekday::Sat, Weekday::Sun],
    }
  }

  pub fn with_days(mut self, days: u32) -> Self {
    self.days = days;
    self
  }

  pub fn with_policy(mut self, policy: SameDayPolicy) -> Self {
    self.policy = policy;
    self
  }
}

// ─── Heatmap ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCounts {
  pub present:      u32,
  pub absent:       u32,
  pub no_record:    u32,
  pub non_teaching: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heatmap {
  pub start:  NaiveDate,
  pub end:    NaiveDate,
  pub policy: SameDayPolicy,
  /// Oldest first; exactly one cell per day in `start..=end`.
  pub cells:  Vec<DayCell>,
}

impl Heatmap {
  pub fn counts(&self) -> DayCounts {
    let mut counts = DayCounts::default();
    for cell in &self.cells {
      match cell.state {
        DayState::Present => counts.present += 1,
        DayState::Absent => counts.absent += 1,
        DayState::NoRecord => counts.no_record += 1,
        DayState::NonTeachingDay => counts.non_teaching += 1,
      }
    }
    counts
  }

  /// Cells arranged into Monday-first week rows, padded with `None` outside
  /// the window.
  pub fn weeks(&self) -> Vec<[Option<DayCell>; 7]> {
    let mut rows = Vec::new();
    let mut row = [None; 7];
    for cell in &self.cells {
      let col = cell.date.weekday().num_days_from_monday() as usize;
      row[col] = Some(*cell);
      if col == 6 {
        rows.push(row);
        row = [None; 7];
      }
    }
    if row.iter().any(Option::is_some) {
      rows.push(row);
    }
    rows
  }
}

/// The `(date, status)` pairs of a student's records, ready for
/// [`project`]. Records whose session could not be resolved carry no date;
/// they are skipped and logged.
pub fn dated_entries(records: &[StudentRecord]) -> Vec<(NaiveDate, AttendanceStatus)> {
  records
    .iter()
    .filter_map(|r| match &r.session {
      Some(info) => Some((info.date, r.status)),
      None => {
        tracing::warn!(
          student_id = %r.student_id,
          session_id = %r.session_id,
          "excluding attendance record from heatmap: session unresolved"
        );
        None
      }
    })
    .collect()
}

/// Project dated statuses onto the window described by `options`.
///
/// Entries outside the window are ignored. A non-teaching day that does carry
/// a record (a makeup session) shows that record.
pub fn project<I>(entries: I, options: &HeatmapOptions) -> Heatmap
where
  I: IntoIterator<Item = (NaiveDate, AttendanceStatus)>,
{
  let start = options
    .end
    .checked_sub_days(Days::new(u64::from(options.days.saturating_sub(1))))
    .unwrap_or(NaiveDate::MIN);

  let mut by_day: BTreeMap<NaiveDate, Vec<AttendanceStatus>> = BTreeMap::new();
  for (date, status) in entries {
    if date >= start && date <= options.end {
      by_day.entry(date).or_default().push(status);
    }
  }

  let cells = if options.days == 0 {
    Vec::new()
  } else {
    start
      .iter_days()
      .take_while(|d| *d <= options.end)
      .map(|date| {
        let statuses = by_day.get(&date).map(Vec::as_slice).unwrap_or_default();
        let state = if !statuses.is_empty() {
          options.policy.collapse(statuses)
        } else if options.non_teaching.contains(&date.weekday()) {
          DayState::NonTeachingDay
        } else {
          DayState::NoRecord
        };
        DayCell { date, state, sessions: statuses.len() as u32 }
      })
      .collect()
  };

  Heatmap { start, end: options.end, policy: options.policy, cells }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use tracing::{Event, Level, Subscriber};
  use tracing_subscriber::{
    layer::{Context, Layer},
    prelude::*,
  };
  use uuid::Uuid;

  use super::*;
  use crate::record::SessionInfo;
  use crate::session::{Audience, SessionKind};
  use AttendanceStatus::{Absent, Present};

  /// Collects the level of every event it sees.
  struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

  impl<S: Subscriber> Layer<S> for LevelRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
      self.0.lock().unwrap().push(*event.metadata().level());
    }
  }

  fn d(day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 4, day).unwrap() }

  // 2024-04-28 is a Sunday; the default window is 2024-04-01 (Mon) ..= 04-28.
  fn options() -> HeatmapOptions { HeatmapOptions::trailing(d(28)) }

  #[test]
  fn one_cell_per_day_in_window() {
    let map = project(Vec::new(), &options());
    assert_eq!(map.cells.len(), 28);
    assert_eq!(map.start, d(1));
    assert_eq!(map.cells.first().unwrap().date, d(1));
    assert_eq!(map.cells.last().unwrap().date, d(28));
    let counts = map.counts();
    assert_eq!(counts.non_teaching, 8);
    assert_eq!(counts.no_record, 20);
  }

  #[test]
  fn records_map_by_exact_date() {
    let map = project(vec![(d(2), Present), (d(3), Absent)], &options());
    assert_eq!(map.cells[1].state, DayState::Present);
    assert_eq!(map.cells[2].state, DayState::Absent);
    assert_eq!(map.cells[3].state, DayState::NoRecord);
  }

  #[test]
  fn same_day_any_absent_policy() {
    let entries = vec![(d(4), Present), (d(4), Absent), (d(4), Present)];
    let map = project(entries, &options());
    assert_eq!(map.cells[3].state, DayState::Absent);
    assert_eq!(map.cells[3].sessions, 3);
  }

  #[test]
  fn same_day_any_present_policy() {
    let entries = vec![(d(4), Absent), (d(4), Present)];
    let map =
      project(entries, &options().with_policy(SameDayPolicy::AnyPresent));
    assert_eq!(map.cells[3].state, DayState::Present);
  }

  #[test]
  fn weekend_makeup_session_shows_its_record() {
    // 2024-04-06 is a Saturday.
    let map = project(vec![(d(6), Absent)], &options());
    assert_eq!(map.cells[5].state, DayState::Absent);
    assert_eq!(map.cells[6].state, DayState::NonTeachingDay);
  }

  #[test]
  fn entries_outside_window_are_ignored() {
    let before = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let map = project(vec![(before, Absent), (d(29), Absent)], &options());
    assert_eq!(map.counts().absent, 0);
  }

  #[test]
  fn weeks_are_monday_first() {
    let map = project(Vec::new(), &options().with_days(10));
    // 2024-04-19 (Fri) ..= 2024-04-28 (Sun)
    let weeks = map.weeks();
    assert_eq!(weeks.len(), 2);
    assert!(weeks[0][..4].iter().all(Option::is_none));
    assert_eq!(weeks[0][4].unwrap().date, d(19));
    assert_eq!(weeks[1][6].unwrap().date, d(28));
  }

  #[test]
  fn zero_day_window_is_empty() {
    let map = project(vec![(d(28), Present)], &options().with_days(0));
    assert!(map.cells.is_empty());
  }

  #[test]
  fn policy_parses_from_query_form() {
    assert_eq!("any_present".parse::<SameDayPolicy>().unwrap(), SameDayPolicy::AnyPresent);
    assert!("last_write".parse::<SameDayPolicy>().is_err());
  }

  #[test]
  fn unresolved_sessions_are_skipped_with_a_warning() {
    let student = Uuid::new_v4();
    let record = |session: Option<SessionInfo>, status| StudentRecord {
      session_id: Uuid::new_v4(),
      student_id: student,
      status,
      session,
    };
    let records = vec![
      record(
        Some(SessionInfo {
          date:     d(3),
          subject:  "Physics".into(),
          audience: Audience::SectionScoped("A".into()),
          kind:     SessionKind::Lecture,
        }),
        Present,
      ),
      record(None, Absent),
    ];

    let levels = Arc::new(Mutex::new(Vec::new()));
    let subscriber =
      tracing_subscriber::registry().with(LevelRecorder(Arc::clone(&levels)));
    let entries = tracing::subscriber::with_default(subscriber, || dated_entries(&records));

    assert_eq!(entries, vec![(d(3), Present)]);
    assert_eq!(*levels.lock().unwrap(), vec![Level::WARN]);
    let map = project(entries, &options());
    assert_eq!(map.counts().absent, 0);
  }
}
