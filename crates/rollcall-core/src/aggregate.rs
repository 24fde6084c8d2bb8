//! The aggregation engine: folds one student's attendance records into
//! per-subject summaries and an overall summary.
//!
//! Summaries are derived, never stored. Records that cannot be attributed to a
//! subject are reported as [`Anomaly`] values and logged; they never abort the
//! aggregation of the student's remaining records.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  record::StudentRecord,
  session::{Audience, SessionKind},
  threshold::{Outlook, Threshold, percentage},
};

// ─── Summaries ───────────────────────────────────────────────────────────────

/// Attendance for one `(subject, audience, kind)` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
  pub subject:        String,
  pub audience:       Audience,
  pub kind:           SessionKind,
  pub total_sessions: u32,
  pub present_count:  u32,
  /// Always `total_sessions - present_count`.
  pub absent_count:   u32,
  /// `None` only when `total_sessions` is zero.
  pub percentage:     Option<u8>,
  pub outlook:        Outlook,
}

/// Sums across every subject for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallSummary {
  pub total_present:      u32,
  pub total_sessions:     u32,
  /// Computed from the summed counts, not by averaging subject percentages.
  pub overall_percentage: Option<u8>,
  pub outlook:            Outlook,
}

// ─── Anomalies ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
  /// The record's session does not exist in the registry.
  UnresolvedSession,
  /// The session exists but carries a blank subject.
  MissingSubject,
  /// The session is section-scoped to a blank section.
  MissingSection,
  /// A second record for a session already counted.
  DuplicateRecord,
  /// The record belongs to another student.
  ForeignStudent,
}

/// A record excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
  pub session_id: Uuid,
  pub kind:       AnomalyKind,
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Everything the engine derives for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceReport {
  pub student_id: Uuid,
  pub threshold:  Threshold,
  /// Ordered by subject, then audience, then kind.
  pub subjects:   Vec<SubjectSummary>,
  pub overall:    OverallSummary,
  pub anomalies:  Vec<Anomaly>,
}

impl AttendanceReport {
  /// Subjects whose percentage falls below the target; these drive warnings.
  pub fn critical_subjects(&self) -> impl Iterator<Item = &SubjectSummary> {
    self.subjects.iter().filter(|s| {
      s.percentage
        .is_some_and(|p| !self.threshold.is_met_by_percentage(p))
    })
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
  present: u32,
  total:   u32,
}

/// Aggregate `records` for `student_id` against `threshold`.
pub fn aggregate(
  student_id: Uuid,
  records: &[StudentRecord],
  threshold: Threshold,
) -> AttendanceReport {
  let mut groups: BTreeMap<(String, Audience, SessionKind), Tally> =
    BTreeMap::new();
  let mut seen = HashSet::new();
  let mut anomalies = Vec::new();

  for record in records {
    let kind = if record.student_id != student_id {
      Some(AnomalyKind::ForeignStudent)
    } else {
      match &record.session {
        None => Some(AnomalyKind::UnresolvedSession),
        Some(info) if info.subject.trim().is_empty() => {
          Some(AnomalyKind::MissingSubject)
        }
        Some(info)
          if info.audience.section().is_some_and(|s| s.trim().is_empty()) =>
        {
          Some(AnomalyKind::MissingSection)
        }
        Some(_) if !seen.insert(record.session_id) => {
          Some(AnomalyKind::DuplicateRecord)
        }
        Some(_) => None,
      }
    };

    if let Some(kind) = kind {
      tracing::warn!(
        %student_id,
        session_id = %record.session_id,
        ?kind,
        "excluding attendance record from aggregation"
      );
      anomalies.push(Anomaly { session_id: record.session_id, kind });
      continue;
    }

    // Checked above: only resolvable sessions reach this point.
    let Some(info) = &record.session else { continue };
    let tally = groups
      .entry((info.subject.clone(), info.audience.clone(), info.kind))
      .or_default();
    tally.total += 1;
    if record.status.is_present() {
      tally.present += 1;
    }
  }

  let subjects: Vec<SubjectSummary> = groups
    .into_iter()
    .map(|((subject, audience, kind), tally)| SubjectSummary {
      subject,
      audience,
      kind,
      total_sessions: tally.total,
      present_count: tally.present,
      absent_count: tally.total - tally.present,
      percentage: percentage(tally.present, tally.total),
      outlook: Outlook::compute(tally.present, tally.total, threshold),
    })
    .collect();

  let total_present = subjects.iter().map(|s| s.present_count).sum();
  let total_sessions = subjects.iter().map(|s| s.total_sessions).sum();

  AttendanceReport {
    student_id,
    threshold,
    subjects,
    overall: OverallSummary {
      total_present,
      total_sessions,
      overall_percentage: percentage(total_present, total_sessions),
      outlook: Outlook::compute(total_present, total_sessions, threshold),
    },
    anomalies,
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    record::{AttendanceStatus, SessionInfo},
    threshold::RiskTier,
  };

  fn info(subject: &str, section: &str, day: u32) -> SessionInfo {
    SessionInfo {
      date:     NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
      subject:  subject.into(),
      audience: Audience::SectionScoped(section.into()),
      kind:     SessionKind::Lecture,
    }
  }

  fn records(
    student: Uuid,
    subject: &str,
    present: u32,
    total: u32,
  ) -> Vec<StudentRecord> {
    (0..total)
      .map(|i| StudentRecord {
        session_id: Uuid::new_v4(),
        student_id: student,
        status:     if i < present {
          AttendanceStatus::Present
        } else {
          AttendanceStatus::Absent
        },
        session:    Some(info(subject, "A", 1 + i % 28)),
      })
      .collect()
  }

  #[test]
  fn overall_is_weighted_by_session_count() {
    let student = Uuid::new_v4();
    let mut all = records(student, "Algorithms", 10, 10);
    all.extend(records(student, "Databases", 5, 20));

    let report = aggregate(student, &all, Threshold::DEFAULT);

    assert_eq!(report.subjects.len(), 2);
    assert_eq!(report.subjects[0].subject, "Algorithms");
    assert_eq!(report.subjects[0].percentage, Some(100));
    assert_eq!(report.subjects[1].percentage, Some(25));
    assert_eq!(report.overall.total_present, 15);
    assert_eq!(report.overall.total_sessions, 30);
    assert_eq!(report.overall.overall_percentage, Some(50));
  }

  #[test]
  fn counts_are_consistent() {
    let student = Uuid::new_v4();
    let report =
      aggregate(student, &records(student, "Physics", 7, 12), Threshold::DEFAULT);
    let s = &report.subjects[0];
    assert_eq!(s.present_count + s.absent_count, s.total_sessions);
    assert_eq!(s.absent_count, 5);
    assert_eq!(s.outlook.risk, Some(RiskTier::Critical));
  }

  #[test]
  fn groups_split_by_kind_and_section() {
    let student = Uuid::new_v4();
    let mut all = records(student, "Chemistry", 3, 4);
    let mut lab = records(student, "Chemistry", 1, 2);
    for r in &mut lab {
      if let Some(info) = r.session.as_mut() {
        info.kind = SessionKind::Lab;
      }
    }
    all.extend(lab);
    let mut other_section = records(student, "Chemistry", 1, 1);
    for r in &mut other_section {
      if let Some(info) = r.session.as_mut() {
        info.audience = Audience::AllSections;
      }
    }
    all.extend(other_section);

    let report = aggregate(student, &all, Threshold::DEFAULT);
    assert_eq!(report.subjects.len(), 3);
    assert_eq!(report.overall.total_sessions, 7);
  }

  #[test]
  fn critical_subjects_are_those_below_target() {
    let student = Uuid::new_v4();
    let mut all = records(student, "Algorithms", 3, 4); // 75
    all.extend(records(student, "Databases", 14, 20)); // 70
    all.extend(records(student, "Networks", 1, 4)); // 25
    all.extend(records(student, "Compilers", 44, 59)); // 74.6, reported as 75

    let report = aggregate(student, &all, Threshold::DEFAULT);
    let critical: Vec<_> =
      report.critical_subjects().map(|s| s.subject.as_str()).collect();
    assert_eq!(critical, ["Databases", "Networks"]);
  }

  #[test]
  fn anomalies_are_excluded_not_counted() {
    let student = Uuid::new_v4();
    let mut all = records(student, "Algorithms", 2, 2);
    let orphan = Uuid::new_v4();
    all.push(StudentRecord {
      session_id: orphan,
      student_id: student,
      status:     AttendanceStatus::Absent,
      session:    None,
    });
    all.push(StudentRecord {
      session_id: Uuid::new_v4(),
      student_id: student,
      status:     AttendanceStatus::Absent,
      session:    Some(info("  ", "A", 2)),
    });
    all.push(StudentRecord {
      session_id: Uuid::new_v4(),
      student_id: student,
      status:     AttendanceStatus::Absent,
      session:    Some(info("Algorithms", "", 3)),
    });
    let dup = all[0].clone();
    all.push(dup);
    all.push(StudentRecord {
      student_id: Uuid::new_v4(),
      ..all[1].clone()
    });

    let report = aggregate(student, &all, Threshold::DEFAULT);

    assert_eq!(report.overall.total_sessions, 2);
    assert_eq!(report.overall.overall_percentage, Some(100));
    let kinds: Vec<_> = report.anomalies.iter().map(|a| a.kind).collect();
    assert_eq!(
      kinds,
      [
        AnomalyKind::UnresolvedSession,
        AnomalyKind::MissingSubject,
        AnomalyKind::MissingSection,
        AnomalyKind::DuplicateRecord,
        AnomalyKind::ForeignStudent,
      ]
    );
    assert_eq!(report.anomalies[0].session_id, orphan);
  }

  #[test]
  fn empty_history_yields_no_data() {
    let report = aggregate(Uuid::new_v4(), &[], Threshold::DEFAULT);
    assert!(report.subjects.is_empty());
    assert_eq!(report.overall.total_sessions, 0);
    assert_eq!(report.overall.overall_percentage, None);
    assert_eq!(report.overall.outlook.required_to_recover, 0);
    assert_eq!(report.critical_subjects().count(), 0);
  }
}
