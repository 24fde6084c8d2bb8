//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveTime};
use rollcall_core::{
  aggregate::{aggregate, AnomalyKind},
  record::{AttendanceStatus, RecordEntry},
  roster::Student,
  session::{Audience, ClassSession, SessionKind},
  store::{AttendanceStore, FailureKind, StoreError},
  threshold::Threshold,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn add_student(s: &SqliteStore, roll: &str, section: &str) -> Student {
  let student = Student {
    student_id:   Uuid::new_v4(),
    display_name: format!("Student {roll}"),
    roll_number:  roll.into(),
    section:      section.into(),
  };
  s.upsert_student(&student).await.unwrap();
  student
}

async fn add_session(
  s: &SqliteStore,
  on: NaiveDate,
  subject: &str,
  audience: Audience,
) -> ClassSession {
  let session = ClassSession {
    session_id: Uuid::new_v4(),
    date:       on,
    subject:    subject.into(),
    audience,
    kind:       SessionKind::Lecture,
    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    room:       Some("B-204".into()),
  };
  s.upsert_session(&session).await.unwrap();
  session
}

fn entry(student: &Student, status: AttendanceStatus) -> RecordEntry {
  RecordEntry { student_id: student.student_id, status }
}

fn section(name: &str) -> Audience { Audience::SectionScoped(name.into()) }

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_round_trips_through_upsert() {
  let s = store().await;
  let session = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  let fetched = s.get_session(session.session_id).await.unwrap();
  assert_eq!(fetched, Some(session.clone()));

  let mut moved = session.clone();
  moved.room = None;
  moved.audience = Audience::AllSections;
  s.upsert_session(&moved).await.unwrap();
  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.room, None);
  assert_eq!(fetched.audience, Audience::AllSections);
}

#[tokio::test]
async fn start_time_keeps_its_seconds() {
  let s = store().await;
  let mut session = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;
  session.start_time = NaiveTime::from_hms_opt(9, 30, 45).unwrap();
  s.upsert_session(&session).await.unwrap();

  let fetched = s.get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(fetched.start_time, session.start_time);
  assert_eq!(s.sessions_on(date(2024, 3, 4)).await.unwrap(), vec![session]);
}

#[test]
fn start_time_decodes_with_or_without_seconds() {
  use crate::encode::{decode_time, encode_time};

  let t = NaiveTime::from_hms_opt(14, 5, 9).unwrap();
  assert_eq!(encode_time(t), "14:05:09");
  assert_eq!(decode_time("14:05:09").unwrap(), t);
  assert_eq!(decode_time("14:05").unwrap(), NaiveTime::from_hms_opt(14, 5, 0).unwrap());
  assert!(matches!(decode_time("2pm"), Err(Error::DateParse(_))));
}

#[tokio::test]
async fn missing_lookups_return_none() {
  let s = store().await;
  assert!(s.get_session(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.get_student(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn sessions_on_filters_by_day() {
  let s = store().await;
  add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;
  add_session(&s, date(2024, 3, 4), "Maths", Audience::AllSections).await;
  add_session(&s, date(2024, 3, 5), "Physics", section("A")).await;

  let monday = s.sessions_on(date(2024, 3, 4)).await.unwrap();
  assert_eq!(monday.len(), 2);
  assert!(monday.iter().all(|c| c.date == date(2024, 3, 4)));
  assert!(s.sessions_on(date(2024, 3, 6)).await.unwrap().is_empty());
}

#[tokio::test]
async fn sessions_in_month_is_half_open() {
  let s = store().await;
  add_session(&s, date(2024, 1, 31), "Physics", section("A")).await;
  add_session(&s, date(2024, 2, 1), "Physics", section("A")).await;
  add_session(&s, date(2024, 2, 29), "Physics", section("A")).await;
  add_session(&s, date(2024, 3, 1), "Physics", section("A")).await;

  let feb = s.sessions_in_month(2024, 2).await.unwrap();
  let dates: Vec<_> = feb.iter().map(|c| c.date).collect();
  assert_eq!(dates, vec![date(2024, 2, 1), date(2024, 2, 29)]);

  let err = s.sessions_in_month(2024, 13).await.unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

#[tokio::test]
async fn roster_respects_audience() {
  let s = store().await;
  add_student(&s, "02", "A").await;
  add_student(&s, "01", "A").await;
  add_student(&s, "03", "B").await;

  let a = s.roster(&section("A")).await.unwrap();
  let rolls: Vec<_> = a.iter().map(|st| st.roll_number.as_str()).collect();
  assert_eq!(rolls, vec!["01", "02"]);

  let everyone = s.roster(&Audience::AllSections).await.unwrap();
  assert_eq!(everyone.len(), 3);

  assert!(s.roster(&section("Z")).await.unwrap().is_empty());
}

// ─── Commits ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_returns_counts_and_revision() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let b = add_student(&s, "02", "A").await;
  let c = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  let receipt = s
    .commit_records(c.session_id, vec![
      entry(&a, AttendanceStatus::Present),
      entry(&b, AttendanceStatus::Absent),
    ])
    .await
    .unwrap();
  assert_eq!(receipt.session_id, c.session_id);
  assert_eq!((receipt.present, receipt.absent, receipt.total()), (1, 1, 2));
  assert_eq!(receipt.revision.len(), 64);

  let records = s.existing_records(c.session_id).await.unwrap();
  assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn recommitting_same_map_is_idempotent() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let b = add_student(&s, "02", "A").await;
  let c = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;
  let entries = vec![
    entry(&a, AttendanceStatus::Present),
    entry(&b, AttendanceStatus::Absent),
  ];

  let first = s.commit_records(c.session_id, entries.clone()).await.unwrap();
  let before = s.existing_records(c.session_id).await.unwrap();
  let report_before =
    aggregate(a.student_id, &s.records_for_student(a.student_id).await.unwrap(), Threshold::DEFAULT);

  let mut reversed = entries;
  reversed.reverse();
  let second = s.commit_records(c.session_id, reversed).await.unwrap();
  let after = s.existing_records(c.session_id).await.unwrap();
  let report_after =
    aggregate(a.student_id, &s.records_for_student(a.student_id).await.unwrap(), Threshold::DEFAULT);

  assert_eq!(first.revision, second.revision);
  assert_ne!(first.commit_id, second.commit_id);
  assert_eq!(before, after);
  assert_eq!(report_before, report_after);
}

#[tokio::test]
async fn recommit_fully_replaces_previous_set() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let b = add_student(&s, "02", "A").await;
  let c = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  s.commit_records(c.session_id, vec![
    entry(&a, AttendanceStatus::Present),
    entry(&b, AttendanceStatus::Present),
  ])
  .await
  .unwrap();
  s.commit_records(c.session_id, vec![entry(&a, AttendanceStatus::Present)])
    .await
    .unwrap();

  let records = s.existing_records(c.session_id).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].student_id, a.student_id);
  assert!(s.records_for_student(b.student_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn swapped_statuses_leave_one_record_per_student() {
  let s = store().await;
  let s1 = add_student(&s, "01", "A").await;
  let s2 = add_student(&s, "02", "A").await;
  let x = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  s.commit_records(x.session_id, vec![
    entry(&s1, AttendanceStatus::Present),
    entry(&s2, AttendanceStatus::Absent),
  ])
  .await
  .unwrap();
  s.commit_records(x.session_id, vec![
    entry(&s1, AttendanceStatus::Absent),
    entry(&s2, AttendanceStatus::Present),
  ])
  .await
  .unwrap();

  let records = s.records_for_student(s1.student_id).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].session_id, x.session_id);
  assert_eq!(records[0].status, AttendanceStatus::Absent);

  let report = aggregate(s1.student_id, &records, Threshold::DEFAULT);
  assert_eq!(report.subjects.len(), 1);
  assert_eq!(report.subjects[0].total_sessions, 1);
  assert_eq!(report.subjects[0].absent_count, 1);
}

#[tokio::test]
async fn empty_commit_clears_session() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let c = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  s.commit_records(c.session_id, vec![entry(&a, AttendanceStatus::Present)])
    .await
    .unwrap();
  let receipt = s.commit_records(c.session_id, vec![]).await.unwrap();
  assert_eq!(receipt.total(), 0);
  assert!(s.existing_records(c.session_id).await.unwrap().is_empty());
}

// ─── Commit rejections ───────────────────────────────────────────────────────

#[tokio::test]
async fn commit_to_unknown_session_is_not_found() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let missing = Uuid::new_v4();

  let err = s
    .commit_records(missing, vec![entry(&a, AttendanceStatus::Present)])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(id) if id == missing));
  assert_eq!(err.kind(), FailureKind::NotFound);
}

#[tokio::test]
async fn student_outside_section_rolls_back_whole_commit() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let b = add_student(&s, "02", "B").await;
  let c = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  s.commit_records(c.session_id, vec![entry(&a, AttendanceStatus::Absent)])
    .await
    .unwrap();

  let err = s
    .commit_records(c.session_id, vec![
      entry(&a, AttendanceStatus::Present),
      entry(&b, AttendanceStatus::Present),
    ])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::OutsideSection { student_id, .. } if student_id == b.student_id));
  assert_eq!(err.kind(), FailureKind::Rejected);

  // previous set untouched
  let records = s.existing_records(c.session_id).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].status, AttendanceStatus::Absent);
  assert_eq!(s.recent_commits(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn all_sections_session_accepts_any_student() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let b = add_student(&s, "02", "B").await;
  let c = add_session(&s, date(2024, 3, 4), "Assembly", Audience::AllSections).await;

  let receipt = s
    .commit_records(c.session_id, vec![
      entry(&a, AttendanceStatus::Present),
      entry(&b, AttendanceStatus::Absent),
    ])
    .await
    .unwrap();
  assert_eq!(receipt.total(), 2);
}

#[tokio::test]
async fn unknown_student_and_duplicates_are_rejected() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let c = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;

  let ghost = RecordEntry { student_id: Uuid::new_v4(), status: AttendanceStatus::Present };
  let err = s.commit_records(c.session_id, vec![ghost]).await.unwrap_err();
  assert!(matches!(err, Error::StudentNotFound(_)));

  let err = s
    .commit_records(c.session_id, vec![
      entry(&a, AttendanceStatus::Present),
      entry(&a, AttendanceStatus::Absent),
    ])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateEntry(id) if id == a.student_id));
  assert!(s.existing_records(c.session_id).await.unwrap().is_empty());
}

// ─── Student records and audit log ───────────────────────────────────────────

#[tokio::test]
async fn records_for_student_feed_aggregation() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let physics = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;
  let maths = add_session(&s, date(2024, 3, 5), "Maths", section("A")).await;
  let blank = add_session(&s, date(2024, 3, 6), "  ", section("A")).await;

  for (c, status) in [
    (&physics, AttendanceStatus::Present),
    (&maths, AttendanceStatus::Absent),
    (&blank, AttendanceStatus::Present),
  ] {
    s.commit_records(c.session_id, vec![entry(&a, status)]).await.unwrap();
  }

  let records = s.records_for_student(a.student_id).await.unwrap();
  assert_eq!(records.len(), 3);
  assert!(records.iter().all(|r| r.session.is_some()));
  assert_eq!(records[0].session_id, physics.session_id);

  let report = aggregate(a.student_id, &records, Threshold::DEFAULT);
  assert_eq!(report.subjects.len(), 2);
  assert_eq!(report.overall.total_sessions, 2);
  assert_eq!(report.overall.total_present, 1);
  assert_eq!(report.anomalies.len(), 1);
  assert_eq!(report.anomalies[0].session_id, blank.session_id);
  assert_eq!(report.anomalies[0].kind, AnomalyKind::MissingSubject);
}

#[tokio::test]
async fn recent_commits_newest_first_with_limit() {
  let s = store().await;
  let a = add_student(&s, "01", "A").await;
  let first = add_session(&s, date(2024, 3, 4), "Physics", section("A")).await;
  let second = add_session(&s, date(2024, 3, 5), "Maths", section("A")).await;

  s.commit_records(first.session_id, vec![entry(&a, AttendanceStatus::Present)])
    .await
    .unwrap();
  s.commit_records(second.session_id, vec![entry(&a, AttendanceStatus::Absent)])
    .await
    .unwrap();

  let recent = s.recent_commits(10).await.unwrap();
  assert_eq!(recent.len(), 2);
  assert_eq!(recent[0].session_id, second.session_id);
  assert_eq!(recent[0].subject, "Maths");
  assert_eq!(recent[0].percentage, Some(0));
  assert_eq!(recent[1].percentage, Some(100));

  let one = s.recent_commits(1).await.unwrap();
  assert_eq!(one.len(), 1);
  assert_eq!(one[0].session_id, second.session_id);
}
