//! [`SqliteStore`], the SQLite implementation of [`AttendanceStore`].

use std::{collections::HashSet, path::Path};

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rollcall_core::{
  record::{AttendanceRecord, CommitReceipt, CommitSummary, RecordEntry, StudentRecord},
  roster::Student,
  session::{month_bounds, Audience, ClassSession},
  store::AttendanceStore,
};

use crate::{
  encode::{
    encode_audience, encode_date, encode_dt, encode_kind, encode_status, encode_time,
    encode_uuid, RawCommit, RawRecord, RawSession, RawStudent, RawStudentRecord,
    SESSION_COLUMNS, STUDENT_COLUMNS,
  },
  revision::revision,
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rollcall attendance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Registry writes ───────────────────────────────────────────────────────

  /// Insert a student, or overwrite the one with the same id.
  pub async fn upsert_student(&self, student: &Student) -> Result<()> {
    let id_str  = encode_uuid(student.student_id);
    let name    = student.display_name.clone();
    let roll    = student.roll_number.clone();
    let section = student.section.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (student_id, display_name, roll_number, section)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (student_id) DO UPDATE SET
             display_name = excluded.display_name,
             roll_number  = excluded.roll_number,
             section      = excluded.section",
          rusqlite::params![id_str, name, roll, section],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a session, or overwrite the one with the same id.
  pub async fn upsert_session(&self, session: &ClassSession) -> Result<()> {
    let id_str   = encode_uuid(session.session_id);
    let date_str = encode_date(session.date);
    let subject  = session.subject.clone();
    let section  = encode_audience(&session.audience);
    let kind_str = encode_kind(session.kind);
    let time_str = encode_time(session.start_time);
    let room     = session.room.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (session_id, date, subject, section, kind, start_time, room)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (session_id) DO UPDATE SET
             date       = excluded.date,
             subject    = excluded.subject,
             section    = excluded.section,
             kind       = excluded.kind,
             start_time = excluded.start_time,
             room       = excluded.room",
          rusqlite::params![id_str, date_str, subject, section, kind_str, time_str, room],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Sessions whose date lies in `[from, until)`, ordered by date then start.
  async fn sessions_between(
    &self,
    from: NaiveDate,
    until: NaiveDate,
  ) -> Result<Vec<ClassSession>> {
    let from_str  = encode_date(from);
    let until_str = encode_date(until);

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLUMNS} FROM sessions
           WHERE date >= ?1 AND date < ?2
           ORDER BY date, start_time, subject"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, until_str], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    tracing::debug!(%from, %until, count = raws.len(), "sessions read");
    raws.into_iter().map(RawSession::into_session).collect()
  }
}

/// Outcome of the commit transaction: the receipt, or the rejection that
/// rolled it back.
type CommitOutcome = std::result::Result<CommitReceipt, Error>;

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Session registry ──────────────────────────────────────────────────────

  async fn sessions_on(&self, date: NaiveDate) -> Result<Vec<ClassSession>> {
    self.sessions_between(date, date.succ_opt().unwrap_or(date)).await
  }

  async fn sessions_in_month(&self, year: i32, month: u32) -> Result<Vec<ClassSession>> {
    let (from, until) = month_bounds(year, month)?;
    self.sessions_between(from, until).await
  }

  async fn get_session(&self, session_id: Uuid) -> Result<Option<ClassSession>> {
    let id_str = encode_uuid(session_id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
            rusqlite::params![id_str],
            RawSession::from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  // ── Roster ────────────────────────────────────────────────────────────────

  async fn roster<'a>(&'a self, audience: &'a Audience) -> Result<Vec<Student>> {
    let section = encode_audience(audience);

    let raws: Vec<RawStudent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STUDENT_COLUMNS} FROM students
           WHERE ?1 IS NULL OR section = ?1
           ORDER BY roll_number, display_name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![section], RawStudent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    tracing::debug!(%audience, count = raws.len(), "roster read");
    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(student_id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1"),
            rusqlite::params![id_str],
            RawStudent::from_row,
          )
          .optional()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn existing_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>> {
    let id_str = encode_uuid(session_id);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT session_id, student_id, status FROM attendance
           WHERE session_id = ?1
           ORDER BY student_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawRecord {
              session_id: row.get(0)?,
              student_id: row.get(1)?,
              status:     row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn commit_records(
    &self,
    session_id: Uuid,
    entries: Vec<RecordEntry>,
  ) -> Result<CommitReceipt> {
    let mut seen = HashSet::with_capacity(entries.len());
    if let Some(dup) = entries.iter().find(|e| !seen.insert(e.student_id)) {
      tracing::warn!(%session_id, student_id = %dup.student_id, "duplicate entry in commit");
      return Err(Error::DuplicateEntry(dup.student_id));
    }

    let present = entries.iter().filter(|e| e.status.is_present()).count() as u32;
    let receipt = CommitReceipt {
      commit_id: Uuid::new_v4(),
      session_id,
      committed_at: Utc::now(),
      present,
      absent: entries.len() as u32 - present,
      revision: revision(session_id, &entries),
    };

    let session_str = encode_uuid(session_id);
    let rows: Vec<(Uuid, String, &'static str)> = entries
      .iter()
      .map(|e| (e.student_id, encode_uuid(e.student_id), encode_status(e.status)))
      .collect();
    let commit_str = encode_uuid(receipt.commit_id);
    let at_str     = encode_dt(receipt.committed_at);

    let outcome: CommitOutcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let section: Option<Option<String>> = tx
          .query_row(
            "SELECT section FROM sessions WHERE session_id = ?1",
            rusqlite::params![session_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(section) = section else {
          return Ok(Err(Error::SessionNotFound(session_id)));
        };

        for (student_id, id_str, _) in &rows {
          let found: Option<String> = tx
            .query_row(
              "SELECT section FROM students WHERE student_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?;
          match (found, section.as_deref()) {
            (None, _) => return Ok(Err(Error::StudentNotFound(*student_id))),
            (Some(theirs), Some(required)) if theirs != required => {
              return Ok(Err(Error::OutsideSection {
                student_id: *student_id,
                section:    required.to_owned(),
              }));
            }
            _ => {}
          }
        }

        tx.execute(
          "DELETE FROM attendance WHERE session_id = ?1",
          rusqlite::params![session_str],
        )?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO attendance (session_id, student_id, status) VALUES (?1, ?2, ?3)",
          )?;
          for (_, id_str, status) in &rows {
            insert.execute(rusqlite::params![session_str, id_str, status])?;
          }
        }
        tx.execute(
          "INSERT INTO commits (commit_id, session_id, committed_at, present, absent, revision)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            commit_str,
            session_str,
            at_str,
            receipt.present,
            receipt.absent,
            receipt.revision,
          ],
        )?;
        tx.commit()?;

        Ok(Ok(receipt))
      })
      .await?;

    match &outcome {
      Ok(receipt) => tracing::info!(
        %session_id,
        present = receipt.present,
        absent = receipt.absent,
        revision = %receipt.revision,
        "attendance committed"
      ),
      Err(e) => tracing::warn!(%session_id, error = %e, "commit rejected"),
    }
    outcome
  }

  async fn records_for_student(&self, student_id: Uuid) -> Result<Vec<StudentRecord>> {
    let id_str = encode_uuid(student_id);

    let raws: Vec<RawStudentRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT a.session_id, a.student_id, a.status,
                  s.date, s.subject, s.section, s.kind, s.session_id IS NOT NULL
           FROM attendance a
           LEFT JOIN sessions s ON s.session_id = a.session_id
           WHERE a.student_id = ?1
           ORDER BY s.date, s.start_time",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawStudentRecord {
              session_id: row.get(0)?,
              student_id: row.get(1)?,
              status:     row.get(2)?,
              date:       row.get(3)?,
              subject:    row.get(4)?,
              section:    row.get(5)?,
              kind:       row.get(6)?,
              resolved:   row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    tracing::debug!(%student_id, count = raws.len(), "student records read");
    raws.into_iter().map(RawStudentRecord::into_record).collect()
  }

  async fn recent_commits(&self, limit: usize) -> Result<Vec<CommitSummary>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawCommit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.commit_id, c.session_id, c.committed_at, c.present, c.absent,
                  c.revision, s.date, s.subject, s.section, s.kind
           FROM commits c
           JOIN sessions s ON s.session_id = c.session_id
           ORDER BY c.rowid DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |row| {
            Ok(RawCommit {
              commit_id:    row.get(0)?,
              session_id:   row.get(1)?,
              committed_at: row.get(2)?,
              present:      row.get(3)?,
              absent:       row.get(4)?,
              revision:     row.get(5)?,
              date:         row.get(6)?,
              subject:      row.get(7)?,
              section:      row.get(8)?,
              kind:         row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCommit::into_summary).collect()
  }
}
