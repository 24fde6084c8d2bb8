//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Mirror of the roster collaborator's students.
CREATE TABLE IF NOT EXISTS students (
    student_id   TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    roll_number  TEXT NOT NULL,
    section      TEXT NOT NULL
);

-- Mirror of the scheduling collaborator's sessions.
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    date       TEXT NOT NULL,   -- YYYY-MM-DD
    subject    TEXT NOT NULL,
    section    TEXT,            -- NULL when open to all sections
    kind       TEXT NOT NULL,   -- 'lecture' | 'lab' | 'tutorial'
    start_time TEXT NOT NULL,   -- HH:MM
    room       TEXT
);

-- One row per student per session. Rows for a session are only ever
-- replaced wholesale, inside a commit transaction.
CREATE TABLE IF NOT EXISTS attendance (
    session_id TEXT NOT NULL REFERENCES sessions(session_id),
    student_id TEXT NOT NULL REFERENCES students(student_id),
    status     TEXT NOT NULL CHECK (status IN ('present', 'absent')),
    PRIMARY KEY (session_id, student_id)
);

-- Append-only audit log of commits.
CREATE TABLE IF NOT EXISTS commits (
    commit_id    TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL REFERENCES sessions(session_id),
    committed_at TEXT NOT NULL,   -- ISO 8601 UTC
    present      INTEGER NOT NULL,
    absent       INTEGER NOT NULL,
    revision     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_date_idx      ON sessions(date);
CREATE INDEX IF NOT EXISTS students_section_idx   ON students(section);
CREATE INDEX IF NOT EXISTS attendance_student_idx ON attendance(student_id);
CREATE INDEX IF NOT EXISTS commits_session_idx    ON commits(session_id);

PRAGMA user_version = 1;
";
