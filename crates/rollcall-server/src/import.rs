//! Registry import: seeds the store with students and sessions from a JSON
//! document shaped like `{"students":[...],"sessions":[...]}`.
//!
//! Rows are upserted by id, so re-importing an edited file updates in place.

use rollcall_core::{roster::Student, session::ClassSession};
use rollcall_store_sqlite::SqliteStore;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Registry {
  #[serde(default)]
  pub students: Vec<Student>,
  #[serde(default)]
  pub sessions: Vec<ClassSession>,
}

impl Registry {
  pub fn from_json(text: &str) -> serde_json::Result<Self> { serde_json::from_str(text) }
}

/// How many rows an import wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportCounts {
  pub students: usize,
  pub sessions: usize,
}

/// Upsert every student, then every session, of `registry` into `store`.
pub async fn import(
  store: &SqliteStore,
  registry: &Registry,
) -> rollcall_store_sqlite::Result<ImportCounts> {
  for student in &registry.students {
    store.upsert_student(student).await?;
  }
  for session in &registry.sessions {
    store.upsert_session(session).await?;
  }

  let counts = ImportCounts {
    students: registry.students.len(),
    sessions: registry.sessions.len(),
  };
  tracing::info!(students = counts.students, sessions = counts.sessions, "registry imported");
  Ok(counts)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use rollcall_core::{session::Audience, store::AttendanceStore};
  use uuid::Uuid;

  use super::*;

  const REGISTRY: &str = r#"{
    "students": [
      { "student_id": "6f1c2a64-0b7e-4d53-9a57-4f0d2f6c1a01", "display_name": "Asha Rao",
        "roll_number": "CS-01", "section": "A" },
      { "student_id": "6f1c2a64-0b7e-4d53-9a57-4f0d2f6c1a02", "display_name": "Ben Ortiz",
        "roll_number": "CS-02", "section": "B" }
    ],
    "sessions": [
      { "session_id": "0d7e1f55-5c1b-4a0e-8f7b-2b8a3c9d0e01", "date": "2024-03-04",
        "subject": "Physics", "audience": { "scope": "section_scoped", "section": "A" },
        "kind": "lab", "start_time": "09:00:00", "room": "L2" },
      { "session_id": "0d7e1f55-5c1b-4a0e-8f7b-2b8a3c9d0e02", "date": "2024-03-04",
        "subject": "Ethics", "audience": { "scope": "all_sections" },
        "kind": "lecture", "start_time": "11:00:00", "room": null }
    ]
  }"#;

  #[tokio::test]
  async fn import_upserts_registry() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let registry = Registry::from_json(REGISTRY).unwrap();

    let counts = import(&store, &registry).await.unwrap();
    assert_eq!(counts, ImportCounts { students: 2, sessions: 2 });

    let day = store
      .sessions_on(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
      .await
      .unwrap();
    assert_eq!(day.len(), 2);
    assert_eq!(store.roster(&Audience::SectionScoped("A".into())).await.unwrap().len(), 1);

    // second import is a no-op on counts in the store
    import(&store, &registry).await.unwrap();
    assert_eq!(store.roster(&Audience::AllSections).await.unwrap().len(), 2);

    let asha: Uuid = "6f1c2a64-0b7e-4d53-9a57-4f0d2f6c1a01".parse().unwrap();
    assert_eq!(store.get_student(asha).await.unwrap().unwrap().display_name, "Asha Rao");
  }

  #[test]
  fn missing_lists_default_to_empty() {
    let registry = Registry::from_json("{}").unwrap();
    assert!(registry.students.is_empty());
    assert!(registry.sessions.is_empty());
  }
}
