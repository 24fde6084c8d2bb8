//! Error type for `rollcall-store-sqlite`.

use rollcall_core::store::{FailureKind, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rollcall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("session not found: {0}")]
  SessionNotFound(Uuid),

  #[error("student not found: {0}")]
  StudentNotFound(Uuid),

  #[error("student {student_id} is not in section {section}")]
  OutsideSection { student_id: Uuid, section: String },

  #[error("student {0} appears more than once in the commit")]
  DuplicateEntry(Uuid),
}

impl StoreError for Error {
  fn kind(&self) -> FailureKind {
    match self {
      Self::SessionNotFound(_) => FailureKind::NotFound,
      Self::StudentNotFound(_)
      | Self::OutsideSection { .. }
      | Self::DuplicateEntry(_) => FailureKind::Rejected,
      Self::Core(_) | Self::Database(_) | Self::Uuid(_) | Self::DateParse(_) => {
        FailureKind::Backend
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
