//! Error types for `rollcall-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::workflow::{Phase, Ticket};

#[derive(Debug, Error)]
pub enum Error {
  #[error("attendance target must lie strictly between 0 and 1, got {0}")]
  InvalidThreshold(f64),

  #[error("invalid calendar month: {year}-{month:02}")]
  InvalidMonth { year: i32, month: u32 },

  #[error("unknown attendance status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown session kind: {0:?}")]
  UnknownSessionKind(String),

  #[error("unknown same-day policy: {0:?}")]
  UnknownPolicy(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejections raised by [`crate::workflow::MarkingWorkflow`].
///
/// None of these mutate the workflow: the state observed before the call is
/// the state observed after it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  /// A response arrived for a request that has since been superseded by
  /// navigation or by a newer request.
  #[error("response for {0:?} is stale and was discarded")]
  Stale(Ticket),

  #[error("cannot {action} while {phase:?}")]
  InvalidTransition { phase: Phase, action: &'static str },

  #[error("session {0} is not scheduled on the selected date")]
  SessionNotFound(Uuid),

  #[error("student {0} is not on the roster for this session")]
  UnknownStudent(Uuid),
}
