//! Students, as seen through the roster collaborator.
//!
//! The engine never creates or edits students; it only resolves them by
//! section and references them by id from attendance records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student on a section roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:   Uuid,
  pub display_name: String,
  pub roll_number:  String,
  pub section:      String,
}
