//! Content digests for committed record sets.
//!
//! A revision is a SHA-256 hash over the session id and the
//! `(student_id, status)` pairs sorted by student. Entry order does not
//! matter, so recommitting the same status map yields the same revision.

use rollcall_core::record::RecordEntry;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn revision(session_id: Uuid, entries: &[RecordEntry]) -> String {
  let mut pairs: Vec<_> =
    entries.iter().map(|e| (e.student_id, e.status)).collect();
  pairs.sort_by_key(|(id, _)| *id);

  let mut hasher = Sha256::new();
  hasher.update(session_id.as_bytes());
  for (id, status) in pairs {
    hasher.update(id.as_bytes());
    hasher.update([u8::from(status.is_present())]);
  }
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use rollcall_core::record::AttendanceStatus;

  use super::*;

  fn entry(id: Uuid, status: AttendanceStatus) -> RecordEntry {
    RecordEntry { student_id: id, status }
  }

  #[test]
  fn independent_of_entry_order() {
    let (a, b, s) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let one = revision(s, &[entry(a, AttendanceStatus::Present), entry(b, AttendanceStatus::Absent)]);
    let two = revision(s, &[entry(b, AttendanceStatus::Absent), entry(a, AttendanceStatus::Present)]);
    assert_eq!(one, two);
    assert_eq!(one.len(), 64);
  }

  #[test]
  fn sensitive_to_status_and_session() {
    let (a, s) = (Uuid::new_v4(), Uuid::new_v4());
    let present = revision(s, &[entry(a, AttendanceStatus::Present)]);
    assert_ne!(present, revision(s, &[entry(a, AttendanceStatus::Absent)]));
    assert_ne!(present, revision(Uuid::new_v4(), &[entry(a, AttendanceStatus::Present)]));
  }
}
