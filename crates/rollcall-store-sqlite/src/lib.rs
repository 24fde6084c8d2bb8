//! SQLite backend for the Rollcall attendance store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Commits run inside a single
//! transaction, so a session's record set is always either the previous one
//! or the new one in full.

mod encode;
mod revision;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use revision::revision;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
