//! Core types and pure logic for the Rollcall attendance engine.
//!
//! This crate has no HTTP or database dependencies. It holds
//! the domain model, the threshold math, the aggregation engine, the heatmap
//! projection, and the session-marking state machine. Storage backends
//! implement [`store::AttendanceStore`]; everything else depends on that
//! abstraction.

pub mod aggregate;
pub mod error;
pub mod heatmap;
pub mod record;
pub mod roster;
pub mod session;
pub mod store;
pub mod threshold;
pub mod workflow;

pub use error::{Error, Result, WorkflowError};
