//! Handlers for session-scoped endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sessions?date=YYYY-MM-DD` | Sessions on a day |
//! | `GET`  | `/calendar/:year/:month` | Month sessions plus marker dates |
//! | `GET`  | `/sessions/:id` | 404 if not found |
//! | `GET`  | `/sessions/:id/roster` | Roster resolved by the session's audience |
//! | `GET`  | `/sessions/:id/records` | Records already committed |
//! | `PUT`  | `/sessions/:id/records` | Full replace; body `{"entries":[...]}` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use rollcall_core::{
  record::{AttendanceRecord, CommitReceipt, RecordEntry},
  roster::Student,
  session::{CalendarMonth, ClassSession, month_bounds},
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

async fn require_session<S: AttendanceStore>(
  store: &S,
  id: Uuid,
) -> Result<ClassSession, ApiError> {
  store
    .get_session(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub date: NaiveDate,
}

/// `GET /sessions?date=<date>`
pub async fn list<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ClassSession>>, ApiError> {
  let sessions = state
    .store
    .sessions_on(params.date)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(sessions))
}

// ─── Calendar ─────────────────────────────────────────────────────────────────

/// `GET /calendar/:year/:month`
pub async fn calendar<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<CalendarMonth>, ApiError> {
  month_bounds(year, month).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  let sessions = state
    .store
    .sessions_in_month(year, month)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(CalendarMonth::new(year, month, sessions)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /sessions/:id`
pub async fn get_one<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ClassSession>, ApiError> {
  Ok(Json(require_session(&*state.store, id).await?))
}

// ─── Roster ───────────────────────────────────────────────────────────────────

/// `GET /sessions/:id/roster`
pub async fn roster<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Student>>, ApiError> {
  let session = require_session(&*state.store, id).await?;
  let roster = state
    .store
    .roster(&session.audience)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(roster))
}

// ─── Records ──────────────────────────────────────────────────────────────────

/// `GET /sessions/:id/records`
pub async fn records<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
  require_session(&*state.store, id).await?;
  let records = state
    .store
    .existing_records(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

/// JSON body accepted by `PUT /sessions/:id/records`.
#[derive(Debug, Deserialize)]
pub struct CommitBody {
  pub entries: Vec<RecordEntry>,
}

/// `PUT /sessions/:id/records`: the body replaces every record of the session.
pub async fn commit<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CommitBody>,
) -> Result<Json<CommitReceipt>, ApiError> {
  let receipt = state
    .store
    .commit_records(id, body.entries)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(receipt))
}
