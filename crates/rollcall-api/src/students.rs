//! Handlers for roster and per-student endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/roster` | Optional `?section=`; full roster without it |
//! | `GET`  | `/students/:id/records` | Records joined with their sessions |
//! | `GET`  | `/students/:id/report` | Optional `?target=0.75` |
//! | `GET`  | `/students/:id/heatmap` | Optional `?days`, `?end`, `?policy` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{Local, NaiveDate};
use rollcall_core::{
  aggregate::{AttendanceReport, aggregate},
  heatmap::{Heatmap, HeatmapOptions, SameDayPolicy, dated_entries, project},
  record::StudentRecord,
  roster::Student,
  session::Audience,
  store::AttendanceStore,
  threshold::Threshold,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Longest heatmap window a request may ask for.
pub const MAX_HEATMAP_DAYS: u32 = 366;

/// Records for a student that must exist.
async fn student_records<S: AttendanceStore>(
  store: &S,
  id: Uuid,
) -> Result<Vec<StudentRecord>, ApiError> {
  store
    .get_student(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("student {id} not found")))?;
  store.records_for_student(id).await.map_err(ApiError::from_store)
}

// ─── Roster ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RosterParams {
  pub section: Option<String>,
}

/// `GET /roster[?section=<section>]`
pub async fn roster<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Query(params): Query<RosterParams>,
) -> Result<Json<Vec<Student>>, ApiError> {
  let audience = match params.section {
    Some(section) => Audience::SectionScoped(section),
    None => Audience::AllSections,
  };
  let roster = state
    .store
    .roster(&audience)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(roster))
}

// ─── Records ──────────────────────────────────────────────────────────────────

/// `GET /students/:id/records`
pub async fn records<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StudentRecord>>, ApiError> {
  Ok(Json(student_records(&*state.store, id).await?))
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportParams {
  /// Ratio in `(0, 1)`; the configured target when absent.
  pub target: Option<f64>,
}

/// `GET /students/:id/report[?target=<ratio>]`
pub async fn report<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ReportParams>,
) -> Result<Json<AttendanceReport>, ApiError> {
  let target = match params.target {
    Some(ratio) => {
      Threshold::from_ratio(ratio).map_err(|e| ApiError::BadRequest(e.to_string()))?
    }
    None => state.settings.target,
  };
  let records = student_records(&*state.store, id).await?;
  Ok(Json(aggregate(id, &records, target)))
}

// ─── Heatmap ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HeatmapParams {
  pub days:   Option<u32>,
  /// Last day of the window; today (server local time) when absent.
  pub end:    Option<NaiveDate>,
  pub policy: Option<SameDayPolicy>,
}

/// `GET /students/:id/heatmap[?days=<n>][&end=<date>][&policy=any_absent|any_present]`
pub async fn heatmap<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<HeatmapParams>,
) -> Result<Json<Heatmap>, ApiError> {
  let days = params.days.unwrap_or(state.settings.heatmap_days);
  if !(1..=MAX_HEATMAP_DAYS).contains(&days) {
    return Err(ApiError::BadRequest(format!(
      "days must lie between 1 and {MAX_HEATMAP_DAYS}, got {days}"
    )));
  }
  let end = params.end.unwrap_or_else(|| Local::now().date_naive());
  let options = HeatmapOptions::trailing(end)
    .with_days(days)
    .with_policy(params.policy.unwrap_or_default());

  let records = student_records(&*state.store, id).await?;
  Ok(Json(project(dated_entries(&records), &options)))
}
