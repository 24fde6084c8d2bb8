//! Handler for the commit audit view.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/commits/recent` | Optional `?limit=`, capped at [`MAX_LIMIT`] |

use axum::{
  Json,
  extract::{Query, State},
};
use rollcall_core::{record::CommitSummary, store::AttendanceStore};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub limit: Option<usize>,
}

/// `GET /commits/recent[?limit=<n>]`
pub async fn recent<S: AttendanceStore + 'static>(
  State(state): State<ApiState<S>>,
  Query(params): Query<RecentParams>,
) -> Result<Json<Vec<CommitSummary>>, ApiError> {
  let limit = params
    .limit
    .unwrap_or(state.settings.recent_limit)
    .min(MAX_LIMIT);
  let commits = state
    .store
    .recent_commits(limit)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(commits))
}
