//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any
//! [`rollcall_core::store::AttendanceStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(store.clone(), ApiSettings::default()))
//! ```

pub mod commits;
pub mod error;
pub mod sessions;
pub mod students;

use std::sync::Arc;

use axum::{Router, routing::get};
use rollcall_core::{heatmap::DEFAULT_WINDOW_DAYS, store::AttendanceStore, threshold::Threshold};

pub use error::ApiError;

// ─── State ────────────────────────────────────────────────────────────────────

/// Defaults applied when a request leaves a parameter out.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  pub target:       Threshold,
  pub heatmap_days: u32,
  pub recent_limit: usize,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      target:       Threshold::DEFAULT,
      heatmap_days: DEFAULT_WINDOW_DAYS,
      recent_limit: 20,
    }
  }
}

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub settings: Arc<ApiSettings>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      settings: Arc::clone(&self.settings),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, settings: ApiSettings) -> Router<()>
where
  S: AttendanceStore + Send + Sync + 'static,
{
  let state = ApiState { store, settings: Arc::new(settings) };

  Router::new()
    // Sessions
    .route("/sessions", get(sessions::list::<S>))
    .route("/calendar/{year}/{month}", get(sessions::calendar::<S>))
    .route("/sessions/{id}", get(sessions::get_one::<S>))
    .route("/sessions/{id}/roster", get(sessions::roster::<S>))
    .route(
      "/sessions/{id}/records",
      get(sessions::records::<S>).put(sessions::commit::<S>),
    )
    // Students
    .route("/roster", get(students::roster::<S>))
    .route("/students/{id}/records", get(students::records::<S>))
    .route("/students/{id}/report", get(students::report::<S>))
    .route("/students/{id}/heatmap", get(students::heatmap::<S>))
    // Audit
    .route("/commits/recent", get(commits::recent::<S>))
    .with_state(state)
}
