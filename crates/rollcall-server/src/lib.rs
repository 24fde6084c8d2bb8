//! HTTP host for the Rollcall API.
//!
//! Wires the JSON API from `rollcall-api` onto a SQLite store, adds request
//! tracing and a request timeout, and loads the student/session registry
//! from JSON.

pub mod import;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use rollcall_api::ApiSettings;
use rollcall_core::{heatmap::DEFAULT_WINDOW_DAYS, store::AttendanceStore, threshold::Threshold};
use serde::Deserialize;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// Attendance target ratio used when a report request names none.
  #[serde(default)]
  pub target:               Threshold,
  #[serde(default = "default_heatmap_days")]
  pub heatmap_days:         u32,
  #[serde(default = "default_recent_limit")]
  pub recent_limit:         usize,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 7878 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rollcall/rollcall.db") }
fn default_heatmap_days() -> u32 { DEFAULT_WINDOW_DAYS }
fn default_recent_limit() -> usize { 20 }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 default_host(),
      port:                 default_port(),
      store_path:           default_store_path(),
      target:               Threshold::default(),
      heatmap_days:         default_heatmap_days(),
      recent_limit:         default_recent_limit(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }
}

impl ServerConfig {
  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      target:       self.target,
      heatmap_days: self.heatmap_days,
      recent_limit: self.recent_limit,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the API nested under `/api`, traced and bounded by
/// the configured request timeout.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: AttendanceStore + Send + Sync + 'static,
{
  Router::new()
    .nest("/api", rollcall_api::api_router(store, config.api_settings()))
    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use rollcall_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  #[test]
  fn config_defaults_fill_missing_keys() {
    let cfg: ServerConfig = config::Config::builder()
      .set_override("port", 9000)
      .unwrap()
      .set_override("target", 0.8)
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.target, Threshold::from_ratio(0.8).unwrap());
    assert_eq!(cfg.heatmap_days, DEFAULT_WINDOW_DAYS);
  }

  #[test]
  fn config_rejects_out_of_range_target() {
    let result = config::Config::builder()
      .set_override("target", 1.2)
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize::<ServerConfig>();
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let app = app(store, &ServerConfig::default());

    let req = Request::builder()
      .uri("/api/roster")
      .body(Body::empty())
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().uri("/roster").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
