//! Async HTTP client wrapping the rollcall JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use rollcall_core::{
  aggregate::AttendanceReport,
  heatmap::Heatmap,
  record::{AttendanceRecord, CommitReceipt, CommitSummary, RecordEntry},
  roster::Student,
  session::{CalendarMonth, ClassSession},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Connection settings for the rollcall API.
///
/// `rollcall-server` does not authenticate requests itself. When `username`
/// is set, requests carry HTTP basic auth for a reverse proxy that guards the
/// server; when it is empty no `Authorization` header is sent.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the rollcall JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Body of every non-2xx API response.
#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Pass a successful response through; turn anything else into an error
/// carrying the server's message verbatim.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = match resp.json::<ErrorBody>().await {
    Ok(body) => body.error,
    Err(_) => status.canonical_reason().unwrap_or("error").to_string(),
  };
  Err(anyhow!("{what} → {}: {message}", status.as_u16()))
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn get_json<T: serde::de::DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let what = format!("GET {path}");
    let resp = self
      .auth(self.client.get(self.url(path)))
      .query(query)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    check(resp, &what)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising {path}"))
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  /// `GET /api/sessions?date=<date>`
  pub async fn sessions_on(&self, date: NaiveDate) -> Result<Vec<ClassSession>> {
    self.get_json("/sessions", &[("date", date.to_string())]).await
  }

  /// `GET /api/calendar/<year>/<month>`
  pub async fn calendar(&self, year: i32, month: u32) -> Result<CalendarMonth> {
    self.get_json(&format!("/calendar/{year}/{month}"), &[]).await
  }

  /// `GET /api/sessions/<id>/roster` and `GET /api/sessions/<id>/records`.
  pub async fn resolve_session(
    &self,
    session_id: Uuid,
  ) -> Result<(Vec<Student>, Vec<AttendanceRecord>)> {
    let roster_path = format!("/sessions/{session_id}/roster");
    let records_path = format!("/sessions/{session_id}/records");
    tokio::try_join!(
      self.get_json(&roster_path, &[]),
      self.get_json(&records_path, &[]),
    )
  }

  /// `PUT /api/sessions/<id>/records`
  pub async fn commit(
    &self,
    session_id: Uuid,
    entries: &[RecordEntry],
  ) -> Result<CommitReceipt> {
    let path = format!("/sessions/{session_id}/records");
    let what = format!("PUT {path}");
    let resp = self
      .auth(self.client.put(self.url(&path)))
      .json(&json!({ "entries": entries }))
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    check(resp, &what)
      .await?
      .json()
      .await
      .context("deserialising commit receipt")
  }

  // ── Students ──────────────────────────────────────────────────────────────

  /// `GET /api/students/<id>/report[?target=<ratio>]`
  pub async fn report(&self, student_id: Uuid, target: Option<f64>) -> Result<AttendanceReport> {
    let query: Vec<_> = target.map(|t| ("target", t.to_string())).into_iter().collect();
    self.get_json(&format!("/students/{student_id}/report"), &query).await
  }

  /// `GET /api/students/<id>/heatmap[?days=<n>]`
  pub async fn heatmap(&self, student_id: Uuid, days: Option<u32>) -> Result<Heatmap> {
    let query: Vec<_> = days.map(|d| ("days", d.to_string())).into_iter().collect();
    self.get_json(&format!("/students/{student_id}/heatmap"), &query).await
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  /// `GET /api/commits/recent?limit=<n>`
  pub async fn recent_commits(&self, limit: usize) -> Result<Vec<CommitSummary>> {
    self.get_json("/commits/recent", &[("limit", limit.to_string())]).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use reqwest::header::AUTHORIZATION;

  fn client(username: &str, password: &str) -> ApiClient {
    ApiClient::new(ApiConfig {
      base_url: "http://localhost:7878/".into(),
      username: username.into(),
      password: password.into(),
    })
    .unwrap()
  }

  #[test]
  fn no_credentials_means_no_authorization_header() {
    let c = client("", "");
    let req = c.auth(c.client.get(c.url("/roster"))).build().unwrap();
    assert_eq!(req.url().as_str(), "http://localhost:7878/api/roster");
    assert!(req.headers().get(AUTHORIZATION).is_none());
  }

  #[test]
  fn proxy_credentials_are_sent_as_basic_auth() {
    let c = client("staff", "secret");
    let req = c.auth(c.client.get(c.url("/roster"))).build().unwrap();
    // base64("staff:secret")
    assert_eq!(
      req.headers().get(AUTHORIZATION).unwrap(),
      "Basic c3RhZmY6c2VjcmV0"
    );
  }
}
