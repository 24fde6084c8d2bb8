//! `rollcall`: terminal UI for marking and reviewing attendance.
//!
//! # Usage
//!
//! ```
//! rollcall --url http://localhost:7878 --date 2026-03-02
//! rollcall --url https://attendance.example.edu --user staff --password secret
//! rollcall --config ~/.config/rollcall/config.toml
//! ```
//!
//! `--user` and `--password` are only needed when the server sits behind an
//! authenticating reverse proxy.

mod app;
mod client;
mod ui;

use std::{
  fs::File,
  io,
  path::{Path, PathBuf},
  sync::Mutex,
  time::Duration,
};

use anyhow::{Context, Result};
use app::{App, Loaded};
use chrono::{Local, NaiveDate};
use clap::Parser;
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use rollcall_core::workflow::MarkingWorkflow;
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rollcall", about = "Terminal UI for marking attendance")]
struct Args {
  /// Path to a TOML config file (url, username, password, target).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the rollcall server (default: http://localhost:7878).
  #[arg(long, env = "ROLLCALL_URL")]
  url: Option<String>,

  /// Basic-auth username for a reverse proxy in front of the server. The
  /// server itself does not check credentials.
  #[arg(long, env = "ROLLCALL_USER")]
  user: Option<String>,

  /// Basic-auth password for the reverse proxy (plaintext).
  #[arg(long, env = "ROLLCALL_PASSWORD")]
  password: Option<String>,

  /// Attendance target used for reports, as a ratio (e.g. 0.75).
  #[arg(long)]
  target: Option<f64>,

  /// Start on this date instead of today.
  #[arg(long, value_name = "YYYY-MM-DD")]
  date: Option<NaiveDate>,

  /// Open this session's marking sheet once the day's sessions load.
  #[arg(long, value_name = "UUID")]
  session: Option<Uuid>,

  /// Write logs to this file. The terminal is owned by the UI, so logging is
  /// off unless a file is given.
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
  #[serde(default)]
  target:   Option<f64>,
}

fn init_logging(path: &Path) -> Result<()> {
  let file = File::create(path)
    .with_context(|| format!("creating log file {}", path.display()))?;
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rollcall=debug".into()),
    )
    .with_writer(Mutex::new(file))
    .with_ansi(false)
    .init();
  Ok(())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(path) = &args.log_file {
    init_logging(path)?;
  }

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:7878".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let date = args.date.unwrap_or_else(|| Local::now().date_naive());
  let mut workflow = MarkingWorkflow::new(date);
  if let Some(session_id) = args.session {
    workflow = workflow.with_deep_link(session_id);
  }

  tracing::info!(base_url = %api_config.base_url, %date, "starting rollcall");

  let (tx, rx) = mpsc::unbounded_channel();
  let client = ApiClient::new(api_config)?;
  let mut app = App::new(client, workflow, tx);
  app.target = args.target.or(file_cfg.target);

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  app.go_to_date(date);

  // Run the event loop; restore terminal even on error.
  let run_result = run_event_loop(&mut terminal, &mut app, rx).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
  mut rx: UnboundedReceiver<Loaded>,
) -> Result<()> {
  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      if !app.handle_key(key) {
        break;
      }
    }

    // Apply whatever the background fetches have finished.
    while let Ok(msg) = rx.try_recv() {
      app.handle_loaded(msg);
    }
  }

  Ok(())
}
