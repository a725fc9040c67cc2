//! Lesson Content · AI generation backend
//!
//! - Axum HTTP API for generating vocabulary, grammar and exercises for a lesson
//! - Persist mode (saved against a lesson) and preview mode (never saved)
//! - OpenAI-backed generation with bounded, linearly spaced retries
//!
//! Important env variables:
//!   PORT                          : u16 (default 3000)
//!   OPENAI_API_KEY                : enables generation if present and well-formed
//!   OPENAI_BASE_URL               : default "https://api.openai.com/v1"
//!   OPENAI_MODEL                  : default "gpt-4o-mini"
//!   GENERATION_MAX_RETRIES        : default 3
//!   GENERATION_RETRY_DELAY_MS     : default 1000 (wait after attempt k is k * delay)
//!   GENERATION_MAX_TOKENS         : default 4096
//!   GENERATION_TEMPERATURE        : default 0.7
//!   GENERATION_CALL_TIMEOUT_SECS  : default 120
//!   CONTENT_CONFIG_PATH           : path to TOML config (generation knobs + reference data)
//!   LOG_LEVEL                     : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                    : "pretty" (default) or "json"

mod client;
mod config;
mod domain;
mod error;
mod openai;
mod orchestrator;
mod prompt;
mod protocol;
mod routes;
mod seeds;
mod state;
mod store;
mod telemetry;
mod util;
mod validator;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: reference data, content store and (optionally) the orchestrator.
  let state = Arc::new(AppState::from_env()?);

  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "lesson_content_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "lesson_content_backend", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "lesson_content_backend", "Shutting down");
}
