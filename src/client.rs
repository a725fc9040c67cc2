//! Generation client: obtains raw text from the provider with bounded retries.
//!
//! Attempts are strictly sequential. After failed attempt `k` (except the last)
//! the client waits `retry_delay * k` before trying again, so the delay grows
//! linearly with the attempt index. Every attempt and every backoff is raced
//! against the call's deadline and cancellation signal.
//!
//! In the server, cancellation is dropping the request future: axum drops the
//! handler when the client disconnects, which abandons the in-flight attempt or
//! backoff sleep. The explicit `watch` signal on `CallContext` is for in-process
//! callers that need to stop a call they still own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::{validate_api_key, GenerationSettings};
use crate::error::{ConfigurationError, GenerationError};
use crate::openai::OpenAI;

/// One provider request. `max_tokens`/`temperature` are passed through untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
  pub model: String,
  pub prompt: String,
  pub max_tokens: u32,
  pub temperature: f32,
}

/// External generative provider: request in, raw text out. One call = one attempt.
#[async_trait]
pub trait GenerationService: Send + Sync {
  async fn generate(&self, req: &ProviderRequest) -> Result<String, GenerationError>;
}

/// Deadline and cancellation signal for a single generation call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
  deadline: Option<(Instant, Duration)>,
  cancel: Option<watch::Receiver<bool>>,
}

impl CallContext {
  /// No deadline, no cancellation.
  #[allow(dead_code)]
  pub fn unbounded() -> Self {
    Self::default()
  }

  /// A budget too large to represent as an instant means no deadline.
  pub fn with_timeout(budget: Duration) -> Self {
    let deadline = Instant::now().checked_add(budget).map(|at| (at, budget));
    Self { deadline, cancel: None }
  }

  /// Cancel the call once `true` is published on the channel.
  #[allow(dead_code)]
  pub fn with_cancel(mut self, rx: watch::Receiver<bool>) -> Self {
    self.cancel = Some(rx);
    self
  }

  fn check(&self) -> Result<(), GenerationError> {
    if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
      return Err(GenerationError::Cancelled);
    }
    match self.deadline {
      Some((at, budget)) if Instant::now() >= at => Err(GenerationError::Timeout { after: budget }),
      _ => Ok(()),
    }
  }

  /// Resolves with the failure that ends the call: cancellation or deadline.
  async fn interrupted(&self) -> GenerationError {
    let cancelled = async {
      match &self.cancel {
        Some(rx) => {
          let mut rx = rx.clone();
          let closed = rx.wait_for(|c| *c).await.is_err();
          // A dropped sender can never cancel us.
          if closed {
            std::future::pending::<()>().await;
          }
        }
        None => std::future::pending::<()>().await,
      }
    };
    let expired = async {
      match self.deadline {
        Some((at, _)) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
      }
    };
    tokio::select! {
      biased;
      _ = cancelled => GenerationError::Cancelled,
      _ = expired => GenerationError::Timeout { after: self.deadline.map(|(_, b)| b).unwrap_or_default() },
    }
  }
}

#[derive(Clone)]
pub struct GenerationClient {
  service: Arc<dyn GenerationService>,
  model: String,
  max_retries: u32,
  retry_delay: Duration,
  max_tokens: u32,
  temperature: f32,
  call_timeout: Duration,
}

impl GenerationClient {
  /// Build over an explicit provider. The API key is still checked here so a
  /// misconfigured process fails before any call is attempted.
  pub fn new(settings: &GenerationSettings, service: Arc<dyn GenerationService>) -> Result<Self, ConfigurationError> {
    validate_api_key(settings.api_key.as_deref())?;
    if settings.max_retries == 0 {
      return Err(ConfigurationError::Invalid { field: "max_retries", reason: "must be at least 1".into() });
    }
    Ok(Self {
      service,
      model: settings.model.clone(),
      max_retries: settings.max_retries,
      retry_delay: settings.retry_delay,
      max_tokens: settings.max_tokens,
      temperature: settings.temperature,
      call_timeout: settings.call_timeout,
    })
  }

  /// Build over the OpenAI adapter.
  pub fn from_settings(settings: &GenerationSettings) -> Result<Self, ConfigurationError> {
    let openai = OpenAI::new(settings)?;
    Self::new(settings, Arc::new(openai))
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  pub fn max_retries(&self) -> u32 {
    self.max_retries
  }

  /// A fresh context bounded by the configured per-call timeout.
  pub fn call_context(&self) -> CallContext {
    CallContext::with_timeout(self.call_timeout)
  }

  /// Wait after failed attempt `attempt` (1-based): `retry_delay * attempt`.
  pub fn attempt_delay(&self, attempt: u32) -> Duration {
    self.retry_delay.saturating_mul(attempt)
  }

  #[instrument(level = "info", skip(self, prompt, ctx), fields(model = %self.model, prompt_len = prompt.len(), max_retries = self.max_retries))]
  pub async fn generate_text(&self, prompt: &str, ctx: &CallContext) -> Result<String, GenerationError> {
    let req = ProviderRequest {
      model: self.model.clone(),
      prompt: prompt.to_string(),
      max_tokens: self.max_tokens,
      temperature: self.temperature,
    };

    let mut last_cause = GenerationError::EmptyResponse;
    for attempt in 1..=self.max_retries {
      ctx.check()?;

      let start = Instant::now();
      let outcome = tokio::select! {
        biased;
        stop = ctx.interrupted() => return Err(stop),
        r = self.service.generate(&req) => r,
      };

      let err = match outcome {
        Ok(text) if !text.trim().is_empty() => {
          info!(target: "provider", attempt, elapsed = ?start.elapsed(), response_len = text.len(), "Generation attempt succeeded");
          return Ok(text);
        }
        Ok(_) => GenerationError::EmptyResponse,
        Err(e) => e,
      };
      if !err.is_retryable() {
        return Err(err);
      }
      warn!(target: "provider", attempt, max_retries = self.max_retries, error = %err, "Generation attempt failed");

      if attempt < self.max_retries {
        let delay = self.attempt_delay(attempt);
        tokio::select! {
          biased;
          stop = ctx.interrupted() => return Err(stop),
          _ = tokio::time::sleep(delay) => {}
        }
      }
      last_cause = err;
    }

    Err(GenerationError::Exhausted { attempts: self.max_retries, last_cause: Box::new(last_cause) })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{test_settings, ScriptedService};

  fn client(service: Arc<ScriptedService>, max_retries: u32, delay_ms: u64) -> GenerationClient {
    let settings = GenerationSettings {
      max_retries,
      retry_delay: Duration::from_millis(delay_ms),
      ..test_settings()
    };
    GenerationClient::new(&settings, service).unwrap()
  }

  #[test]
  fn construction_fails_without_api_key() {
    let settings = GenerationSettings { api_key: None, ..test_settings() };
    let err = GenerationClient::new(&settings, Arc::new(ScriptedService::always("{}"))).err();
    assert_eq!(err, Some(ConfigurationError::MissingApiKey));
  }

  #[tokio::test(start_paused = true)]
  async fn huge_call_timeout_means_no_deadline() {
    let settings = GenerationSettings { call_timeout: Duration::from_secs(u64::MAX), ..test_settings() };
    let svc = Arc::new(ScriptedService::always("{\"ok\":true}"));
    let c = GenerationClient::new(&settings, svc.clone()).unwrap();
    let ctx = c.call_context();
    assert!(ctx.deadline.is_none());
    assert_eq!(c.generate_text("p", &ctx).await.unwrap(), "{\"ok\":true}");
    assert_eq!(svc.invocations(), 1);
  }

  #[test]
  fn delay_is_linear_in_attempt_index() {
    let c = client(Arc::new(ScriptedService::always("{}")), 3, 1000);
    assert_eq!(c.attempt_delay(1), Duration::from_millis(1000));
    assert_eq!(c.attempt_delay(2), Duration::from_millis(2000));
    assert_eq!(c.attempt_delay(3), Duration::from_millis(3000));
  }

  #[tokio::test(start_paused = true)]
  async fn first_success_returns_immediately() {
    let svc = Arc::new(ScriptedService::always("{\"ok\":true}"));
    let c = client(svc.clone(), 3, 1000);
    let text = c.generate_text("p", &CallContext::unbounded()).await.unwrap();
    assert_eq!(text, "{\"ok\":true}");
    assert_eq!(svc.invocations(), 1);
    let req = &svc.requests()[0];
    assert_eq!(req.prompt, "p");
    assert_eq!(req.max_tokens, 4096);
  }

  #[tokio::test(start_paused = true)]
  async fn empty_responses_exhaust_after_max_retries_with_linear_backoff() {
    let svc = Arc::new(ScriptedService::always(""));
    let c = client(svc.clone(), 3, 1000);
    let err = c.generate_text("p", &CallContext::unbounded()).await.unwrap_err();

    assert_eq!(err.code(), "EXHAUSTED");
    assert!(matches!(&err, GenerationError::Exhausted { attempts: 3, last_cause } if **last_cause == GenerationError::EmptyResponse));
    assert_eq!(svc.invocations(), 3);

    let t = svc.call_times();
    // Delay before attempt k is retry_delay * (k - 1).
    assert_eq!(t[1] - t[0], Duration::from_millis(1000));
    assert_eq!(t[2] - t[1], Duration::from_millis(2000));
  }

  #[tokio::test(start_paused = true)]
  async fn recovers_after_transient_failures() {
    let svc = Arc::new(ScriptedService::script(vec![
      Err(GenerationError::Provider("HTTP 503".into())),
      Ok("   ".into()),
      Ok("{\"x\":1}".into()),
    ]));
    let c = client(svc.clone(), 3, 10);
    assert_eq!(c.generate_text("p", &CallContext::unbounded()).await.unwrap(), "{\"x\":1}");
    assert_eq!(svc.invocations(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn exhaustion_keeps_last_cause() {
    let svc = Arc::new(ScriptedService::script(vec![
      Ok(String::new()),
      Err(GenerationError::Provider("HTTP 500".into())),
    ]));
    let c = client(svc.clone(), 2, 10);
    let err = c.generate_text("p", &CallContext::unbounded()).await.unwrap_err();
    assert_eq!(
      err,
      GenerationError::Exhausted { attempts: 2, last_cause: Box::new(GenerationError::Provider("HTTP 500".into())) }
    );
  }

  #[tokio::test(start_paused = true)]
  async fn deadline_during_backoff_surfaces_timeout() {
    let svc = Arc::new(ScriptedService::always(""));
    let c = client(svc.clone(), 3, 1000);
    let ctx = CallContext::with_timeout(Duration::from_millis(1500));
    let start = Instant::now();
    let err = c.generate_text("p", &ctx).await.unwrap_err();
    assert_eq!(err, GenerationError::Timeout { after: Duration::from_millis(1500) });
    // Attempt 1 at 0ms, attempt 2 at 1000ms, deadline hit while waiting 2000ms.
    assert_eq!(svc.invocations(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(1500));
  }

  #[tokio::test(start_paused = true)]
  async fn deadline_interrupts_a_slow_provider() {
    let svc = Arc::new(ScriptedService::always("{}").with_latency(Duration::from_secs(30)));
    let c = client(svc.clone(), 3, 1000);
    let err = c.generate_text("p", &CallContext::with_timeout(Duration::from_secs(5))).await.unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
    assert_eq!(svc.invocations(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn cancellation_before_first_attempt_skips_the_provider() {
    let svc = Arc::new(ScriptedService::always("{}"));
    let c = client(svc.clone(), 3, 1000);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let err = c.generate_text("p", &CallContext::unbounded().with_cancel(rx)).await.unwrap_err();
    assert_eq!(err, GenerationError::Cancelled);
    assert_eq!(svc.invocations(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn cancellation_during_backoff_stops_retrying() {
    let (tx, rx) = watch::channel(false);
    let svc = Arc::new(ScriptedService::always("").cancel_on_call(1, tx));
    let c = client(svc.clone(), 3, 1000);
    let err = c.generate_text("p", &CallContext::unbounded().with_cancel(rx)).await.unwrap_err();
    assert_eq!(err, GenerationError::Cancelled);
    assert_eq!(svc.invocations(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_the_call_abandons_remaining_attempts() {
    let svc = Arc::new(ScriptedService::always(""));
    let c = client(svc.clone(), 3, 1000);
    let task = tokio::spawn(async move { c.generate_text("p", &CallContext::unbounded()).await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(svc.invocations(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn dropped_cancel_sender_does_not_cancel() {
    let (tx, rx) = watch::channel(false);
    drop(tx);
    let svc = Arc::new(ScriptedService::always("{}"));
    let c = client(svc, 1, 0);
    assert!(c.generate_text("p", &CallContext::unbounded().with_cancel(rx)).await.is_ok());
  }
}
