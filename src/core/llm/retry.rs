use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::RetryConfig;
use crate::core::error::AiError;
use crate::core::llm::parser::raw_prefix;

static RETRY_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry\s+(?:in|after)\s+(\d+(?:\.\d+)?)\s*(ms|milliseconds?|s|secs?|seconds?)\b")
        .expect("retry hint pattern is valid")
});

const MESSAGE_PREFIX_CHARS: usize = 500;

/// One failed transport-level call to a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub body: String,
    /// Parsed `Retry-After` header, when the provider sent one.
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn http(status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
            retry_after,
        }
    }

    pub fn transport<E: fmt::Display>(err: E) -> Self {
        Self {
            status: None,
            body: err.to_string(),
            retry_after: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.body),
            None => write!(f, "{}", self.body),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidCredential,
    RateLimited,
    StatusPlaceholder,
    Other,
}

/// Bookkeeping for one logical request; discarded when the call chain ends.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub last_error_kind: Option<FailureKind>,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt_number: 0,
            max_attempts,
            last_error_kind: None,
        }
    }

    fn exhausted(&self) -> bool {
        self.attempt_number >= self.max_attempts
    }
}

pub fn classify(err: &ProviderError) -> FailureKind {
    let body = err.body.to_lowercase();
    let key_rejected = body.contains("api_key_invalid")
        || body.contains("api key not valid")
        || body.contains("invalid api key")
        || body.contains("incorrect api key");

    match err.status {
        Some(401) => FailureKind::InvalidCredential,
        Some(400) | Some(403) if key_rejected => FailureKind::InvalidCredential,
        Some(429) => FailureKind::RateLimited,
        _ if err.body.contains("RESOURCE_EXHAUSTED") => FailureKind::RateLimited,
        _ => FailureKind::Other,
    }
}

/// Provider-suggested wait: header first, then structured `RetryInfo`, then free text.
pub fn retry_hint(err: &ProviderError) -> Option<Duration> {
    if let Some(d) = err.retry_after {
        return Some(d);
    }
    if let Some(d) = retry_info_delay(&err.body) {
        return Some(d);
    }
    let caps = RETRY_IN_RE.captures(&err.body)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let secs = if unit.starts_with("ms") || unit.starts_with("milli") {
        amount / 1000.0
    } else {
        amount
    };
    Duration::try_from_secs_f64(secs).ok()
}

/// `{"error": {"details": [{"@type": "...RetryInfo", "retryDelay": "3s"}]}}`
fn retry_info_delay(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let details = value.get("error")?.get("details")?.as_array()?;
    details
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t.ends_with("RetryInfo"))
        })
        .find_map(|d| d.get("retryDelay")?.as_str().and_then(parse_seconds_literal))
}

fn parse_seconds_literal(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

pub fn parse_retry_after_header(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    rate_limit_base_delay: Duration,
    status_delay: Duration,
    placeholder_keywords: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_base_delay: Duration::from_millis(config.rate_limit_base_delay_ms),
            status_delay: Duration::from_millis(config.status_delay_ms),
            placeholder_keywords: config
                .placeholder_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Exponential: base, 2*base, 4*base... `attempt` is the 1-based attempt that just failed.
    pub fn rate_limit_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        hint.unwrap_or_else(|| {
            self.rate_limit_base_delay
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        })
    }

    /// Linear: status, 2*status, 3*status...
    pub fn status_delay(&self, attempt: u32) -> Duration {
        self.status_delay.saturating_mul(attempt.max(1))
    }

    /// A successful response with no JSON delimiters that reads like a warm-up notice.
    pub fn is_status_placeholder(&self, text: &str) -> bool {
        if text.contains(['{', '[']) {
            return false;
        }
        let lowered = text.to_lowercase();
        self.placeholder_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()))
    }

    /// Drive `call` until it yields usable text or the failure is not worth retrying.
    pub async fn run<F, Fut>(&self, mut call: F) -> Result<String, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let mut state = RetryState::new(self.max_attempts());

        loop {
            state.attempt_number += 1;
            let delay = match call().await {
                Ok(text) => {
                    if !self.is_status_placeholder(&text) {
                        return Ok(text);
                    }
                    state.last_error_kind = Some(FailureKind::StatusPlaceholder);
                    if state.exhausted() {
                        return Err(AiError::TransientStatusMessage {
                            attempts: state.attempt_number,
                            raw_prefix: raw_prefix(&text, MESSAGE_PREFIX_CHARS),
                        });
                    }
                    self.status_delay(state.attempt_number)
                }
                Err(err) => {
                    let kind = classify(&err);
                    state.last_error_kind = Some(kind);
                    match kind {
                        FailureKind::InvalidCredential => {
                            return Err(AiError::InvalidCredential {
                                status: err.status.unwrap_or(401),
                                message: raw_prefix(&err.body, MESSAGE_PREFIX_CHARS),
                            });
                        }
                        FailureKind::RateLimited => {
                            let hint = retry_hint(&err);
                            if state.exhausted() {
                                return Err(AiError::RateLimit {
                                    attempts: state.attempt_number,
                                    retry_after: hint,
                                    message: raw_prefix(&err.body, MESSAGE_PREFIX_CHARS),
                                });
                            }
                            self.rate_limit_delay(state.attempt_number, hint)
                        }
                        FailureKind::StatusPlaceholder | FailureKind::Other => {
                            return Err(AiError::RemoteCall {
                                status: err.status,
                                message: raw_prefix(&err.to_string(), MESSAGE_PREFIX_CHARS),
                            });
                        }
                    }
                }
            };

            warn!(
                "AI call attempt {}/{} failed ({:?}), retrying in {:?}",
                state.attempt_number, state.max_attempts, state.last_error_kind, delay
            );
            debug!("Retry state: {:?}", state);
            tokio::time::sleep(delay).await;
        }
    }
}
