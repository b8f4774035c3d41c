use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure modes of a single AI-backed call: parsing the model text or talking to the provider.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("no JSON object or array found in model response")]
    NoJsonFound { raw_prefix: String },

    #[error("model response contained no parseable JSON value: {reason}")]
    MalformedJson { reason: String, raw_prefix: String },

    #[error("AI provider rejected the configured API key (HTTP {status})")]
    InvalidCredential { status: u16, message: String },

    #[error("AI provider is still rate limiting after {attempts} attempts")]
    RateLimit {
        attempts: u32,
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("AI provider kept answering with a status placeholder after {attempts} attempts")]
    TransientStatusMessage { attempts: u32, raw_prefix: String },

    #[error("AI provider call failed: {message}")]
    RemoteCall { status: Option<u16>, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    NoJsonFound,
    MalformedJson,
    InvalidCredential,
    RateLimit,
    TransientStatusMessage,
    RemoteCall,
}

impl AiError {
    pub fn kind(&self) -> AiErrorKind {
        match self {
            AiError::NoJsonFound { .. } => AiErrorKind::NoJsonFound,
            AiError::MalformedJson { .. } => AiErrorKind::MalformedJson,
            AiError::InvalidCredential { .. } => AiErrorKind::InvalidCredential,
            AiError::RateLimit { .. } => AiErrorKind::RateLimit,
            AiError::TransientStatusMessage { .. } => AiErrorKind::TransientStatusMessage,
            AiError::RemoteCall { .. } => AiErrorKind::RemoteCall,
        }
    }

    /// True when retrying with the same credentials can never succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AiError::InvalidCredential { .. })
    }

    /// The leading slice of the model text that failed to parse, if any.
    pub fn raw_prefix(&self) -> Option<&str> {
        match self {
            AiError::NoJsonFound { raw_prefix }
            | AiError::MalformedJson { raw_prefix, .. }
            | AiError::TransientStatusMessage { raw_prefix, .. } => Some(raw_prefix),
            _ => None,
        }
    }
}

/// Errors surfaced by job processors and the automation orchestrator.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("an automation run is already in progress")]
    Busy,

    #[error(transparent)]
    Remote(#[from] AiError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    Busy,
    RemoteFailure,
    Storage,
}

impl AutomationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationError::NotFound(_) => ErrorKind::NotFound,
            AutomationError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            AutomationError::Busy => ErrorKind::Busy,
            AutomationError::Remote(_) => ErrorKind::RemoteFailure,
            AutomationError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AutomationError::Remote(e) if e.is_terminal())
    }

    /// Structured payload stored alongside a `failed` automation log entry.
    pub fn log_details(&self) -> serde_json::Value {
        let mut details = serde_json::json!({
            "error": self.to_string(),
            "errorKind": self.kind(),
            "terminal": self.is_terminal(),
        });
        if let AutomationError::Remote(ai) = self {
            details["aiErrorKind"] = serde_json::json!(ai.kind());
            if let Some(prefix) = ai.raw_prefix() {
                details["rawPrefix"] = serde_json::json!(prefix);
            }
        }
        details
    }
}
