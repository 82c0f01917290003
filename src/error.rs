//! Typed errors: schema configuration, API access, and orchestrator failures.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate module: {0}")]
    DuplicateModule(String),
    #[error("duplicate {kind} key '{key}' in module {module}")]
    DuplicateKey {
        module: String,
        kind: &'static str,
        key: String,
    },
    #[error("configuration missing for module '{0}'")]
    UnknownModule(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Category of a data access failure. Callers branch on this instead of parsing messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// No bearer token in the session; the request was never attempted.
    MissingToken,
    Network,
    Timeout,
    Cancelled,
    /// 401 or 403.
    Auth,
    /// Any other 4xx.
    Client,
    /// 5xx.
    Server,
    /// Body was not the JSON shape we expect.
    Decode,
}

/// Normalized data access error: one shape with a human readable message and a kind.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn missing_token() -> Self {
        Self::new(ApiErrorKind::MissingToken, "not authenticated: no access token")
    }

    pub fn timeout() -> Self {
        Self::new(ApiErrorKind::Timeout, "request timed out, please try again")
    }

    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Cancelled, "request cancelled")
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message)
    }

    /// Map a non-2xx status to an error. `message` is the server's `{ message }` when present.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let kind = match status {
            401 | 403 => ApiErrorKind::Auth,
            500..=599 => ApiErrorKind::Server,
            // Remaining 4xx and any unexpected 1xx/3xx.
            _ => ApiErrorKind::Client,
        };
        ApiError {
            kind,
            message: message.unwrap_or_else(|| format!("request failed with status {}", status)),
            status: Some(status),
        }
    }

    /// Network, server and timeout failures are retried; cancellation, 4xx and auth never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ApiErrorKind::Network | ApiErrorKind::Server | ApiErrorKind::Timeout
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ApiErrorKind::Cancelled
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ApiErrorKind::Auth
    }

    /// Cancellations are never shown to the user.
    pub fn is_user_facing(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Field key -> message, ordered for stable display.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("validation failed: {}", summarize(.0))]
    Validation(FieldErrors),
    #[error("permission denied: {action} on {module}")]
    PermissionDenied { module: String, action: String },
    #[error("busy: {0}")]
    Busy(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl AppError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Api(e) if e.is_cancelled())
    }
}

fn summarize(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}
