//! Error taxonomy for a live session.

use gemini_live_types::CodecError;
use serde::Serialize;

/// Category of a model-level rejection, derived from the raw failure text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    RateLimit,
    Billing,
    NotFound,
    Generic,
}

impl ModelErrorKind {
    /// Classifies a raw error message by keyword.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        // Bare "rate" would match "generateContent", which appears in most service errors.
        if has(&[
            "resource_exhausted",
            "quota",
            "rate limit",
            "rate_limit",
            "429",
            "too many requests",
        ]) {
            Self::RateLimit
        } else if has(&["billing", "403", "permission", "forbidden", "access denied"]) {
            Self::Billing
        } else if has(&["not found", "404", "does not exist"]) {
            Self::NotFound
        } else {
            Self::Generic
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::RateLimit => "Rate limit or quota exceeded. Try again shortly.",
            Self::Billing => "Billing issue or access denied. Check your API plan.",
            Self::NotFound => "Model not found. It may have been deprecated or renamed.",
            Self::Generic => "An unexpected error occurred with this model.",
        }
    }
}

/// The kind carried by `LiveEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No credential was available at connect time. Fatal until resolved by the host.
    AuthRequired,
    /// Transport open/send failure. Retried by the reconnection policy, then fatal.
    ConnectionError,
    /// The service rejected the session. Never retried automatically.
    ModelUnavailable(ModelErrorKind),
    /// A single chunk could not be decoded or scheduled. The chunk is dropped.
    AudioPlaybackError,
    /// A tool handler failed. Only that call is dropped.
    ToolDispatchError,
    /// The service ended the session because it reached its maximum duration.
    SessionExpired,
}

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("Sign in required before connecting.")]
    AuthRequired,
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("{model} is not available: {message}")]
    ModelUnavailable {
        model: String,
        kind: ModelErrorKind,
        message: String,
    },
    #[error("Audio playback error: {0}")]
    AudioPlayback(String),
    #[error("Tool dispatch error: {0}")]
    ToolDispatch(String),
    #[error("Session expired: {0}")]
    SessionExpired(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("The session task is no longer running.")]
    SessionGone,
}

impl LiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthRequired => ErrorKind::AuthRequired,
            Self::Connection(_) | Self::Codec(_) | Self::SessionGone => ErrorKind::ConnectionError,
            Self::ModelUnavailable { kind, .. } => ErrorKind::ModelUnavailable(*kind),
            Self::AudioPlayback(_) => ErrorKind::AudioPlaybackError,
            Self::ToolDispatch(_) => ErrorKind::ToolDispatchError,
            Self::SessionExpired(_) => ErrorKind::SessionExpired,
        }
    }
}
