//! Error taxonomy for data mover operations
//!
//! Every failure that reaches a caller is one of these kinds. Errors from
//! dependent services are mapped into this taxonomy at the client boundary.

use thiserror::Error;

/// Result alias used throughout the orchestrator.
pub type Result<T, E = MoverError> = std::result::Result<T, E>;

/// Caller-visible error kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Forbidden,
    LimitExceeded,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    /// HTTP status an outer routing layer should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::LimitExceeded => 429,
            Self::Internal => 500,
            Self::ServiceUnavailable => 503,
        }
    }
}

/// A categorized error with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoverError {
    /// Malformed or missing input
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource, role or policy absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Run already in progress, or not running
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Unexpected or uncategorized failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl MoverError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::LimitExceeded(_) => ErrorKind::LimitExceeded,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Forbidden(m)
            | Self::LimitExceeded(m)
            | Self::ServiceUnavailable(m)
            | Self::Internal(m) => m,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Prefix the message with additional context, keeping the kind.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        let wrap = |m: String| format!("{ctx}: {m}");
        match self {
            Self::BadRequest(m) => Self::BadRequest(wrap(m)),
            Self::NotFound(m) => Self::NotFound(wrap(m)),
            Self::Conflict(m) => Self::Conflict(wrap(m)),
            Self::Forbidden(m) => Self::Forbidden(wrap(m)),
            Self::LimitExceeded(m) => Self::LimitExceeded(wrap(m)),
            Self::ServiceUnavailable(m) => Self::ServiceUnavailable(wrap(m)),
            Self::Internal(m) => Self::Internal(wrap(m)),
        }
    }
}
